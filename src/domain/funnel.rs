//! Universe-filtering funnel: resolve mapped constraints to catalog
//! columns and shape cumulative stage counts for rendering.

use once_cell::sync::Lazy;
use serde::Serialize;

use crate::domain::{
    projects::MappedRule,
    securities::{ColumnFilter, SecurityColumn},
};

pub const STARTING_STAGE_NAME: &str = "Global Security Master";
pub const FINAL_STAGE_NAME: &str = "Tradable Universe";

/// Keyword table resolving constraint names to catalog columns. First
/// match wins, so more specific keywords sort before generic ones.
static COLUMN_KEYWORDS: Lazy<Vec<(&'static str, SecurityColumn)>> = Lazy::new(|| {
    vec![
        ("shariah", SecurityColumn::ShariahCompliant),
        ("esg", SecurityColumn::EsgExclusion),
        ("exclusion", SecurityColumn::EsgExclusion),
        ("country of risk", SecurityColumn::CountryOfRisk),
        ("country", SecurityColumn::IssuerCountry),
        ("domicile", SecurityColumn::IssuerCountry),
        ("jurisdiction", SecurityColumn::IssuerCountry),
        ("investment grade", SecurityColumn::IgFlag),
        ("rating", SecurityColumn::CompositeRating),
        ("credit", SecurityColumn::CompositeRating),
        ("sector", SecurityColumn::Sector),
        ("industry", SecurityColumn::Sector),
        ("instrument", SecurityColumn::InstrumentType),
        ("asset type", SecurityColumn::InstrumentType),
        ("security type", SecurityColumn::InstrumentType),
        ("currency", SecurityColumn::Currency),
        ("seniority", SecurityColumn::Seniority),
        ("subordinat", SecurityColumn::SubordinatedFlag),
        ("maturity", SecurityColumn::DaysToMaturity),
        ("developed market", SecurityColumn::DevelopedMarket),
        ("index", SecurityColumn::IndexMember),
        ("issuer", SecurityColumn::IssuerName),
        ("callable", SecurityColumn::Callable),
        ("putable", SecurityColumn::Putable),
    ]
});

/// Resolve a constraint name to the catalog column it governs. An exact
/// wire-name match (`Issuer_Country`) wins over keyword lookup; unknown
/// constraints yield `None` and never filter the universe.
pub fn resolve_column(constraint: &str) -> Option<SecurityColumn> {
    if let Some(column) = SecurityColumn::parse(constraint) {
        return Some(column);
    }

    let normalized = constraint.to_lowercase();
    COLUMN_KEYWORDS
        .iter()
        .find(|(keyword, _)| normalized.contains(keyword))
        .map(|(_, column)| *column)
}

/// One funnel stage: a constraint, the column it resolved to (if any),
/// and the values it permits.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintStage {
    pub constraint: String,
    pub filter: Option<ColumnFilter>,
}

/// Build the ordered constraint stages from a ruleset's mapped rules.
/// Constraints with no allowed values or no resolvable column become
/// pass-through stages.
pub fn build_stages(mapped_rules: &[MappedRule]) -> Vec<ConstraintStage> {
    mapped_rules
        .iter()
        .map(|rule| {
            let filter = resolve_column(&rule.constraint)
                .filter(|_| !rule.sentinel_allowed_values.is_empty())
                .map(|column| ColumnFilter {
                    column,
                    values: rule.sentinel_allowed_values.clone(),
                });
            ConstraintStage {
                constraint: rule.constraint.clone(),
                filter,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelStage {
    pub name: String,
    pub count: i64,
    pub removed: i64,
    pub percentage: u32,
}

/// Shape raw cumulative counts into display stages. `counts` carries one
/// entry per constraint stage, already cumulative; the starting universe
/// heads the funnel and the last count repeats as the tradable universe.
pub fn shape_funnel(
    starting_count: i64,
    stages: &[ConstraintStage],
    counts: &[i64],
) -> Vec<FunnelStage> {
    debug_assert_eq!(stages.len(), counts.len());

    let percentage = |count: i64| -> u32 {
        if starting_count <= 0 {
            return 0;
        }
        ((count as f64 / starting_count as f64) * 100.0).round() as u32
    };

    let mut shaped = Vec::with_capacity(stages.len() + 2);
    shaped.push(FunnelStage {
        name: STARTING_STAGE_NAME.to_owned(),
        count: starting_count,
        removed: 0,
        percentage: percentage(starting_count),
    });

    let mut running = starting_count;
    for (stage, &count) in stages.iter().zip(counts) {
        shaped.push(FunnelStage {
            name: stage.constraint.clone(),
            count,
            removed: (running - count).max(0),
            percentage: percentage(count),
        });
        running = count;
    }

    shaped.push(FunnelStage {
        name: FINAL_STAGE_NAME.to_owned(),
        count: running,
        removed: 0,
        percentage: percentage(running),
    });

    shaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(constraint: &str, allowed: &[&str]) -> MappedRule {
        MappedRule {
            constraint: constraint.into(),
            sentinel_allowed_values: allowed.iter().map(|v| v.to_string()).collect(),
            rules: Vec::new(),
        }
    }

    #[test]
    fn resolves_common_constraint_names() {
        assert_eq!(
            resolve_column("Country Restriction"),
            Some(SecurityColumn::IssuerCountry)
        );
        assert_eq!(
            resolve_column("Credit Rating Filter"),
            Some(SecurityColumn::CompositeRating)
        );
        assert_eq!(resolve_column("Sector Limits"), Some(SecurityColumn::Sector));
        assert_eq!(
            resolve_column("ESG Exclusions"),
            Some(SecurityColumn::EsgExclusion)
        );
        assert_eq!(
            resolve_column("Shariah Compliance"),
            Some(SecurityColumn::ShariahCompliant)
        );
    }

    #[test]
    fn exact_wire_name_wins() {
        assert_eq!(
            resolve_column("Issuer_Country"),
            Some(SecurityColumn::IssuerCountry)
        );
        assert_eq!(resolve_column("IG_Flag"), Some(SecurityColumn::IgFlag));
    }

    #[test]
    fn unknown_constraints_do_not_resolve() {
        assert_eq!(resolve_column("Liquidity buffer policy"), None);
    }

    #[test]
    fn stages_without_values_pass_through() {
        let stages = build_stages(&[
            rule("Country Restriction", &["US", "GB"]),
            rule("Sector Limits", &[]),
            rule("Liquidity buffer policy", &["whatever"]),
        ]);
        assert!(stages[0].filter.is_some());
        assert!(stages[1].filter.is_none());
        assert!(stages[2].filter.is_none());
    }

    #[test]
    fn shaped_funnel_is_monotonic_and_percentaged() {
        let stages = build_stages(&[
            rule("Credit Rating Filter", &["AAA", "AA"]),
            rule("Country Restriction", &["US"]),
        ]);
        let shaped = shape_funnel(10_000, &stages, &[8_000, 6_500]);

        assert_eq!(shaped.len(), 4);
        assert_eq!(shaped[0].name, STARTING_STAGE_NAME);
        assert_eq!(shaped[0].percentage, 100);
        assert_eq!(shaped[1].removed, 2_000);
        assert_eq!(shaped[2].removed, 1_500);
        assert_eq!(shaped[2].percentage, 65);
        assert_eq!(shaped[3].name, FINAL_STAGE_NAME);
        assert_eq!(shaped[3].count, 6_500);

        let counts: Vec<i64> = shaped.iter().map(|stage| stage.count).collect();
        assert!(counts.windows(2).all(|pair| pair[1] <= pair[0]));
    }

    #[test]
    fn empty_universe_yields_zero_percentages() {
        let shaped = shape_funnel(0, &[], &[]);
        assert_eq!(shaped.len(), 2);
        assert!(shaped.iter().all(|stage| stage.percentage == 0));
    }
}
