//! Multi-version ruleset comparison.
//!
//! Versions flatten to ordered rule-text lists; adjacent pairs compare
//! into tagged results (unchanged, modified, added, removed), and the
//! results reconcile into aligned table rows for rendering. Matching is a
//! content heuristic over small bounded lists: exact text first, then
//! word-overlap similarity for modified pairs.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::projects::RawRuleSection;

/// Minimum word-overlap similarity for two differing texts to count as
/// the same rule reworded rather than an add/remove pair.
const MODIFIED_MATCH_THRESHOLD: f64 = 0.4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonTag {
    #[default]
    Unchanged,
    Modified,
    Added,
    Removed,
}

impl ComparisonTag {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unchanged => "unchanged",
            Self::Modified => "modified",
            Self::Added => "added",
            Self::Removed => "removed",
        }
    }

    /// Parse a tag from an upstream agent reply. Matching ignores case;
    /// malformed or missing values default to `unchanged`.
    pub fn parse_lenient(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(value) if value.eq_ignore_ascii_case("modified") => Self::Modified,
            Some(value) if value.eq_ignore_ascii_case("added") => Self::Added,
            Some(value) if value.eq_ignore_ascii_case("removed") => Self::Removed,
            _ => Self::Unchanged,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub tag: ComparisonTag,
    pub previous: Option<String>,
    pub current: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionComparison {
    pub from: String,
    pub to: String,
    pub results: Vec<ComparisonResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: i32,
    pub version_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// One version's metadata plus its flattened rule texts.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionRules {
    pub info: VersionInfo,
    pub rules: Vec<String>,
}

impl VersionRules {
    pub fn from_sections(info: VersionInfo, sections: &[RawRuleSection]) -> Self {
        Self {
            rules: flatten_sections(sections),
            info,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiVersionDiff {
    pub versions: Vec<VersionInfo>,
    pub comparisons: Vec<VersionComparison>,
}

/// Flatten titled sections into the ordered rule-text list used for
/// comparison.
pub fn flatten_sections(sections: &[RawRuleSection]) -> Vec<String> {
    sections
        .iter()
        .flat_map(|section| section.rules.iter().cloned())
        .collect()
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(|word| word.to_lowercase())
        .collect()
}

/// Word-overlap similarity in `[0, 1]`: shared words over distinct words
/// across both texts.
pub fn similarity(a: &str, b: &str) -> f64 {
    let mut left = tokenize(a);
    let mut right = tokenize(b);
    left.sort_unstable();
    left.dedup();
    right.sort_unstable();
    right.dedup();

    if left.is_empty() && right.is_empty() {
        return 1.0;
    }

    let shared = left.iter().filter(|word| right.contains(word)).count();
    let union = left.len() + right.len() - shared;
    if union == 0 {
        return 1.0;
    }
    shared as f64 / union as f64
}

/// Compare two adjacent rule-text lists.
///
/// Exact text matches tag `unchanged`; the best remaining content match
/// above the similarity threshold tags `modified`; leftovers on the
/// current side tag `added` and on the previous side `removed`. Results
/// follow current-version order, with removals appended in previous-version
/// order.
pub fn compare_rule_sets(previous: &[String], current: &[String]) -> Vec<ComparisonResult> {
    let mut previous_taken = vec![false; previous.len()];
    let mut matches: Vec<Option<usize>> = vec![None; current.len()];

    // Exact matches first so rewording never steals an identical twin.
    for (current_index, rule) in current.iter().enumerate() {
        if let Some(previous_index) = previous
            .iter()
            .enumerate()
            .position(|(index, candidate)| !previous_taken[index] && candidate == rule)
        {
            previous_taken[previous_index] = true;
            matches[current_index] = Some(previous_index);
        }
    }

    // Content matches for what remains.
    for (current_index, rule) in current.iter().enumerate() {
        if matches[current_index].is_some() {
            continue;
        }

        let mut best: Option<(usize, f64)> = None;
        for (previous_index, candidate) in previous.iter().enumerate() {
            if previous_taken[previous_index] {
                continue;
            }
            let score = similarity(candidate, rule);
            if score >= MODIFIED_MATCH_THRESHOLD
                && best.is_none_or(|(_, best_score)| score > best_score)
            {
                best = Some((previous_index, score));
            }
        }

        if let Some((previous_index, _)) = best {
            previous_taken[previous_index] = true;
            matches[current_index] = Some(previous_index);
        }
    }

    let mut results = Vec::with_capacity(current.len());
    for (current_index, rule) in current.iter().enumerate() {
        match matches[current_index] {
            Some(previous_index) if previous[previous_index] == *rule => {
                results.push(ComparisonResult {
                    tag: ComparisonTag::Unchanged,
                    previous: Some(rule.clone()),
                    current: Some(rule.clone()),
                });
            }
            Some(previous_index) => results.push(ComparisonResult {
                tag: ComparisonTag::Modified,
                previous: Some(previous[previous_index].clone()),
                current: Some(rule.clone()),
            }),
            None => results.push(ComparisonResult {
                tag: ComparisonTag::Added,
                previous: None,
                current: Some(rule.clone()),
            }),
        }
    }

    for (previous_index, rule) in previous.iter().enumerate() {
        if !previous_taken[previous_index] {
            results.push(ComparisonResult {
                tag: ComparisonTag::Removed,
                previous: Some(rule.clone()),
                current: None,
            });
        }
    }

    results
}

/// Compare every adjacent pair in a version sequence. The first version
/// has no prior baseline, so a single-version sequence yields no
/// comparisons at all.
pub fn compare_versions(versions: &[VersionRules]) -> MultiVersionDiff {
    let comparisons = versions
        .windows(2)
        .map(|pair| VersionComparison {
            from: pair[0].info.version_name.clone(),
            to: pair[1].info.version_name.clone(),
            results: compare_rule_sets(&pair[0].rules, &pair[1].rules),
        })
        .collect();

    MultiVersionDiff {
        versions: versions.iter().map(|v| v.info.clone()).collect(),
        comparisons,
    }
}

// -------- Table alignment --------

#[derive(Debug, Clone, PartialEq)]
pub struct RuleCell {
    pub text: String,
    pub tag: ComparisonTag,
}

/// One aligned table row: the same rule tracked across every version,
/// `None` where the version does not carry it.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleRow {
    pub index: usize,
    pub cells: Vec<Option<RuleCell>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffStats {
    pub total: usize,
    pub modified: usize,
    pub added: usize,
    pub removed: usize,
}

/// Per-cell display status. Version index 0 has no baseline, so anything
/// it carries renders as unchanged; absent cells render as not-present.
pub fn cell_status(row: &RuleRow, version_index: usize) -> &'static str {
    match row.cells.get(version_index).and_then(Option::as_ref) {
        None => "not-present",
        Some(_) if version_index == 0 => "unchanged",
        Some(cell) => cell.tag.as_str(),
    }
}

/// Reconcile comparison results into aligned rows, one rule per row and
/// one cell per version, matching rule content across versions.
pub fn align_rows(diff: &MultiVersionDiff) -> (Vec<RuleRow>, DiffStats) {
    let version_index: std::collections::HashMap<&str, usize> = diff
        .versions
        .iter()
        .enumerate()
        .map(|(index, info)| (info.version_name.as_str(), index))
        .collect();
    let version_count = diff.versions.len();

    let mut rows: Vec<RuleRow> = Vec::new();

    for comparison in &diff.comparisons {
        let (Some(&from_index), Some(&to_index)) = (
            version_index.get(comparison.from.as_str()),
            version_index.get(comparison.to.as_str()),
        ) else {
            continue;
        };

        for result in &comparison.results {
            let matched = rows.iter().position(|row| {
                row.cells.iter().flatten().any(|cell| {
                    Some(&cell.text) == result.current.as_ref()
                        || Some(&cell.text) == result.previous.as_ref()
                })
            });
            let row_index = match matched {
                Some(index) => index,
                None => {
                    rows.push(RuleRow {
                        index: rows.len(),
                        cells: vec![None; version_count],
                    });
                    rows.len() - 1
                }
            };
            let row = &mut rows[row_index];

            if let Some(previous) = &result.previous {
                if row.cells[from_index].is_none() {
                    row.cells[from_index] = Some(RuleCell {
                        text: previous.clone(),
                        tag: result.tag,
                    });
                }
            }
            if let Some(current) = &result.current {
                row.cells[to_index] = Some(RuleCell {
                    text: current.clone(),
                    tag: result.tag,
                });
            }
        }
    }

    let mut stats = DiffStats::default();
    for row in &rows {
        let tags: Vec<ComparisonTag> = row.cells.iter().flatten().map(|cell| cell.tag).collect();
        if tags.contains(&ComparisonTag::Modified) {
            stats.modified += 1;
        }
        if tags.contains(&ComparisonTag::Added) {
            stats.added += 1;
        }
        if tags.contains(&ComparisonTag::Removed) {
            stats.removed += 1;
        }
    }
    stats.total = stats.modified + stats.added + stats.removed;

    (rows, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn info(version: i32) -> VersionInfo {
        VersionInfo {
            version,
            version_name: format!("v{version}"),
            created_at: datetime!(2025-06-01 12:00 UTC),
        }
    }

    fn rules(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn identical_text_is_unchanged() {
        let results = compare_rule_sets(
            &rules(&["No tobacco issuers", "Max 5% per issuer"]),
            &rules(&["No tobacco issuers", "Max 5% per issuer"]),
        );
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.tag == ComparisonTag::Unchanged));
    }

    #[test]
    fn identical_sets_round_trip_with_no_deltas() {
        let set = rules(&["Rule one", "Rule two", "Rule three"]);
        let results = compare_rule_sets(&set, &set);
        assert!(
            results
                .iter()
                .all(|result| result.tag == ComparisonTag::Unchanged)
        );
        let (_, stats) = align_rows(&compare_versions(&[
            VersionRules {
                info: info(1),
                rules: set.clone(),
            },
            VersionRules {
                info: info(2),
                rules: set,
            },
        ]));
        assert_eq!(stats, DiffStats::default());
    }

    #[test]
    fn new_text_is_added() {
        let results = compare_rule_sets(
            &rules(&["No tobacco issuers"]),
            &rules(&["No tobacco issuers", "Portfolio duration below seven years"]),
        );
        assert_eq!(results[1].tag, ComparisonTag::Added);
        assert_eq!(results[1].previous, None);
        assert_eq!(
            results[1].current.as_deref(),
            Some("Portfolio duration below seven years")
        );
    }

    #[test]
    fn missing_text_is_removed() {
        let results = compare_rule_sets(
            &rules(&["No tobacco issuers", "Minimum forty holdings required"]),
            &rules(&["No tobacco issuers"]),
        );
        let removed: Vec<_> = results
            .iter()
            .filter(|r| r.tag == ComparisonTag::Removed)
            .collect();
        assert_eq!(removed.len(), 1);
        assert_eq!(
            removed[0].previous.as_deref(),
            Some("Minimum forty holdings required")
        );
        assert_eq!(removed[0].current, None);
    }

    #[test]
    fn reworded_text_is_modified() {
        let results = compare_rule_sets(
            &rules(&["Maximum single issuer exposure of 5% of portfolio NAV"]),
            &rules(&["Maximum single issuer exposure of 3% of portfolio NAV"]),
        );
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].tag, ComparisonTag::Modified);
        assert_eq!(
            results[0].previous.as_deref(),
            Some("Maximum single issuer exposure of 5% of portfolio NAV")
        );
    }

    #[test]
    fn unrelated_text_becomes_add_and_remove() {
        let results = compare_rule_sets(
            &rules(&["No investments in Russian Federation domiciled entities"]),
            &rules(&["Shariah compliance screening applies quarterly"]),
        );
        let tags: Vec<ComparisonTag> = results.iter().map(|r| r.tag).collect();
        assert!(tags.contains(&ComparisonTag::Added));
        assert!(tags.contains(&ComparisonTag::Removed));
        assert!(!tags.contains(&ComparisonTag::Modified));
    }

    #[test]
    fn exact_match_wins_over_similarity() {
        // The identical rule must pair with its twin even though the
        // reworded candidate appears first in the previous version.
        let results = compare_rule_sets(
            &rules(&[
                "Financial sector allocation must stay below 25%",
                "Financial sector allocation must stay below 20%",
            ]),
            &rules(&["Financial sector allocation must stay below 20%"]),
        );
        let unchanged: Vec<_> = results
            .iter()
            .filter(|r| r.tag == ComparisonTag::Unchanged)
            .collect();
        assert_eq!(unchanged.len(), 1);
        let removed: Vec<_> = results
            .iter()
            .filter(|r| r.tag == ComparisonTag::Removed)
            .collect();
        assert_eq!(removed.len(), 1);
        assert_eq!(
            removed[0].previous.as_deref(),
            Some("Financial sector allocation must stay below 25%")
        );
    }

    #[test]
    fn single_version_yields_no_comparisons() {
        let diff = compare_versions(&[VersionRules {
            info: info(1),
            rules: rules(&["Rule one"]),
        }]);
        assert_eq!(diff.versions.len(), 1);
        assert!(diff.comparisons.is_empty());
    }

    #[test]
    fn adjacent_pairs_compare_in_sequence() {
        let diff = compare_versions(&[
            VersionRules {
                info: info(1),
                rules: rules(&["A"]),
            },
            VersionRules {
                info: info(2),
                rules: rules(&["A", "B"]),
            },
            VersionRules {
                info: info(3),
                rules: rules(&["B"]),
            },
        ]);
        assert_eq!(diff.comparisons.len(), 2);
        assert_eq!(diff.comparisons[0].from, "v1");
        assert_eq!(diff.comparisons[0].to, "v2");
        assert_eq!(diff.comparisons[1].from, "v2");
        assert_eq!(diff.comparisons[1].to, "v3");
    }

    #[test]
    fn lenient_tag_parsing_defaults_to_unchanged() {
        assert_eq!(
            ComparisonTag::parse_lenient(Some("MODIFIED")),
            ComparisonTag::Modified
        );
        assert_eq!(
            ComparisonTag::parse_lenient(Some("Removed")),
            ComparisonTag::Removed
        );
        assert_eq!(
            ComparisonTag::parse_lenient(Some("  added ")),
            ComparisonTag::Added
        );
        assert_eq!(
            ComparisonTag::parse_lenient(Some("renamed")),
            ComparisonTag::Unchanged
        );
        assert_eq!(ComparisonTag::parse_lenient(None), ComparisonTag::Unchanged);
    }

    #[test]
    fn first_version_cells_render_unchanged() {
        let diff = compare_versions(&[
            VersionRules {
                info: info(1),
                rules: rules(&["Maximum single issuer exposure of 5% of portfolio NAV"]),
            },
            VersionRules {
                info: info(2),
                rules: rules(&["Maximum single issuer exposure of 3% of portfolio NAV"]),
            },
        ]);
        let (rows, stats) = align_rows(&diff);
        assert_eq!(rows.len(), 1);
        assert_eq!(cell_status(&rows[0], 0), "unchanged");
        assert_eq!(cell_status(&rows[0], 1), "modified");
        assert_eq!(stats.modified, 1);
        assert_eq!(stats.total, 1);
    }

    #[test]
    fn aligned_rows_track_rules_across_versions() {
        let diff = compare_versions(&[
            VersionRules {
                info: info(1),
                rules: rules(&["No tobacco issuers", "Minimum forty holdings required"]),
            },
            VersionRules {
                info: info(2),
                rules: rules(&["No tobacco issuers"]),
            },
            VersionRules {
                info: info(3),
                rules: rules(&["No tobacco issuers", "ESG exclusions apply"]),
            },
        ]);
        let (rows, stats) = align_rows(&diff);

        // One row per distinct rule.
        assert_eq!(rows.len(), 3);

        let unchanged_row = rows
            .iter()
            .find(|row| {
                row.cells[0].as_ref().map(|c| c.text.as_str()) == Some("No tobacco issuers")
            })
            .unwrap();
        assert!(unchanged_row.cells.iter().all(|cell| cell.is_some()));

        let removed_row = rows
            .iter()
            .find(|row| {
                row.cells[0].as_ref().map(|c| c.text.as_str())
                    == Some("Minimum forty holdings required")
            })
            .unwrap();
        assert_eq!(cell_status(removed_row, 1), "not-present");

        let added_row = rows
            .iter()
            .find(|row| {
                row.cells[2].as_ref().map(|c| c.text.as_str()) == Some("ESG exclusions apply")
            })
            .unwrap();
        assert_eq!(cell_status(added_row, 0), "not-present");
        assert_eq!(cell_status(added_row, 2), "added");

        assert_eq!(stats.added, 1);
        assert_eq!(stats.removed, 1);
        assert_eq!(stats.modified, 0);
        assert_eq!(stats.total, 2);
    }

    #[test]
    fn flattening_preserves_section_order() {
        let sections = vec![
            RawRuleSection {
                title: "Ratings".into(),
                rules: rules(&["IG only", "No unrated paper"]),
            },
            RawRuleSection {
                title: "Countries".into(),
                rules: rules(&["No sanctioned jurisdictions"]),
            },
        ];
        assert_eq!(
            flatten_sections(&sections),
            rules(&["IG only", "No unrated paper", "No sanctioned jurisdictions"])
        );
    }
}
