//! The aligned version-comparison table view.

use askama::Template;

use crate::domain::diff::{self, DiffStats, MultiVersionDiff};

use super::views::LayoutContext;
use super::workflow::{StepView, stepper};

#[derive(Clone)]
pub struct ComparisonCellView {
    pub text: String,
    pub status: &'static str,
    pub status_label: String,
}

#[derive(Clone)]
pub struct ComparisonRowView {
    pub label: String,
    pub cells: Vec<ComparisonCellView>,
}

pub struct ComparisonPageView {
    pub project_id: String,
    pub steps: Vec<StepView>,
    pub heading: String,
    pub version_names: Vec<String>,
    pub rows: Vec<ComparisonRowView>,
    pub stats: DiffStats,
}

impl ComparisonPageView {
    pub fn has_rows(&self) -> bool {
        !self.rows.is_empty()
    }
}

#[derive(Template)]
#[template(path = "comparison.html")]
pub struct ComparisonTemplate {
    pub view: LayoutContext<ComparisonPageView>,
}

fn format_status(status: &str) -> String {
    status
        .split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Reconcile a diff into the table view: one row per rule, one cell per
/// version, the current version pinned last.
pub fn comparison_page(project_id: &str, comparison: &MultiVersionDiff) -> ComparisonPageView {
    let (rows, stats) = diff::align_rows(comparison);
    let version_names: Vec<String> = comparison
        .versions
        .iter()
        .map(|info| info.version_name.clone())
        .collect();

    ComparisonPageView {
        project_id: project_id.to_owned(),
        steps: stepper(5),
        heading: version_names.join(" \u{2192} "),
        rows: rows
            .iter()
            .map(|row| ComparisonRowView {
                label: format!("Rule {}", row.index + 1),
                cells: (0..version_names.len())
                    .map(|version_index| {
                        let status = diff::cell_status(row, version_index);
                        ComparisonCellView {
                            text: row.cells[version_index]
                                .as_ref()
                                .map(|cell| cell.text.clone())
                                .unwrap_or_else(|| "\u{2014}".to_owned()),
                            status,
                            status_label: format_status(status),
                        }
                    })
                    .collect(),
            })
            .collect(),
        version_names,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::diff::{VersionInfo, VersionRules, compare_versions};
    use time::macros::datetime;

    fn rules_version(name: &str, number: i32, rules: &[&str]) -> VersionRules {
        VersionRules {
            info: VersionInfo {
                version: number,
                version_name: name.into(),
                created_at: datetime!(2025-06-01 12:00 UTC),
            },
            rules: rules.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[test]
    fn formats_statuses_for_display() {
        assert_eq!(format_status("not-present"), "Not Present");
        assert_eq!(format_status("modified"), "Modified");
    }

    #[test]
    fn builds_one_cell_per_version() {
        let diff = compare_versions(&[
            rules_version("v1", 1, &["No tobacco issuers"]),
            rules_version("v2", 2, &["No tobacco issuers", "ESG exclusions apply"]),
        ]);
        let view = comparison_page("project-1", &diff);

        assert_eq!(view.version_names, vec!["v1", "v2"]);
        assert_eq!(view.heading, "v1 \u{2192} v2");
        assert_eq!(view.rows.len(), 2);
        for row in &view.rows {
            assert_eq!(row.cells.len(), 2);
        }
        assert_eq!(view.stats.added, 1);

        let added_row = view
            .rows
            .iter()
            .find(|row| row.cells[1].text == "ESG exclusions apply")
            .unwrap();
        assert_eq!(added_row.cells[0].status, "not-present");
        assert_eq!(added_row.cells[0].text, "\u{2014}");
        assert_eq!(added_row.cells[1].status_label, "Added");
    }
}
