//! Views for the five-step constraint workflow pages.

use askama::Template;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::domain::projects::{
    GapFinding, GuidelineDocumentRecord, MappedRule, ProjectRecord, RawRuleSection,
};

use super::views::LayoutContext;

pub const STEP_NAMES: [&str; 5] = [
    "Upload",
    "Extract",
    "Generate Rules",
    "Gap Analysis",
    "Simulate",
];

#[derive(Clone)]
pub struct StepView {
    pub number: usize,
    pub name: &'static str,
    pub status: &'static str,
}

/// Build the stepper with the 1-based `current` step highlighted.
pub fn stepper(current: usize) -> Vec<StepView> {
    STEP_NAMES
        .iter()
        .copied()
        .enumerate()
        .map(|(index, name)| {
            let number = index + 1;
            StepView {
                number,
                name,
                status: if number < current {
                    "completed"
                } else if number == current {
                    "current"
                } else {
                    "upcoming"
                },
            }
        })
        .collect()
}

pub fn format_timestamp(at: OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_default()
}

#[derive(Clone)]
pub struct DocumentView {
    pub filename: String,
    pub uploaded_at: String,
    pub section_count: usize,
    pub rule_count: usize,
}

#[derive(Clone)]
pub struct VersionSummaryView {
    pub version_name: String,
    pub created_at: String,
    pub mapped_count: usize,
    pub gap_count: usize,
}

pub struct ProjectOverviewView {
    pub id: String,
    pub name: String,
    pub customer_id: String,
    pub created_at: String,
    pub company_name: String,
    pub steps: Vec<StepView>,
    pub documents: Vec<DocumentView>,
    pub versions: Vec<VersionSummaryView>,
}

impl ProjectOverviewView {
    pub fn has_company(&self) -> bool {
        !self.company_name.is_empty()
    }

    pub fn has_documents(&self) -> bool {
        !self.documents.is_empty()
    }

    pub fn has_versions(&self) -> bool {
        !self.versions.is_empty()
    }
}

#[derive(Template)]
#[template(path = "project.html")]
pub struct ProjectTemplate {
    pub view: LayoutContext<ProjectOverviewView>,
}

pub fn project_overview(
    project: &ProjectRecord,
    documents: &[GuidelineDocumentRecord],
) -> ProjectOverviewView {
    ProjectOverviewView {
        id: project.id.to_string(),
        name: project.name.clone(),
        customer_id: project.customer_id.clone(),
        created_at: format_timestamp(project.created_at),
        company_name: project
            .selected_company
            .as_ref()
            .map(|company| company.company_name.clone())
            .unwrap_or_default(),
        steps: stepper(1),
        documents: documents
            .iter()
            .map(|document| DocumentView {
                filename: document.filename.clone(),
                uploaded_at: format_timestamp(document.created_at),
                section_count: document.extracted_rules.len(),
                rule_count: document
                    .extracted_rules
                    .iter()
                    .map(|section| section.rules.len())
                    .sum(),
            })
            .collect(),
        versions: project
            .rulesets
            .iter()
            .map(|ruleset| VersionSummaryView {
                version_name: ruleset.version_name.clone(),
                created_at: format_timestamp(ruleset.created_at),
                mapped_count: ruleset.data.mapped_rules.len(),
                gap_count: ruleset.data.gap_analysis.len(),
            })
            .collect(),
    }
}

#[derive(Clone)]
pub struct SectionView {
    pub title: String,
    pub rules: Vec<String>,
}

pub struct ConstraintsPageView {
    pub project_id: String,
    pub steps: Vec<StepView>,
    pub filename: String,
    pub sections: Vec<SectionView>,
    pub total_sections: usize,
    pub total_rules: usize,
    pub avg_per_section: String,
}

impl ConstraintsPageView {
    pub fn has_sections(&self) -> bool {
        !self.sections.is_empty()
    }
}

#[derive(Template)]
#[template(path = "constraints.html")]
pub struct ConstraintsTemplate {
    pub view: LayoutContext<ConstraintsPageView>,
}

pub fn constraints_page(
    project: &ProjectRecord,
    filename: Option<String>,
    sections: &[RawRuleSection],
) -> ConstraintsPageView {
    let total_sections = sections.len();
    let total_rules: usize = sections.iter().map(|section| section.rules.len()).sum();
    let avg_per_section = if total_sections > 0 {
        format!("{:.1}", total_rules as f64 / total_sections as f64)
    } else {
        "—".to_owned()
    };

    ConstraintsPageView {
        project_id: project.id.to_string(),
        steps: stepper(2),
        filename: filename.unwrap_or_else(|| "No document uploaded yet".to_owned()),
        sections: sections
            .iter()
            .map(|section| SectionView {
                title: section.title.clone(),
                rules: section.rules.clone(),
            })
            .collect(),
        total_sections,
        total_rules,
        avg_per_section,
    }
}

#[derive(Clone)]
pub struct MappedRuleView {
    pub constraint: String,
    pub allowed_values: String,
    pub clauses: Vec<String>,
}

#[derive(Clone)]
pub struct GapFindingView {
    pub constraint: String,
    pub document_values: String,
    pub catalog_values: String,
    pub delta: String,
    pub matched: bool,
}

pub struct RulesPageView {
    pub project_id: String,
    pub steps: Vec<StepView>,
    pub version_name: String,
    pub mapped: Vec<MappedRuleView>,
    pub gap: Vec<GapFindingView>,
}

impl RulesPageView {
    pub fn has_mapped(&self) -> bool {
        !self.mapped.is_empty()
    }

    pub fn has_gap(&self) -> bool {
        !self.gap.is_empty()
    }
}

#[derive(Template)]
#[template(path = "rules.html")]
pub struct RulesTemplate {
    pub view: LayoutContext<RulesPageView>,
}

fn join_values(values: &[String]) -> String {
    if values.is_empty() {
        "—".to_owned()
    } else {
        values.join(", ")
    }
}

pub fn rules_page(
    project: &ProjectRecord,
    version_name: &str,
    mapped: &[MappedRule],
    gap: &[GapFinding],
) -> RulesPageView {
    RulesPageView {
        project_id: project.id.to_string(),
        steps: stepper(4),
        version_name: version_name.to_owned(),
        mapped: mapped
            .iter()
            .map(|rule| MappedRuleView {
                constraint: rule.constraint.clone(),
                allowed_values: join_values(&rule.sentinel_allowed_values),
                clauses: rule.rules.clone(),
            })
            .collect(),
        gap: gap
            .iter()
            .map(|finding| GapFindingView {
                constraint: finding.constraint.clone(),
                document_values: join_values(finding.document_values()),
                catalog_values: join_values(finding.catalog_values()),
                delta: finding.delta.clone(),
                matched: finding.matched,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stepper_marks_progress() {
        let steps = stepper(3);
        assert_eq!(steps.len(), 5);
        assert_eq!(steps[0].status, "completed");
        assert_eq!(steps[1].status, "completed");
        assert_eq!(steps[2].status, "current");
        assert_eq!(steps[3].status, "upcoming");
        assert_eq!(steps[4].status, "upcoming");
    }

    #[test]
    fn constraint_stats_average_formats() {
        let project = sample_project();
        let sections = vec![
            RawRuleSection {
                title: "Ratings".into(),
                rules: vec!["IG only".into(), "No unrated paper".into()],
            },
            RawRuleSection {
                title: "Countries".into(),
                rules: vec!["No sanctioned jurisdictions".into()],
            },
        ];
        let view = constraints_page(&project, Some("guidelines.txt".into()), &sections);
        assert_eq!(view.total_sections, 2);
        assert_eq!(view.total_rules, 3);
        assert_eq!(view.avg_per_section, "1.5");
    }

    fn sample_project() -> ProjectRecord {
        ProjectRecord {
            id: uuid::Uuid::new_v4(),
            name: "Global Bond Mandate".into(),
            customer_id: "cust-1".into(),
            selected_company: None,
            rulesets: Vec::new(),
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }
}
