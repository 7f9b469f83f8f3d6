//! The projects dashboard view.

use askama::Template;

use crate::domain::projects::ProjectRecord;

use super::views::LayoutContext;
use super::workflow::format_timestamp;

#[derive(Clone)]
pub struct ProjectCardView {
    pub id: String,
    pub name: String,
    pub customer_id: String,
    pub created_at: String,
    pub rulesets_count: usize,
    pub latest_version: String,
}

pub struct ProjectsPageView {
    pub projects: Vec<ProjectCardView>,
}

impl ProjectsPageView {
    pub fn has_projects(&self) -> bool {
        !self.projects.is_empty()
    }
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<ProjectsPageView>,
}

pub fn projects_page(projects: &[ProjectRecord]) -> ProjectsPageView {
    ProjectsPageView {
        projects: projects
            .iter()
            .map(|project| ProjectCardView {
                id: project.id.to_string(),
                name: project.name.clone(),
                customer_id: project.customer_id.clone(),
                created_at: format_timestamp(project.created_at),
                rulesets_count: project.rulesets.len(),
                latest_version: project
                    .latest_ruleset()
                    .map(|ruleset| ruleset.version_name.clone())
                    .unwrap_or_else(|| "\u{2014}".to_owned()),
            })
            .collect(),
    }
}
