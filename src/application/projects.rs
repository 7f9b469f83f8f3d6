//! Project lifecycle: creation, lookup, ruleset versioning and company
//! selection.

use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::application::repos::{CreateProjectParams, ProjectsRepo, RepoError};
use crate::domain::projects::{
    GapFinding, ProjectRecord, Ruleset, RulesetData, SelectedCompany,
};

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("{0}")]
    Validation(&'static str),
    #[error("a project already exists for this customer")]
    DuplicateCustomer,
    #[error("project not found")]
    NotFound,
    #[error("project has no ruleset versions yet")]
    NoRulesets,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct CreateProjectCommand {
    pub name: String,
    pub customer_id: String,
}

#[derive(Clone)]
pub struct ProjectService {
    repo: Arc<dyn ProjectsRepo>,
}

impl ProjectService {
    pub fn new(repo: Arc<dyn ProjectsRepo>) -> Self {
        Self { repo }
    }

    pub async fn list(&self) -> Result<Vec<ProjectRecord>, ProjectError> {
        self.repo.list_projects().await.map_err(ProjectError::from)
    }

    pub async fn create(&self, command: CreateProjectCommand) -> Result<ProjectRecord, ProjectError> {
        let name = command.name.trim();
        if name.is_empty() {
            return Err(ProjectError::Validation("name is required"));
        }
        let customer_id = command.customer_id.trim();
        if customer_id.is_empty() {
            return Err(ProjectError::Validation("customer_id is required"));
        }

        let created = self
            .repo
            .insert_project(CreateProjectParams {
                name: name.to_owned(),
                customer_id: customer_id.to_owned(),
            })
            .await
            .map_err(|err| match err {
                RepoError::Duplicate { .. } => ProjectError::DuplicateCustomer,
                other => ProjectError::Repo(other),
            })?;

        info!(
            target = "sentinel::projects",
            project_id = %created.id,
            customer_id = %created.customer_id,
            "project created"
        );

        Ok(created)
    }

    pub async fn get(&self, id: Uuid) -> Result<ProjectRecord, ProjectError> {
        self.repo
            .find_project(id)
            .await?
            .ok_or(ProjectError::NotFound)
    }

    pub async fn get_by_customer(&self, customer_id: &str) -> Result<ProjectRecord, ProjectError> {
        self.repo
            .find_project_by_customer(customer_id)
            .await?
            .ok_or(ProjectError::NotFound)
    }

    pub async fn select_company(
        &self,
        id: Uuid,
        company: SelectedCompany,
    ) -> Result<(), ProjectError> {
        if company.company_id.trim().is_empty() || company.company_name.trim().is_empty() {
            return Err(ProjectError::Validation(
                "company_id and company_name are required",
            ));
        }

        let project = self.get(id).await?;
        self.repo
            .update_selected_company(project.id, &company)
            .await
            .map_err(ProjectError::from)
    }

    /// Append a new ruleset version. Version numbers are server-assigned
    /// and monotonic; the version name follows as `v{n}`.
    pub async fn append_ruleset(
        &self,
        customer_id: &str,
        data: RulesetData,
    ) -> Result<Ruleset, ProjectError> {
        let mut project = self.get_by_customer(customer_id).await?;

        let version = project.next_version();
        let ruleset = Ruleset {
            version,
            version_name: format!("v{version}"),
            created_at: OffsetDateTime::now_utc(),
            data,
        };

        project.rulesets.push(ruleset.clone());
        self.repo
            .update_rulesets(project.id, &project.rulesets)
            .await?;

        info!(
            target = "sentinel::projects",
            project_id = %project.id,
            version = ruleset.version,
            "ruleset version appended"
        );

        Ok(ruleset)
    }

    /// Attach gap-analysis findings to the latest ruleset version.
    pub async fn attach_gap_analysis(
        &self,
        customer_id: &str,
        findings: Vec<GapFinding>,
    ) -> Result<(), ProjectError> {
        let mut project = self.get_by_customer(customer_id).await?;

        let Some(latest) = project.rulesets.last_mut() else {
            return Err(ProjectError::NoRulesets);
        };
        latest.data.gap_analysis = findings;
        let version_name = latest.version_name.clone();

        self.repo
            .update_rulesets(project.id, &project.rulesets)
            .await?;

        info!(
            target = "sentinel::projects",
            project_id = %project.id,
            version_name = %version_name,
            customer_id = %customer_id,
            "gap analysis saved"
        );

        Ok(())
    }

}
