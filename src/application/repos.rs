//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::application::pagination::PageRequest;
use crate::domain::projects::{
    GuidelineDocumentRecord, ProjectRecord, RawRuleSection, Ruleset, SelectedCompany,
};
use crate::domain::securities::{ColumnFilter, SecurityColumn, SecurityRecord, SortOrder};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct CreateProjectParams {
    pub name: String,
    pub customer_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct SecurityQueryFilter {
    /// Case-insensitive substring over ISIN, security name, issuer name
    /// and ticker.
    pub search: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct SecuritySort {
    pub column: SecurityColumn,
    pub order: SortOrder,
}

impl Default for SecuritySort {
    fn default() -> Self {
        Self {
            column: SecurityColumn::Isin,
            order: SortOrder::Ascending,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewGuidelineDocument {
    pub project_id: Uuid,
    pub filename: String,
    pub body: String,
}

#[async_trait]
pub trait ProjectsRepo: Send + Sync {
    async fn list_projects(&self) -> Result<Vec<ProjectRecord>, RepoError>;

    async fn find_project(&self, id: Uuid) -> Result<Option<ProjectRecord>, RepoError>;

    async fn find_project_by_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<ProjectRecord>, RepoError>;

    async fn insert_project(
        &self,
        params: CreateProjectParams,
    ) -> Result<ProjectRecord, RepoError>;

    /// Replace a project's ruleset history wholesale. Rulesets live as one
    /// ordered document on the project row, matching how the workflow
    /// appends whole versions.
    async fn update_rulesets(&self, id: Uuid, rulesets: &[Ruleset]) -> Result<(), RepoError>;

    async fn update_selected_company(
        &self,
        id: Uuid,
        company: &SelectedCompany,
    ) -> Result<(), RepoError>;
}

#[async_trait]
pub trait SecuritiesRepo: Send + Sync {
    async fn list_securities(
        &self,
        filter: &SecurityQueryFilter,
        sort: SecuritySort,
        page: PageRequest,
    ) -> Result<Vec<SecurityRecord>, RepoError>;

    async fn count_securities(&self, filter: &SecurityQueryFilter) -> Result<u64, RepoError>;

    /// Count catalog rows passing every filter; an empty slice counts the
    /// whole universe.
    async fn count_matching(&self, filters: &[ColumnFilter]) -> Result<i64, RepoError>;

    async fn insert_securities(&self, records: &[SecurityRecord]) -> Result<u64, RepoError>;
}

#[async_trait]
pub trait DocumentsRepo: Send + Sync {
    async fn insert_document(
        &self,
        document: NewGuidelineDocument,
    ) -> Result<GuidelineDocumentRecord, RepoError>;

    /// Record the rule sections extracted from a stored document.
    async fn set_document_extraction(
        &self,
        id: Uuid,
        sections: &[RawRuleSection],
    ) -> Result<(), RepoError>;

    async fn list_documents_for_project(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<GuidelineDocumentRecord>, RepoError>;

    async fn latest_document_for_project(
        &self,
        project_id: Uuid,
    ) -> Result<Option<GuidelineDocumentRecord>, RepoError>;
}
