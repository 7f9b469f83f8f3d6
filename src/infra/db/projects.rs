use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{CreateProjectParams, ProjectsRepo, RepoError},
    domain::projects::{ProjectRecord, Ruleset, SelectedCompany},
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: Uuid,
    name: String,
    customer_id: String,
    company_id: Option<String>,
    company_name: Option<String>,
    fidessa_catalog: Option<JsonValue>,
    rulesets: JsonValue,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<ProjectRow> for ProjectRecord {
    fn from(row: ProjectRow) -> Self {
        let selected_company = match (row.company_id, row.company_name, row.fidessa_catalog) {
            (Some(company_id), Some(company_name), Some(catalog)) => Some(SelectedCompany {
                company_id,
                company_name,
                fidessa_catalog: serde_json::from_value(catalog).unwrap_or_default(),
            }),
            _ => None,
        };

        Self {
            id: row.id,
            name: row.name,
            customer_id: row.customer_id,
            selected_company,
            rulesets: serde_json::from_value(row.rulesets).unwrap_or_default(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const PROJECT_COLUMNS: &str = "id, name, customer_id, company_id, company_name, \
     fidessa_catalog, rulesets, created_at, updated_at";

#[async_trait]
impl ProjectsRepo for PostgresRepositories {
    async fn list_projects(&self) -> Result<Vec<ProjectRecord>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(PROJECT_COLUMNS);
        qb.push(" FROM projects ORDER BY created_at DESC, id DESC");

        let rows = qb
            .build_query_as::<ProjectRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(ProjectRecord::from).collect())
    }

    async fn find_project(&self, id: Uuid) -> Result<Option<ProjectRecord>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(PROJECT_COLUMNS);
        qb.push(" FROM projects WHERE id = ");
        qb.push_bind(id);

        let row = qb
            .build_query_as::<ProjectRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(ProjectRecord::from))
    }

    async fn find_project_by_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<ProjectRecord>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(PROJECT_COLUMNS);
        qb.push(" FROM projects WHERE customer_id = ");
        qb.push_bind(customer_id);

        let row = qb
            .build_query_as::<ProjectRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(ProjectRecord::from))
    }

    async fn insert_project(
        &self,
        params: CreateProjectParams,
    ) -> Result<ProjectRecord, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "INSERT INTO projects (id, name, customer_id, rulesets) VALUES (",
        );
        let mut fields = qb.separated(", ");
        fields.push_bind(Uuid::new_v4());
        fields.push_bind(params.name);
        fields.push_bind(params.customer_id);
        fields.push_bind(JsonValue::Array(Vec::new()));
        qb.push(") RETURNING ");
        qb.push(PROJECT_COLUMNS);

        let row = qb
            .build_query_as::<ProjectRow>()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(ProjectRecord::from(row))
    }

    async fn update_rulesets(&self, id: Uuid, rulesets: &[Ruleset]) -> Result<(), RepoError> {
        let payload =
            serde_json::to_value(rulesets).map_err(RepoError::from_persistence)?;

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE projects SET rulesets = ");
        qb.push_bind(payload);
        qb.push(", updated_at = now() WHERE id = ");
        qb.push_bind(id);

        let result = qb
            .build()
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn update_selected_company(
        &self,
        id: Uuid,
        company: &SelectedCompany,
    ) -> Result<(), RepoError> {
        let catalog =
            serde_json::to_value(&company.fidessa_catalog).map_err(RepoError::from_persistence)?;

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE projects SET company_id = ");
        qb.push_bind(&company.company_id);
        qb.push(", company_name = ");
        qb.push_bind(&company.company_name);
        qb.push(", fidessa_catalog = ");
        qb.push_bind(catalog);
        qb.push(", updated_at = now() WHERE id = ");
        qb.push_bind(id);

        let result = qb
            .build()
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
