use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{DocumentsRepo, NewGuidelineDocument, RepoError},
    domain::projects::{GuidelineDocumentRecord, RawRuleSection},
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: Uuid,
    project_id: Uuid,
    filename: String,
    body: String,
    extracted_rules: JsonValue,
    created_at: OffsetDateTime,
}

impl From<DocumentRow> for GuidelineDocumentRecord {
    fn from(row: DocumentRow) -> Self {
        Self {
            id: row.id,
            project_id: row.project_id,
            filename: row.filename,
            body: row.body,
            extracted_rules: serde_json::from_value(row.extracted_rules).unwrap_or_default(),
            created_at: row.created_at,
        }
    }
}

const DOCUMENT_COLUMNS: &str = "id, project_id, filename, body, extracted_rules, created_at";

#[async_trait]
impl DocumentsRepo for PostgresRepositories {
    async fn insert_document(
        &self,
        document: NewGuidelineDocument,
    ) -> Result<GuidelineDocumentRecord, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "INSERT INTO guideline_documents (id, project_id, filename, body) VALUES (",
        );
        let mut fields = qb.separated(", ");
        fields.push_bind(Uuid::new_v4());
        fields.push_bind(document.project_id);
        fields.push_bind(document.filename);
        fields.push_bind(document.body);
        qb.push(") RETURNING ");
        qb.push(DOCUMENT_COLUMNS);

        let row = qb
            .build_query_as::<DocumentRow>()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(GuidelineDocumentRecord::from(row))
    }

    async fn set_document_extraction(
        &self,
        id: Uuid,
        sections: &[RawRuleSection],
    ) -> Result<(), RepoError> {
        let payload = serde_json::to_value(sections).map_err(RepoError::from_persistence)?;

        let mut qb =
            QueryBuilder::<Postgres>::new("UPDATE guideline_documents SET extracted_rules = ");
        qb.push_bind(payload);
        qb.push(" WHERE id = ");
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

    async fn list_documents_for_project(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<GuidelineDocumentRecord>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(DOCUMENT_COLUMNS);
        qb.push(" FROM guideline_documents WHERE project_id = ");
        qb.push_bind(project_id);
        qb.push(" ORDER BY created_at DESC, id DESC");

        let rows = qb
            .build_query_as::<DocumentRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(GuidelineDocumentRecord::from).collect())
    }

    async fn latest_document_for_project(
        &self,
        project_id: Uuid,
    ) -> Result<Option<GuidelineDocumentRecord>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(DOCUMENT_COLUMNS);
        qb.push(" FROM guideline_documents WHERE project_id = ");
        qb.push_bind(project_id);
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT 1");

        let row = qb
            .build_query_as::<DocumentRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(GuidelineDocumentRecord::from))
    }
}
