use axum::Json;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use sentinel_api_types::SecurityListResponse;
use serde::Deserialize;

use crate::application::securities::SecurityListQuery;

use super::super::error::ApiError;
use super::super::models;
use super::super::state::ApiState;

#[derive(Debug, Deserialize)]
pub struct SecuritiesQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    #[serde(alias = "sortBy")]
    pub sort_by: Option<String>,
    #[serde(alias = "sortOrder")]
    pub sort_order: Option<String>,
}

pub async fn list_securities(
    State(state): State<ApiState>,
    Query(query): Query<SecuritiesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .securities
        .list(SecurityListQuery {
            page: query.page,
            limit: query.limit,
            search: query.search,
            sort_by: query.sort_by,
            sort_order: query.sort_order,
        })
        .await?;

    Ok(Json(SecurityListResponse {
        securities: page.securities.iter().map(models::security_dto).collect(),
        pagination: models::pagination_dto(page.pagination),
    }))
}
