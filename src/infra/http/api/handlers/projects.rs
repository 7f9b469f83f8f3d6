use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use sentinel_api_types::{
    FunnelResponse, ProjectCreateRequest, ProjectListResponse, SelectCompanyRequest,
};
use uuid::Uuid;

use crate::application::projects::CreateProjectCommand;
use crate::domain::projects::SelectedCompany;

use super::super::error::ApiError;
use super::super::models;
use super::super::state::ApiState;

pub async fn list_projects(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let projects = state.projects.list().await?;
    Ok(Json(ProjectListResponse {
        projects: projects.iter().map(models::project_summary).collect(),
    }))
}

pub async fn create_project(
    State(state): State<ApiState>,
    Json(request): Json<ProjectCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let created = state
        .projects
        .create(CreateProjectCommand {
            name: request.name,
            customer_id: request.customer_id,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(models::project_summary(&created)),
    ))
}

pub async fn get_project(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let project = state.projects.get(id).await?;
    Ok(Json(models::project_detail(&project)))
}

pub async fn select_company(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SelectCompanyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .projects
        .select_company(
            id,
            SelectedCompany {
                company_id: request.company_id,
                company_name: request.company_name,
                fidessa_catalog: request.fidessa_catalog,
            },
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn project_funnel(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let stages = state.simulation.funnel(id).await?;
    Ok(Json(FunnelResponse {
        stages: stages.iter().map(models::funnel_stage).collect(),
    }))
}
