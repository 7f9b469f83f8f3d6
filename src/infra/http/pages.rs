//! Server-rendered workflow pages.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Form, Multipart, Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;
use uuid::Uuid;

use crate::{
    application::{
        comparison::{ComparisonError, RulesDiffService},
        error::ErrorReport,
        projects::{CreateProjectCommand, ProjectError, ProjectService},
        repos::DocumentsRepo,
        securities::{SecurityListQuery, SecurityService},
        simulation::{SimulationError, SimulationService},
        workflow::{ConstraintWorkflowService, ExtractCommand, GapAnalysisCommand, MapRulesCommand},
    },
    infra::db::PostgresRepositories,
    presentation::{
        comparison as comparison_views, projects as project_views, securities as security_views,
        simulation as simulation_views,
        views::{
            LayoutChrome, LayoutContext, render_error_response, render_not_found_response,
            render_template_response,
        },
        workflow as workflow_views,
    },
};

use super::RouterState;
use super::middleware::{log_responses, set_request_context};

#[derive(Clone)]
pub struct PagesState {
    pub projects: Arc<ProjectService>,
    pub securities: Arc<SecurityService>,
    pub workflow: Arc<ConstraintWorkflowService>,
    pub comparison: Arc<RulesDiffService>,
    pub simulation: Arc<SimulationService>,
    pub documents: Arc<dyn DocumentsRepo>,
    pub db: Arc<PostgresRepositories>,
}

pub fn build_pages_router() -> Router<RouterState> {
    Router::new()
        .route("/", get(index))
        .route("/projects", post(create_project))
        .route("/projects/{id}", get(project_overview))
        .route("/projects/{id}/upload", post(upload_document))
        .route("/projects/{id}/constraints", get(constraints))
        .route("/projects/{id}/generate", post(generate_rules))
        .route("/projects/{id}/rules", get(rules))
        .route("/projects/{id}/comparison", get(comparison))
        .route("/projects/{id}/simulation", get(simulation))
        .route("/securities", get(securities))
        .route("/healthz", get(health))
        .route("/static/{*path}", get(serve_static))
        .fallback(not_found)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn serve_static(path: Option<Path<String>>) -> Response {
    crate::infra::assets::serve(path).await
}

async fn not_found() -> Response {
    render_not_found_response(LayoutChrome::new(""))
}

async fn health(State(state): State<PagesState>) -> Response {
    match state.db.health_check().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::pages::health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

fn project_error_response(chrome: LayoutChrome, err: ProjectError) -> Response {
    match err {
        ProjectError::NotFound => render_not_found_response(chrome),
        other => render_error_response(
            chrome,
            StatusCode::INTERNAL_SERVER_ERROR,
            other.to_string(),
        ),
    }
}

async fn index(State(state): State<PagesState>) -> Response {
    let chrome = LayoutChrome::new("/");
    match state.projects.list().await {
        Ok(projects) => {
            let content = project_views::projects_page(&projects);
            let view = LayoutContext::new(chrome, "Projects", content);
            render_template_response(project_views::IndexTemplate { view }, StatusCode::OK)
        }
        Err(err) => project_error_response(chrome, err),
    }
}

#[derive(Debug, Deserialize)]
struct CreateProjectForm {
    name: String,
    customer_id: String,
}

async fn create_project(
    State(state): State<PagesState>,
    Form(form): Form<CreateProjectForm>,
) -> Response {
    match state
        .projects
        .create(CreateProjectCommand {
            name: form.name,
            customer_id: form.customer_id,
        })
        .await
    {
        Ok(project) => Redirect::to(&format!("/projects/{}", project.id)).into_response(),
        Err(ProjectError::Validation(message)) => render_error_response(
            LayoutChrome::new("/"),
            StatusCode::BAD_REQUEST,
            message.to_string(),
        ),
        Err(ProjectError::DuplicateCustomer) => render_error_response(
            LayoutChrome::new("/"),
            StatusCode::CONFLICT,
            "a project already exists for this customer".to_string(),
        ),
        Err(err) => project_error_response(LayoutChrome::new("/"), err),
    }
}

async fn project_overview(State(state): State<PagesState>, Path(id): Path<Uuid>) -> Response {
    let chrome = LayoutChrome::new("/");
    let project = match state.projects.get(id).await {
        Ok(project) => project,
        Err(err) => return project_error_response(chrome, err),
    };

    let documents = match state.documents.list_documents_for_project(project.id).await {
        Ok(documents) => documents,
        Err(err) => {
            return render_error_response(
                chrome,
                StatusCode::INTERNAL_SERVER_ERROR,
                err.to_string(),
            );
        }
    };

    let content = workflow_views::project_overview(&project, &documents);
    let view = LayoutContext::new(chrome, project.name.clone(), content);
    render_template_response(workflow_views::ProjectTemplate { view }, StatusCode::OK)
}

async fn upload_document(
    State(state): State<PagesState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Response {
    let chrome = LayoutChrome::new("/");
    let project = match state.projects.get(id).await {
        Ok(project) => project,
        Err(err) => return project_error_response(chrome, err),
    };

    let mut filename = None;
    let mut document_text = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some("document") => {
                filename = field.file_name().map(str::to_owned);
                match field.text().await {
                    Ok(text) => document_text = Some(text),
                    Err(err) => {
                        return render_error_response(
                            chrome,
                            StatusCode::BAD_REQUEST,
                            format!("failed to read uploaded file: {err}"),
                        );
                    }
                }
            }
            Ok(Some(_)) => continue,
            Ok(None) => break,
            Err(err) => {
                return render_error_response(
                    chrome,
                    StatusCode::BAD_REQUEST,
                    format!("malformed upload: {err}"),
                );
            }
        }
    }

    let Some(document_text) = document_text else {
        return render_error_response(
            chrome,
            StatusCode::BAD_REQUEST,
            "upload is missing the `document` file field".to_string(),
        );
    };

    match state
        .workflow
        .extract(ExtractCommand {
            project_id: project.id,
            customer_id: project.customer_id.clone(),
            document_text,
            filename,
        })
        .await
    {
        Ok(_) => Redirect::to(&format!("/projects/{}/constraints", project.id)).into_response(),
        Err(err) => {
            error!(
                target = "sentinel::http::pages",
                project_id = %project.id,
                error = %err,
                "extraction failed"
            );
            render_error_response(chrome, StatusCode::BAD_GATEWAY, err.to_string())
        }
    }
}

async fn constraints(State(state): State<PagesState>, Path(id): Path<Uuid>) -> Response {
    let chrome = LayoutChrome::new("/");
    let project = match state.projects.get(id).await {
        Ok(project) => project,
        Err(err) => return project_error_response(chrome, err),
    };

    let document = match state.documents.latest_document_for_project(project.id).await {
        Ok(document) => document,
        Err(err) => {
            return render_error_response(
                chrome,
                StatusCode::INTERNAL_SERVER_ERROR,
                err.to_string(),
            );
        }
    };

    let (filename, sections) = match document {
        Some(document) => (Some(document.filename), document.extracted_rules),
        None => (None, Vec::new()),
    };

    let content = workflow_views::constraints_page(&project, filename, &sections);
    let view = LayoutContext::new(chrome, "Constraint Extraction", content);
    render_template_response(workflow_views::ConstraintsTemplate { view }, StatusCode::OK)
}

async fn generate_rules(State(state): State<PagesState>, Path(id): Path<Uuid>) -> Response {
    let chrome = LayoutChrome::new("/");
    let project = match state.projects.get(id).await {
        Ok(project) => project,
        Err(err) => return project_error_response(chrome, err),
    };

    let sections = match state.documents.latest_document_for_project(project.id).await {
        Ok(Some(document)) if !document.extracted_rules.is_empty() => document.extracted_rules,
        Ok(_) => {
            return render_error_response(
                chrome,
                StatusCode::BAD_REQUEST,
                "no extracted rules available; upload and extract a document first".to_string(),
            );
        }
        Err(err) => {
            return render_error_response(
                chrome,
                StatusCode::INTERNAL_SERVER_ERROR,
                err.to_string(),
            );
        }
    };

    let mapped = match state
        .workflow
        .map_rules(MapRulesCommand {
            project_id: project.id,
            customer_id: project.customer_id.clone(),
            rules_extractor_response: json!({ "rules": sections }),
        })
        .await
    {
        Ok((_, mapped)) => mapped,
        Err(err) => {
            return render_error_response(chrome, StatusCode::BAD_GATEWAY, err.to_string());
        }
    };

    if let Err(err) = state
        .workflow
        .gap_analysis(GapAnalysisCommand {
            project_id: project.id,
            customer_id: project.customer_id.clone(),
            rules_to_column_response: json!({ "mapped_rules": mapped }),
            fidessa_catalog: None,
        })
        .await
    {
        return render_error_response(chrome, StatusCode::BAD_GATEWAY, err.to_string());
    }

    Redirect::to(&format!("/projects/{}/rules", project.id)).into_response()
}

async fn rules(State(state): State<PagesState>, Path(id): Path<Uuid>) -> Response {
    let chrome = LayoutChrome::new("/");
    let project = match state.projects.get(id).await {
        Ok(project) => project,
        Err(err) => return project_error_response(chrome, err),
    };

    let Some(latest) = project.latest_ruleset() else {
        return Redirect::to(&format!("/projects/{}", project.id)).into_response();
    };

    let content = workflow_views::rules_page(
        &project,
        &latest.version_name,
        &latest.data.mapped_rules,
        &latest.data.gap_analysis,
    );
    let view = LayoutContext::new(chrome, "Rules & Gap Analysis", content);
    render_template_response(workflow_views::RulesTemplate { view }, StatusCode::OK)
}

async fn comparison(State(state): State<PagesState>, Path(id): Path<Uuid>) -> Response {
    let chrome = LayoutChrome::new("/");
    let project = match state.projects.get(id).await {
        Ok(project) => project,
        Err(err) => return project_error_response(chrome, err),
    };

    let diff = match state.comparison.compare_stored(&project.customer_id).await {
        Ok(diff) => diff,
        Err(ComparisonError::NoVersions) => {
            return render_error_response(
                chrome,
                StatusCode::NOT_FOUND,
                "no versions found for comparison".to_string(),
            );
        }
        Err(err) => {
            return render_error_response(
                chrome,
                StatusCode::INTERNAL_SERVER_ERROR,
                err.to_string(),
            );
        }
    };

    let content = comparison_views::comparison_page(&project.id.to_string(), &diff);
    let view = LayoutContext::new(chrome, "Version Comparison", content);
    render_template_response(
        comparison_views::ComparisonTemplate { view },
        StatusCode::OK,
    )
}

async fn simulation(State(state): State<PagesState>, Path(id): Path<Uuid>) -> Response {
    let chrome = LayoutChrome::new("/");
    let project = match state.projects.get(id).await {
        Ok(project) => project,
        Err(err) => return project_error_response(chrome, err),
    };

    let stages = match state.simulation.funnel(project.id).await {
        Ok(stages) => stages,
        Err(SimulationError::NothingToSimulate) => {
            return render_error_response(
                chrome,
                StatusCode::NOT_FOUND,
                "project has no mapped rules to simulate".to_string(),
            );
        }
        Err(err) => {
            return render_error_response(
                chrome,
                StatusCode::INTERNAL_SERVER_ERROR,
                err.to_string(),
            );
        }
    };

    let content = simulation_views::simulation_page(&project.id.to_string(), &stages);
    let view = LayoutContext::new(chrome, "Universe Simulation", content);
    render_template_response(
        simulation_views::SimulationTemplate { view },
        StatusCode::OK,
    )
}

#[derive(Debug, Deserialize)]
struct SecuritiesPageQuery {
    page: Option<u32>,
    limit: Option<u32>,
    search: Option<String>,
    sort_by: Option<String>,
    sort_order: Option<String>,
}

async fn securities(
    State(state): State<PagesState>,
    axum::extract::Query(query): axum::extract::Query<SecuritiesPageQuery>,
) -> Response {
    let chrome = LayoutChrome::new("/securities");
    let search = query.search.clone().unwrap_or_default();
    let sort_by = query.sort_by.clone().unwrap_or_else(|| "ISIN".to_owned());
    let sort_order = query.sort_order.clone().unwrap_or_else(|| "asc".to_owned());

    match state
        .securities
        .list(SecurityListQuery {
            page: query.page,
            limit: query.limit,
            search: query.search,
            sort_by: query.sort_by,
            sort_order: query.sort_order,
        })
        .await
    {
        Ok(page) => {
            let content = security_views::securities_page(
                &page.securities,
                page.pagination,
                &search,
                &sort_by,
                &sort_order,
            );
            let view = LayoutContext::new(chrome, "Securities Database", content);
            render_template_response(
                security_views::SecuritiesTemplate { view },
                StatusCode::OK,
            )
        }
        Err(err) => render_error_response(
            chrome,
            StatusCode::INTERNAL_SERVER_ERROR,
            err.to_string(),
        ),
    }
}
