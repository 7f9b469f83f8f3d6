use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::comparison::ComparisonError;
use crate::application::error::ErrorReport;
use crate::application::projects::ProjectError;
use crate::application::repos::RepoError;
use crate::application::securities::SecurityError;
use crate::application::simulation::SimulationError;
use crate::application::workflow::WorkflowError;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const NOT_FOUND: &str = "not_found";
    pub const RATE_LIMITED: &str = "rate_limited";
    pub const DUPLICATE: &str = "duplicate";
    pub const INVALID_INPUT: &str = "invalid_input";
    pub const DB_TIMEOUT: &str = "db_timeout";
    pub const REPO: &str = "repo_error";
    pub const AGENT: &str = "agent_error";
    pub const PARSE: &str = "parse_error";
    pub const NO_VERSIONS: &str = "no_versions";
    pub const NOTHING_TO_SIMULATE: &str = "nothing_to_simulate";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message,
            hint,
        }
    }

    pub fn bad_request(message: &'static str, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message, hint)
    }

    pub fn not_found(message: &'static str) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message, None)
    }

    pub fn rate_limited(retry_after: u64) -> Response {
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: codes::RATE_LIMITED.to_string(),
                message: "Rate limit exceeded".to_string(),
                hint: Some(format!("Retry after {retry_after} seconds")),
            },
        };
        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
        if let Ok(value) = axum::http::HeaderValue::from_str(&retry_after.to_string()) {
            response
                .headers_mut()
                .insert(axum::http::header::RETRY_AFTER, value);
        }
        ErrorReport::from_message(
            "infra::http::api::rate_limit",
            StatusCode::TOO_MANY_REQUESTS,
            format!("rate_limited: retry_after={retry_after}"),
        )
        .attach(&mut response);
        response
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let hint = self.hint.clone();
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        // Attach a structured report so shared logging middleware can emit rich diagnostics.
        ErrorReport::from_message(
            "infra::http::api",
            self.status,
            format!("{}: {}", self.code, hint.as_deref().unwrap_or(self.message)),
        )
        .attach(&mut response);
        response
    }
}

fn repo_to_api(err: RepoError) -> ApiError {
    match err {
        RepoError::Duplicate { constraint } => ApiError::new(
            StatusCode::CONFLICT,
            codes::DUPLICATE,
            "Duplicate record",
            Some(constraint),
        ),
        RepoError::NotFound => ApiError::not_found("Resource not found"),
        RepoError::InvalidInput { message } => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Invalid input",
            Some(message),
        ),
        RepoError::Timeout => ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::DB_TIMEOUT,
            "Database timeout",
            None,
        ),
        RepoError::Persistence(message) => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::REPO,
            "Persistence error",
            Some(message),
        ),
    }
}

impl From<ProjectError> for ApiError {
    fn from(err: ProjectError) -> Self {
        match err {
            ProjectError::Validation(message) => {
                ApiError::bad_request("Validation failed", Some(message.to_string()))
            }
            ProjectError::DuplicateCustomer => ApiError::new(
                StatusCode::CONFLICT,
                codes::DUPLICATE,
                "A project already exists for this customer",
                None,
            ),
            ProjectError::NotFound => ApiError::not_found("Project not found"),
            ProjectError::NoRulesets => ApiError::new(
                StatusCode::CONFLICT,
                codes::INVALID_INPUT,
                "Project has no ruleset versions yet",
                None,
            ),
            ProjectError::Repo(repo) => repo_to_api(repo),
        }
    }
}

impl From<SecurityError> for ApiError {
    fn from(err: SecurityError) -> Self {
        match err {
            SecurityError::Repo(repo) => repo_to_api(repo),
        }
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::Validation(message) => {
                ApiError::bad_request("Validation failed", Some(message.to_string()))
            }
            WorkflowError::Project(project) => project.into(),
            WorkflowError::Agent(agent) => ApiError::new(
                StatusCode::BAD_GATEWAY,
                codes::AGENT,
                "Agent service call failed",
                Some(agent.to_string()),
            ),
            WorkflowError::UnparseableReply { source, .. } => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::PARSE,
                "Failed to parse agent response",
                Some(source.to_string()),
            ),
        }
    }
}

impl From<ComparisonError> for ApiError {
    fn from(err: ComparisonError) -> Self {
        match err {
            ComparisonError::Validation(message) => {
                ApiError::bad_request("Validation failed", Some(message.to_string()))
            }
            ComparisonError::NoVersions => ApiError::new(
                StatusCode::NOT_FOUND,
                codes::NO_VERSIONS,
                "No versions found for comparison",
                None,
            ),
            ComparisonError::Project(project) => project.into(),
        }
    }
}

impl From<SimulationError> for ApiError {
    fn from(err: SimulationError) -> Self {
        match err {
            SimulationError::NothingToSimulate => ApiError::new(
                StatusCode::NOT_FOUND,
                codes::NOTHING_TO_SIMULATE,
                "Project has no mapped rules to simulate",
                None,
            ),
            SimulationError::Project(project) => project.into(),
            SimulationError::Repo(repo) => repo_to_api(repo),
        }
    }
}
