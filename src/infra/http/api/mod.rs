pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod rate_limit;
pub mod state;

pub use state::ApiState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post, put},
};

use crate::infra::http::RouterState;
use crate::infra::http::middleware::log_responses;

pub fn build_api_router(state: RouterState) -> Router<RouterState> {
    let rate_state = state.api.clone();

    Router::new()
        .route(
            "/api/projects",
            get(handlers::list_projects).post(handlers::create_project),
        )
        .route("/api/projects/{id}", get(handlers::get_project))
        .route("/api/projects/{id}/company", put(handlers::select_company))
        .route("/api/projects/{id}/funnel", get(handlers::project_funnel))
        .route("/api/securities", get(handlers::list_securities))
        .route("/api/agents/rules-extractor", post(handlers::rules_extractor))
        .route("/api/agents/rules-to-column", post(handlers::rules_to_column))
        .route("/api/agents/gap-analysis", post(handlers::gap_analysis))
        .route("/api/agents/rules-diff", post(handlers::rules_diff))
        .with_state(state)
        .layer(axum_middleware::from_fn_with_state(
            rate_state,
            middleware::api_rate_limit,
        ))
        .layer(axum_middleware::from_fn(log_responses))
}
