pub mod api;
pub mod middleware;
mod pages;

pub use api::rate_limit::ApiRateLimiter;
pub use api::{ApiState, build_api_router};
pub use pages::{PagesState, build_pages_router};

use axum::extract::FromRef;

#[derive(Clone)]
pub struct RouterState {
    pub pages: PagesState,
    pub api: ApiState,
}

impl FromRef<RouterState> for PagesState {
    fn from_ref(state: &RouterState) -> Self {
        state.pages.clone()
    }
}

impl FromRef<RouterState> for ApiState {
    fn from_ref(state: &RouterState) -> Self {
        state.api.clone()
    }
}
