use std::sync::Arc;

use crate::application::comparison::RulesDiffService;
use crate::application::projects::ProjectService;
use crate::application::securities::SecurityService;
use crate::application::simulation::SimulationService;
use crate::application::workflow::ConstraintWorkflowService;

use super::rate_limit::ApiRateLimiter;

#[derive(Clone)]
pub struct ApiState {
    pub projects: Arc<ProjectService>,
    pub securities: Arc<SecurityService>,
    pub workflow: Arc<ConstraintWorkflowService>,
    pub comparison: Arc<RulesDiffService>,
    pub simulation: Arc<SimulationService>,
    pub rate_limiter: Arc<ApiRateLimiter>,
}
