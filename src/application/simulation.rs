//! Funnel simulation: apply a project's latest mapped rules cumulatively
//! to the security catalog and report the surviving universe per stage.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::application::projects::{ProjectError, ProjectService};
use crate::application::repos::{RepoError, SecuritiesRepo};
use crate::domain::funnel::{self, FunnelStage};
use crate::domain::securities::ColumnFilter;

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("project has no mapped rules to simulate")]
    NothingToSimulate,
    #[error(transparent)]
    Project(#[from] ProjectError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct SimulationService {
    projects: ProjectService,
    securities: Arc<dyn SecuritiesRepo>,
}

impl SimulationService {
    pub fn new(projects: ProjectService, securities: Arc<dyn SecuritiesRepo>) -> Self {
        Self {
            projects,
            securities,
        }
    }

    /// Compute the filtering funnel for a project's latest ruleset.
    /// Each resolvable constraint narrows the running filter set; one
    /// count query runs per stage over lists of at most tens of rules.
    pub async fn funnel(&self, project_id: Uuid) -> Result<Vec<FunnelStage>, SimulationError> {
        let project = self.projects.get(project_id).await?;
        let mapped_rules = project
            .latest_ruleset()
            .map(|ruleset| ruleset.data.mapped_rules.clone())
            .filter(|rules| !rules.is_empty())
            .ok_or(SimulationError::NothingToSimulate)?;

        let stages = funnel::build_stages(&mapped_rules);
        let starting_count = self.securities.count_matching(&[]).await?;

        let mut active: Vec<ColumnFilter> = Vec::new();
        let mut counts = Vec::with_capacity(stages.len());
        let mut running = starting_count;
        for stage in &stages {
            match &stage.filter {
                Some(filter) => {
                    active.push(filter.clone());
                    running = self.securities.count_matching(&active).await?;
                }
                // Unresolvable constraints pass the universe through.
                None => {}
            }
            counts.push(running);
        }

        Ok(funnel::shape_funnel(starting_count, &stages, &counts))
    }
}
