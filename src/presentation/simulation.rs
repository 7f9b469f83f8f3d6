//! The universe-filtering funnel view.

use askama::Template;

use crate::domain::funnel::FunnelStage;

use super::views::LayoutContext;
use super::workflow::{StepView, stepper};

#[derive(Clone)]
pub struct StageBarView {
    pub name: String,
    pub count: i64,
    pub removed: i64,
    pub percentage: u32,
    pub is_final: bool,
}

pub struct SimulationPageView {
    pub project_id: String,
    pub steps: Vec<StepView>,
    pub stages: Vec<StageBarView>,
    pub starting_count: i64,
    pub final_count: i64,
    pub pass_rate: u32,
}

#[derive(Template)]
#[template(path = "simulation.html")]
pub struct SimulationTemplate {
    pub view: LayoutContext<SimulationPageView>,
}

pub fn simulation_page(project_id: &str, stages: &[FunnelStage]) -> SimulationPageView {
    let starting_count = stages.first().map(|stage| stage.count).unwrap_or(0);
    let final_count = stages.last().map(|stage| stage.count).unwrap_or(0);
    let pass_rate = if starting_count > 0 {
        ((final_count as f64 / starting_count as f64) * 100.0).round() as u32
    } else {
        0
    };

    let last_index = stages.len().saturating_sub(1);
    SimulationPageView {
        project_id: project_id.to_owned(),
        steps: stepper(5),
        stages: stages
            .iter()
            .enumerate()
            .map(|(index, stage)| StageBarView {
                name: stage.name.clone(),
                count: stage.count,
                removed: stage.removed,
                percentage: stage.percentage,
                is_final: index == last_index,
            })
            .collect(),
        starting_count,
        final_count,
        pass_rate,
    }
}
