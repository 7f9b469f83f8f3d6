mod agents;
mod projects;
mod securities;

pub use agents::{gap_analysis, rules_diff, rules_extractor, rules_to_column};
pub use projects::{create_project, get_project, list_projects, project_funnel, select_company};
pub use securities::{SecuritiesQuery, list_securities};
