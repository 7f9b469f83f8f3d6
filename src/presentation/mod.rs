pub mod comparison;
pub mod projects;
pub mod securities;
pub mod simulation;
pub mod views;
pub mod workflow;
