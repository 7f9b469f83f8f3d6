pub mod agents;
pub mod catalog;
pub mod comparison;
pub mod error;
pub mod pagination;
pub mod projects;
pub mod repos;
pub mod securities;
pub mod simulation;
pub mod workflow;
