pub mod diff;
pub mod error;
pub mod funnel;
pub mod projects;
pub mod securities;
