pub mod config;
pub mod dataset;
pub mod engine;
pub mod equivalence;
pub mod errors;
pub mod metrics_api;
pub mod model;
pub mod prompt;
pub mod providers;
pub mod report;
pub mod value;
