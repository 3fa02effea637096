//! Pipeline stages, in execution order
//!
//! Each stage is a free function over the provider traits so it can be run
//! alone from the CLI or as part of a full pipeline run.

pub mod deploy;
pub mod upload;
pub mod secret;
pub mod crawler;
pub mod etl_job;
pub mod reconcile;
