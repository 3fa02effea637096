//! lakeload ETL unit
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! The job the managed runtime executes after the crawler has cataloged the
//! uploaded CSVs. For each table in [`schema::TABLE_SCHEMAS`], or those named
//! by `--TABLES`, it:
//!
//! 1. looks up the catalog table's S3 location,
//! 2. stages the table's objects under the warehouse temp directory,
//! 3. drops and recreates the warehouse table from its literal schema,
//! 4. `COPY`s every staged partition in, inside one transaction,
//! 5. removes the staged copies.

pub mod args;
pub mod catalog;
pub mod error;
pub mod job;
pub mod load;
pub mod schema;
pub mod secret;
pub mod staging;

pub use args::JobArgs;
pub use error::{EtlError, Result};
