//! lakeload Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Pieces shared by the orchestrator (`lakeload`) and the remote ETL unit
//! (`lakeload-etl`):
//!
//! - **Logging**: tracing subscriber setup driven by `LOG_*` variables
//! - **Errors**: [`CommonError`] and the [`Result`] alias
//! - **AWS session**: explicit credentials/region turned into an `SdkConfig`
//! - **Warehouse secret**: the six-key credential payload stored in Secrets
//!   Manager and the connection options derived from it

pub mod aws;
pub mod error;
pub mod logging;
pub mod warehouse;

pub use aws::AwsSettings;
pub use error::{CommonError, Result};
pub use warehouse::WarehouseSecret;
