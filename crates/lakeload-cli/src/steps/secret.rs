//! Write-once publication of the warehouse credential secret

use crate::error::{PipelineError, Result};
use crate::providers::SecretStore;
use lakeload_common::WarehouseSecret;
use serde::Serialize;
use tracing::{info, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretOutcome {
    Created,
    /// Existing value left untouched
    AlreadyExists,
}

#[instrument(skip(store, payload))]
pub async fn publish_secret(
    store: &dyn SecretStore,
    name: &str,
    payload: &WarehouseSecret,
) -> Result<SecretOutcome> {
    if name.trim().is_empty() {
        return Err(PipelineError::invalid_input("secret name must be non-empty"));
    }

    if store.secret_exists(name).await? {
        info!(secret = name, "Secret already exists, leaving it unchanged");
        return Ok(SecretOutcome::AlreadyExists);
    }

    let secret_string = payload.to_secret_string()?;
    store.create_secret(name, &secret_string).await?;
    info!(secret = name, "Secret created");

    Ok(SecretOutcome::Created)
}
