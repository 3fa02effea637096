use crate::error::{EtlError, Result};
use aws_sdk_secretsmanager::{error::DisplayErrorContext, Client};
use lakeload_common::WarehouseSecret;
use tracing::{info, instrument};

/// Read and parse the warehouse credential secret
#[instrument(skip(client))]
pub async fn fetch_secret(client: &Client, name: &str) -> Result<WarehouseSecret> {
    let output = client
        .get_secret_value()
        .secret_id(name)
        .send()
        .await
        .map_err(|e| EtlError::provider("Secrets Manager", DisplayErrorContext(&e).to_string()))?;

    let raw = output.secret_string().ok_or_else(|| EtlError::InvalidSecret {
        name: name.to_string(),
        reason: "secret has no string value".to_string(),
    })?;

    let secret = parse_secret(name, raw)?;
    info!(secret = name, host = %secret.host, "Warehouse credentials loaded");

    Ok(secret)
}

pub(crate) fn parse_secret(name: &str, raw: &str) -> Result<WarehouseSecret> {
    WarehouseSecret::from_secret_string(raw).map_err(|e| EtlError::InvalidSecret {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_secret() {
        let raw = r#"{"username":"admin","password":"pw","dbname":"dev","host":"h","port":"5439","engine":"redshift"}"#;
        let secret = parse_secret("s", raw).unwrap();
        assert_eq!(secret.dbname, "dev");
    }

    #[test]
    fn test_incomplete_secret_is_rejected() {
        let err = parse_secret("s", r#"{"username":"admin"}"#).unwrap_err();
        assert!(matches!(err, EtlError::InvalidSecret { name, .. } if name == "s"));
    }
}
