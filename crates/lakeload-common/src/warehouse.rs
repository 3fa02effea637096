//! Warehouse credential payload
//!
//! The same six string keys are written to Secrets Manager by the
//! orchestrator and read back by the ETL unit:
//!
//! ```json
//! {"username":"..","password":"..","dbname":"..","host":"..","port":"5439","engine":"redshift"}
//! ```

use crate::error::{CommonError, Result};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use std::fmt;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseSecret {
    pub username: String,
    pub password: String,
    pub dbname: String,
    pub host: String,
    pub port: String,
    pub engine: String,
}

impl WarehouseSecret {
    /// Serialize to the string stored as the secret value
    pub fn to_secret_string(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a secret value; every key must be present
    pub fn from_secret_string(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| CommonError::InvalidSecret(e.to_string()))
    }

    pub fn port_number(&self) -> Result<u16> {
        match self.port.trim().parse::<u16>() {
            Ok(port) if port > 0 => Ok(port),
            _ => Err(CommonError::InvalidPort(self.port.clone())),
        }
    }

    /// Connection options for a direct PostgreSQL-protocol connection
    pub fn connect_options(&self) -> Result<PgConnectOptions> {
        Ok(PgConnectOptions::new()
            .host(&self.host)
            .port(self.port_number()?)
            .username(&self.username)
            .password(&self.password)
            .database(&self.dbname)
            .ssl_mode(PgSslMode::Prefer))
    }

    /// `jdbc:<engine>://host:port/dbname`, the form managed runtimes log and accept
    pub fn jdbc_url(&self) -> String {
        format!(
            "jdbc:{}://{}:{}/{}",
            self.engine, self.host, self.port, self.dbname
        )
    }
}

impl fmt::Debug for WarehouseSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarehouseSecret")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("dbname", &self.dbname)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("engine", &self.engine)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn secret() -> WarehouseSecret {
        WarehouseSecret {
            username: "awsuser".to_string(),
            password: "Passw0rd!".to_string(),
            dbname: "dev".to_string(),
            host: "cluster.abc123.eu-west-1.redshift.amazonaws.com".to_string(),
            port: "5439".to_string(),
            engine: "redshift".to_string(),
        }
    }

    #[test]
    fn test_secret_string_has_exactly_six_keys() {
        let raw = secret().to_secret_string().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 6);
        for key in ["username", "password", "dbname", "host", "port", "engine"] {
            assert!(object[key].is_string(), "{} should be a string", key);
        }
    }

    #[test]
    fn test_parse_rejects_missing_key() {
        let err = WarehouseSecret::from_secret_string(r#"{"username":"u","password":"p"}"#)
            .unwrap_err();
        assert!(matches!(err, CommonError::InvalidSecret(_)));
    }

    #[test]
    fn test_port_validation() {
        assert_eq!(secret().port_number().unwrap(), 5439);

        let mut bad = secret();
        bad.port = "redshift".to_string();
        assert!(matches!(bad.port_number(), Err(CommonError::InvalidPort(_))));
        bad.port = "0".to_string();
        assert!(bad.connect_options().is_err());
    }

    #[test]
    fn test_jdbc_url() {
        assert_eq!(
            secret().jdbc_url(),
            "jdbc:redshift://cluster.abc123.eu-west-1.redshift.amazonaws.com:5439/dev"
        );
    }

    #[test]
    fn test_debug_redacts_password() {
        assert!(!format!("{:?}", secret()).contains("Passw0rd!"));
    }
}
