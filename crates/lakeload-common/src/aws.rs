//! AWS session settings
//!
//! Credentials and region are passed explicitly into every client instead of
//! being picked up by a process-wide session.

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::Credentials;
use std::fmt;

/// Provider name recorded on credentials built from the environment
const CREDENTIALS_PROVIDER_NAME: &str = "lakeload-env";

#[derive(Clone)]
pub struct AwsSettings {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    /// Custom endpoint (LocalStack and similar); `None` for real AWS
    pub endpoint_url: Option<String>,
}

impl AwsSettings {
    /// Build the shared SDK configuration every service client is created from
    pub async fn sdk_config(&self) -> SdkConfig {
        let credentials = Credentials::new(
            &self.access_key_id,
            &self.secret_access_key,
            None,
            None,
            CREDENTIALS_PROVIDER_NAME,
        );

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(self.region.clone()));

        if let Some(endpoint) = &self.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }

        loader.load().await
    }
}

impl fmt::Debug for AwsSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsSettings")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("region", &self.region)
            .field("endpoint_url", &self.endpoint_url)
            .finish()
    }
}

/// SDK configuration from the default credential chain, pinned to `region`
///
/// Used inside the managed runtime, where credentials come from the job role.
pub async fn default_sdk_config(region: &str) -> SdkConfig {
    aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .load()
        .await
}
