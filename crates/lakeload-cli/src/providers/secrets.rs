use super::SecretStore;
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_secretsmanager::{error::DisplayErrorContext, Client};
use tracing::instrument;

const SERVICE: &str = "SecretsManager";

pub struct SecretsManagerStore {
    client: Client,
}

impl SecretsManagerStore {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            client: Client::new(sdk_config),
        }
    }
}

#[async_trait]
impl SecretStore for SecretsManagerStore {
    #[instrument(skip(self))]
    async fn secret_exists(&self, name: &str) -> Result<bool> {
        match self.client.describe_secret().secret_id(name).send().await {
            Ok(_) => Ok(true),
            Err(e)
                if e
                    .as_service_error()
                    .is_some_and(|se| se.is_resource_not_found_exception()) =>
            {
                Ok(false)
            }
            Err(e) => Err(PipelineError::provider(
                SERVICE,
                DisplayErrorContext(&e).to_string(),
            )),
        }
    }

    #[instrument(skip(self, secret_string))]
    async fn create_secret(&self, name: &str, secret_string: &str) -> Result<()> {
        self.client
            .create_secret()
            .name(name)
            .secret_string(secret_string)
            .send()
            .await
            .map_err(|e| PipelineError::provider(SERVICE, DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }
}
