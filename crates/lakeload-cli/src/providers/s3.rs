use super::ObjectStore;
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::{error::DisplayErrorContext, primitives::ByteStream, Client};
use std::path::Path;
use tracing::{debug, instrument};

const SERVICE: &str = "S3";

pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            client: Client::new(sdk_config),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[instrument(skip(self))]
    async fn put_file(&self, bucket: &str, key: &str, path: &Path) -> Result<()> {
        let body = ByteStream::from_path(path).await.map_err(|e| {
            PipelineError::provider(SERVICE, format!("cannot read {}: {}", path.display(), e))
        })?;

        debug!("Uploading {} to s3://{}/{}", path.display(), bucket, key);

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| PipelineError::provider(SERVICE, DisplayErrorContext(&e).to_string()))?;

        Ok(())
    }
}
