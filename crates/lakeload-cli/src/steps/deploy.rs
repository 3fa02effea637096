//! Template deployment and stack outputs

use crate::error::{PipelineError, Result};
use crate::poll::{PollOutcome, Poller};
use crate::providers::{StackProvisioner, StackStatus};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, instrument};

// ============================================================================
// Output keys the template must declare
// ============================================================================

/// Bucket receiving the CSV data files
pub const GENERATED_BUCKET_NAME: &str = "GeneratedBucketName";

/// Bucket holding the ETL script and the warehouse temp directory
pub const GENERATED_RESOURCE_BUCKET_NAME: &str = "GeneratedResourceBucketName";

pub const GENERATED_CRAWLER: &str = "GeneratedCrawler";

/// Catalog database the crawler writes to
pub const GENERATED_DATABASE_NAME: &str = "GeneratedDatabaseName";

/// Role the ETL job runs as
pub const GENERATED_ROLE_ARN: &str = "GeneratedRoleArn";

/// Output key/value pairs of a stack
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StackOutputs(BTreeMap<String, String>);

impl StackOutputs {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Value of `key`, or [`PipelineError::MissingOutput`]
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| PipelineError::MissingOutput(key.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for StackOutputs {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployOutcome {
    Created(StackOutputs),
    /// Nothing was submitted
    AlreadyExists,
}

/// Read the template file verbatim
pub fn read_template(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(PipelineError::FileNotFound(path.display().to_string()));
    }
    Ok(std::fs::read_to_string(path)?)
}

/// Validate the template, then create the stack unless it already exists.
#[instrument(skip(provisioner, poller, template_body))]
pub async fn deploy_stack(
    provisioner: &dyn StackProvisioner,
    poller: &Poller,
    stack_name: &str,
    template_body: &str,
) -> Result<DeployOutcome> {
    if stack_name.trim().is_empty() {
        return Err(PipelineError::invalid_input(
            "stack name must be a non-empty string",
        ));
    }
    if template_body.trim().is_empty() {
        return Err(PipelineError::invalid_input(
            "template body must be a non-empty CloudFormation template",
        ));
    }

    provisioner.validate_template(template_body).await?;
    info!("CloudFormation template validation succeeded");

    if provisioner.describe_stack(stack_name).await?.is_some() {
        info!(stack = stack_name, "Stack already exists, skipping creation");
        return Ok(DeployOutcome::AlreadyExists);
    }

    let stack_id = provisioner.create_stack(stack_name, template_body).await?;
    info!(stack = stack_name, stack_id = %stack_id, "Stack creation submitted");

    let operation = format!("stack '{}' creation", stack_name);
    let outputs = poller
        .until(&operation, || async move {
            match provisioner.describe_stack(stack_name).await? {
                None => Ok(PollOutcome::Pending("NOT_YET_VISIBLE".to_string())),
                Some(stack) => match stack.status {
                    StackStatus::Complete => Ok(PollOutcome::Done(
                        stack.outputs.into_iter().collect::<StackOutputs>(),
                    )),
                    StackStatus::InProgress(state) => Ok(PollOutcome::Pending(state)),
                    StackStatus::Failed(reason) => Err(PipelineError::StackCreationFailed {
                        stack: stack_name.to_string(),
                        reason,
                    }),
                },
            }
        })
        .await?;

    info!(stack = stack_name, outputs = outputs.len(), "Stack created successfully");

    Ok(DeployOutcome::Created(outputs))
}

/// Outputs of a stack that must already exist
#[instrument(skip(provisioner))]
pub async fn fetch_outputs(
    provisioner: &dyn StackProvisioner,
    stack_name: &str,
) -> Result<StackOutputs> {
    let stack = provisioner
        .describe_stack(stack_name)
        .await?
        .ok_or_else(|| PipelineError::StackNotFound(stack_name.to_string()))?;

    Ok(stack.outputs.into_iter().collect())
}
