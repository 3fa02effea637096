use super::{StackDescription, StackProvisioner, StackStatus};
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_cloudformation::{
    error::{DisplayErrorContext, ProvideErrorMetadata},
    types::{Capability, Stack},
    Client,
};
use tracing::{debug, instrument};

const SERVICE: &str = "CloudFormation";

pub struct CloudFormationProvisioner {
    client: Client,
}

impl CloudFormationProvisioner {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            client: Client::new(sdk_config),
        }
    }
}

#[async_trait]
impl StackProvisioner for CloudFormationProvisioner {
    #[instrument(skip(self, template_body))]
    async fn validate_template(&self, template_body: &str) -> Result<()> {
        self.client
            .validate_template()
            .template_body(template_body)
            .send()
            .await
            .map_err(|e| PipelineError::TemplateValidation(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn describe_stack(&self, stack_name: &str) -> Result<Option<StackDescription>> {
        match self.client.describe_stacks().stack_name(stack_name).send().await {
            Ok(output) => Ok(output.stacks().first().map(|s| describe(stack_name, s))),
            Err(e) if is_missing_stack(e.message(), stack_name) => {
                debug!(stack = stack_name, "Stack does not exist");
                Ok(None)
            }
            Err(e) => Err(PipelineError::provider(
                SERVICE,
                DisplayErrorContext(&e).to_string(),
            )),
        }
    }

    #[instrument(skip(self, template_body))]
    async fn create_stack(&self, stack_name: &str, template_body: &str) -> Result<String> {
        let output = self
            .client
            .create_stack()
            .stack_name(stack_name)
            .template_body(template_body)
            .capabilities(Capability::CapabilityIam)
            .send()
            .await
            .map_err(|e| PipelineError::provider(SERVICE, DisplayErrorContext(&e).to_string()))?;

        Ok(output.stack_id().unwrap_or(stack_name).to_string())
    }
}

/// DescribeStacks reports an unknown stack as a ValidationError with this message
fn is_missing_stack(message: Option<&str>, stack_name: &str) -> bool {
    message.is_some_and(|m| m == format!("Stack with id {} does not exist", stack_name))
}

fn describe(stack_name: &str, stack: &Stack) -> StackDescription {
    let status = stack
        .stack_status()
        .map(|s| classify_stack_status(s.as_str(), stack.stack_status_reason()))
        .unwrap_or_else(|| StackStatus::InProgress("UNKNOWN".to_string()));

    let outputs = stack
        .outputs()
        .iter()
        .filter_map(|o| Some((o.output_key()?.to_string(), o.output_value()?.to_string())))
        .collect();

    StackDescription {
        name: stack_name.to_string(),
        status,
        outputs,
    }
}

/// Any ROLLBACK, DELETE or FAILED status ends a creation attempt
pub(crate) fn classify_stack_status(status: &str, reason: Option<&str>) -> StackStatus {
    match status {
        "CREATE_COMPLETE" | "UPDATE_COMPLETE" | "IMPORT_COMPLETE" => StackStatus::Complete,
        s if s.contains("ROLLBACK") || s.starts_with("DELETE") || s.ends_with("FAILED") => {
            StackStatus::Failed(match reason {
                Some(r) => format!("{}: {}", s, r),
                None => s.to_string(),
            })
        }
        s => StackStatus::InProgress(s.to_string()),
    }
}
