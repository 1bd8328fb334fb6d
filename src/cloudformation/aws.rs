//! CloudFormation implementation of the provider seam.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_cloudformation::Client;
use aws_sdk_cloudformation::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_cloudformation::types::{
    Capability as CfnCapability, Parameter as CfnParameter, Stack as CfnStack,
    StackStatus as CfnStackStatus, Tag as CfnTag,
};
use tracing::{debug, trace};

use super::api::CloudFormationApi;
use super::parameters::{Parameter, ParameterValue, StackOutputs};
use super::types::{StackDescription, StackRequest};
use crate::error::{Result, StackError};

const NO_UPDATES_MESSAGE: &str = "No updates are to be performed";
const DOES_NOT_EXIST_MESSAGE: &str = "does not exist";

/// Stack provider backed by the AWS CloudFormation API.
#[derive(Debug, Clone)]
pub struct AwsCloudFormation {
    client: Client,
}

impl AwsCloudFormation {
    /// Creates a provider from a loaded SDK config.
    #[must_use]
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }

    fn parameters(request: &StackRequest) -> Vec<CfnParameter> {
        request.parameters.iter().map(to_cfn_parameter).collect()
    }

    fn capabilities(request: &StackRequest) -> Vec<CfnCapability> {
        request
            .capabilities
            .iter()
            .map(|c| CfnCapability::from(c.as_str()))
            .collect()
    }

    fn tags(request: &StackRequest) -> Option<Vec<CfnTag>> {
        if request.tags.is_empty() {
            return None;
        }
        Some(
            request
                .tags
                .iter()
                .map(|tag| CfnTag::builder().key(&tag.key).value(&tag.value).build())
                .collect(),
        )
    }
}

fn to_cfn_parameter(parameter: &Parameter) -> CfnParameter {
    let builder = CfnParameter::builder().parameter_key(&parameter.key);
    match &parameter.value {
        ParameterValue::Concrete(value) => builder.parameter_value(value).build(),
        ParameterValue::CarryForward => builder.use_previous_value(true).build(),
    }
}

fn to_description(stack: &CfnStack) -> StackDescription {
    let status = stack
        .stack_status()
        .map(CfnStackStatus::as_str)
        .unwrap_or_default()
        .parse()
        .unwrap_or_else(|never| match never {});

    let outputs: StackOutputs = stack
        .outputs()
        .iter()
        .filter_map(|output| Some((output.output_key()?, output.output_value()?)))
        .collect();

    StackDescription {
        name: stack.stack_name().unwrap_or_default().to_string(),
        stack_id: stack.stack_id().unwrap_or_default().to_string(),
        status,
        status_reason: stack.stack_status_reason().map(str::to_string),
        outputs,
    }
}

#[async_trait]
impl CloudFormationApi for AwsCloudFormation {
    async fn submit_create(&self, request: &StackRequest) -> Result<String> {
        debug!(stack = %request.name, "Submitting create");

        let output = self
            .client
            .create_stack()
            .stack_name(&request.name)
            .template_body(&request.template_body)
            .set_parameters(Some(Self::parameters(request)))
            .set_capabilities(Some(Self::capabilities(request)))
            .set_tags(Self::tags(request))
            .send()
            .await
            .map_err(|e| {
                StackError::rejected(&request.name, "create", DisplayErrorContext(&e).to_string())
            })?;

        output.stack_id().map(str::to_string).ok_or_else(|| {
            StackError::InvalidResponse {
                message: format!("create of {} returned no stack id", request.name),
            }
            .into()
        })
    }

    async fn submit_update(&self, request: &StackRequest) -> Result<Option<String>> {
        debug!(stack = %request.name, "Submitting update");

        let result = self
            .client
            .update_stack()
            .stack_name(&request.name)
            .template_body(&request.template_body)
            .set_parameters(Some(Self::parameters(request)))
            .set_capabilities(Some(Self::capabilities(request)))
            .set_tags(Self::tags(request))
            .send()
            .await;

        match result {
            Ok(output) => Ok(Some(output.stack_id().unwrap_or_default().to_string())),
            Err(err) => {
                let service = err.into_service_error();
                if service
                    .message()
                    .is_some_and(|m| m.contains(NO_UPDATES_MESSAGE))
                {
                    debug!(stack = %request.name, "No updates to perform");
                    return Ok(None);
                }
                Err(StackError::rejected(
                    &request.name,
                    "update",
                    DisplayErrorContext(&service).to_string(),
                )
                .into())
            }
        }
    }

    async fn submit_delete(&self, stack_name: &str) -> Result<()> {
        debug!(stack = %stack_name, "Submitting delete");

        self.client
            .delete_stack()
            .stack_name(stack_name)
            .send()
            .await
            .map_err(|e| {
                StackError::rejected(stack_name, "delete", DisplayErrorContext(&e).to_string())
            })?;
        Ok(())
    }

    async fn describe(&self, stack_name: &str) -> Result<Option<StackDescription>> {
        trace!(stack = %stack_name, "Describing stack");

        let output = match self
            .client
            .describe_stacks()
            .stack_name(stack_name)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) => {
                let service = err.into_service_error();
                if service
                    .message()
                    .is_some_and(|m| m.contains(DOES_NOT_EXIST_MESSAGE))
                {
                    return Ok(None);
                }
                return Err(StackError::InvalidResponse {
                    message: format!(
                        "describe of {stack_name} failed: {}",
                        DisplayErrorContext(&service)
                    ),
                }
                .into());
            }
        };

        Ok(output.stacks().first().map(to_description))
    }
}
