//! AWS-backed gateway.
//!
//! Translates `(service, action, params)` requests into CloudFormation and S3
//! SDK calls and renders the responses back into the PascalCase wire shape
//! defined in [`types`](super::types).

use async_trait::async_trait;
use aws_sdk_cloudformation as cloudformation;
use aws_sdk_s3 as s3;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{debug, trace};

use crate::error::GatewayError;

use super::{RemoteGateway, CLOUDFORMATION, S3};

/// Gateway backed by the AWS SDK.
#[derive(Debug, Clone)]
pub struct AwsGateway {
    /// Stack control plane client.
    cloudformation: cloudformation::Client,
    /// Artifact store client.
    s3: s3::Client,
}

impl AwsGateway {
    /// Creates a gateway from the default credential chain.
    ///
    /// `region` overrides the region resolved from the environment.
    pub async fn new(region: Option<&str>) -> Self {
        let config = if let Some(region_str) = region {
            aws_config::from_env()
                .region(aws_config::Region::new(region_str.to_string()))
                .load()
                .await
        } else {
            aws_config::load_from_env().await
        };

        Self::with_clients(
            cloudformation::Client::new(&config),
            s3::Client::new(&config),
        )
    }

    /// Creates a gateway from existing clients.
    #[must_use]
    pub const fn with_clients(cloudformation: cloudformation::Client, s3: s3::Client) -> Self {
        Self { cloudformation, s3 }
    }

    async fn describe_stack_events(&self, params: &Value) -> Result<Value, GatewayError> {
        let output = self
            .cloudformation
            .describe_stack_events()
            .stack_name(str_param(params, "StackName")?)
            .set_next_token(opt_param(params, "NextToken"))
            .send()
            .await
            .map_err(|e| sdk_error("describeStackEvents", e))?;

        let events: Vec<Value> = output
            .stack_events()
            .iter()
            .map(|event| {
                json!({
                    "EventId": event.event_id().unwrap_or_default(),
                    "StackName": event.stack_name().unwrap_or_default(),
                    "LogicalResourceId": event.logical_resource_id().unwrap_or_default(),
                    "ResourceType": event.resource_type().unwrap_or_default(),
                    "ResourceStatus": event.resource_status().map(|s| s.as_str()),
                    "ResourceStatusReason": event.resource_status_reason(),
                    "Timestamp": event
                        .timestamp()
                        .and_then(|t| t.fmt(cloudformation::primitives::DateTimeFormat::DateTime).ok()),
                })
            })
            .collect();

        Ok(json!({ "StackEvents": events, "NextToken": output.next_token() }))
    }

    async fn create_change_set(&self, params: &Value) -> Result<Value, GatewayError> {
        let capabilities = array_param(params, "Capabilities")
            .filter_map(Value::as_str)
            .map(cloudformation::types::Capability::from)
            .collect();

        let parameters = array_param(params, "Parameters")
            .map(|p| {
                cloudformation::types::Parameter::builder()
                    .set_parameter_key(opt_param(p, "ParameterKey"))
                    .set_parameter_value(opt_param(p, "ParameterValue"))
                    .build()
            })
            .collect();

        let tags = array_param(params, "Tags")
            .map(stack_tag)
            .collect::<Result<Vec<_>, _>>()?;

        let output = self
            .cloudformation
            .create_change_set()
            .stack_name(str_param(params, "StackName")?)
            .change_set_name(str_param(params, "ChangeSetName")?)
            .change_set_type(cloudformation::types::ChangeSetType::from(
                str_param(params, "ChangeSetType")?.as_str(),
            ))
            .set_capabilities(Some(capabilities))
            .set_parameters(Some(parameters))
            .template_url(str_param(params, "TemplateURL")?)
            .set_tags(Some(tags))
            .set_role_arn(opt_param(params, "RoleARN"))
            .send()
            .await
            .map_err(|e| sdk_error("createChangeSet", e))?;

        Ok(json!({ "Id": output.id(), "StackId": output.stack_id() }))
    }

    async fn describe_change_set(&self, params: &Value) -> Result<Value, GatewayError> {
        let output = self
            .cloudformation
            .describe_change_set()
            .stack_name(str_param(params, "StackName")?)
            .change_set_name(str_param(params, "ChangeSetName")?)
            .set_next_token(opt_param(params, "NextToken"))
            .send()
            .await
            .map_err(|e| sdk_error("describeChangeSet", e))?;

        let changes: Vec<Value> = output
            .changes()
            .iter()
            .map(|change| {
                json!({
                    "ResourceChange": change.resource_change().map(|rc| json!({
                        "Action": rc.action().map(|a| a.as_str()).unwrap_or_default(),
                        "LogicalResourceId": rc.logical_resource_id().unwrap_or_default(),
                        "ResourceType": rc.resource_type().unwrap_or_default(),
                        "Replacement": rc.replacement().map(|r| r.as_str()),
                    })),
                })
            })
            .collect();

        Ok(json!({
            "ChangeSetName": output.change_set_name().unwrap_or_default(),
            "Status": output.status().map(|s| s.as_str()).unwrap_or_default(),
            "StatusReason": output.status_reason(),
            "Parameters": render_parameters(output.parameters()),
            "Tags": render_tags(output.tags()),
            "Changes": changes,
            "NextToken": output.next_token(),
        }))
    }

    async fn delete_change_set(&self, params: &Value) -> Result<Value, GatewayError> {
        self.cloudformation
            .delete_change_set()
            .stack_name(str_param(params, "StackName")?)
            .change_set_name(str_param(params, "ChangeSetName")?)
            .send()
            .await
            .map_err(|e| sdk_error("deleteChangeSet", e))?;

        Ok(json!({}))
    }

    async fn describe_stacks(&self, params: &Value) -> Result<Value, GatewayError> {
        let output = self
            .cloudformation
            .describe_stacks()
            .stack_name(str_param(params, "StackName")?)
            .send()
            .await
            .map_err(|e| sdk_error("describeStacks", e))?;

        let stacks: Vec<Value> = output
            .stacks()
            .iter()
            .map(|stack| {
                json!({
                    "StackId": stack.stack_id(),
                    "StackName": stack.stack_name().unwrap_or_default(),
                    "StackStatus": stack.stack_status().map(|s| s.as_str()).unwrap_or_default(),
                    "Parameters": render_parameters(stack.parameters()),
                    "Tags": render_tags(stack.tags()),
                })
            })
            .collect();

        Ok(json!({ "Stacks": stacks }))
    }

    async fn describe_stack_resource(&self, params: &Value) -> Result<Value, GatewayError> {
        let output = self
            .cloudformation
            .describe_stack_resource()
            .stack_name(str_param(params, "StackName")?)
            .logical_resource_id(str_param(params, "LogicalResourceId")?)
            .send()
            .await
            .map_err(|e| sdk_error("describeStackResource", e))?;

        Ok(json!({
            "StackResourceDetail": {
                "PhysicalResourceId": output
                    .stack_resource_detail()
                    .and_then(|d| d.physical_resource_id()),
            }
        }))
    }

    async fn delete_stack(&self, params: &Value) -> Result<Value, GatewayError> {
        self.cloudformation
            .delete_stack()
            .stack_name(str_param(params, "StackName")?)
            .set_role_arn(opt_param(params, "RoleARN"))
            .send()
            .await
            .map_err(|e| sdk_error("deleteStack", e))?;

        Ok(json!({}))
    }

    async fn list_objects_v2(&self, params: &Value) -> Result<Value, GatewayError> {
        let output = self
            .s3
            .list_objects_v2()
            .bucket(str_param(params, "Bucket")?)
            .prefix(str_param(params, "Prefix")?)
            .set_continuation_token(opt_param(params, "ContinuationToken"))
            .send()
            .await
            .map_err(|e| sdk_error("listObjectsV2", e))?;

        let contents: Vec<Value> = output
            .contents()
            .iter()
            .filter_map(|object| object.key())
            .map(|key| json!({ "Key": key }))
            .collect();

        Ok(json!({
            "Contents": contents,
            "IsTruncated": output.is_truncated().unwrap_or(false),
            "NextContinuationToken": output.next_continuation_token(),
        }))
    }

    async fn delete_objects(&self, params: &Value) -> Result<Value, GatewayError> {
        let objects = params
            .get("Delete")
            .map(|d| array_param(d, "Objects"))
            .into_iter()
            .flatten()
            .map(|o| {
                s3::types::ObjectIdentifier::builder()
                    .key(str_param(o, "Key")?)
                    .build()
                    .map_err(|e| GatewayError::new(format!("Invalid object key: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let delete = s3::types::Delete::builder()
            .set_objects(Some(objects))
            .build()
            .map_err(|e| GatewayError::new(format!("Invalid delete batch: {e}")))?;

        let output = self
            .s3
            .delete_objects()
            .bucket(str_param(params, "Bucket")?)
            .delete(delete)
            .send()
            .await
            .map_err(|e| sdk_error("deleteObjects", e))?;

        let errors: Vec<Value> = output
            .errors()
            .iter()
            .map(|e| json!({ "Key": e.key().unwrap_or_default(), "Message": e.message().unwrap_or_default() }))
            .collect();

        Ok(json!({ "Errors": errors }))
    }

    async fn head_object(&self, params: &Value) -> Result<Value, GatewayError> {
        let output = self
            .s3
            .head_object()
            .bucket(str_param(params, "Bucket")?)
            .key(str_param(params, "Key")?)
            .send()
            .await
            .map_err(|e| sdk_error("headObject", e))?;

        Ok(json!({ "Metadata": output.metadata().cloned().unwrap_or_default() }))
    }

    async fn put_object(&self, params: &Value) -> Result<Value, GatewayError> {
        let metadata: HashMap<String, String> = params
            .get("Metadata")
            .and_then(Value::as_object)
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        self.s3
            .put_object()
            .bucket(str_param(params, "Bucket")?)
            .key(str_param(params, "Key")?)
            .body(ByteStream::from(str_param(params, "Body")?.into_bytes()))
            .set_content_type(opt_param(params, "ContentType"))
            .set_metadata(Some(metadata))
            .send()
            .await
            .map_err(|e| sdk_error("putObject", e))?;

        Ok(json!({}))
    }
}

#[async_trait]
impl RemoteGateway for AwsGateway {
    async fn request(
        &self,
        service: &str,
        action: &str,
        params: Value,
    ) -> Result<Value, GatewayError> {
        debug!("{service}.{action}");
        trace!("{service}.{action} params: {params}");

        match (service, action) {
            (CLOUDFORMATION, "describeStackEvents") => self.describe_stack_events(&params).await,
            (CLOUDFORMATION, "createChangeSet") => self.create_change_set(&params).await,
            (CLOUDFORMATION, "describeChangeSet") => self.describe_change_set(&params).await,
            (CLOUDFORMATION, "deleteChangeSet") => self.delete_change_set(&params).await,
            (CLOUDFORMATION, "describeStacks") => self.describe_stacks(&params).await,
            (CLOUDFORMATION, "describeStackResource") => {
                self.describe_stack_resource(&params).await
            }
            (CLOUDFORMATION, "deleteStack") => self.delete_stack(&params).await,
            (S3, "listObjectsV2") => self.list_objects_v2(&params).await,
            (S3, "deleteObjects") => self.delete_objects(&params).await,
            (S3, "headObject") => self.head_object(&params).await,
            (S3, "putObject") => self.put_object(&params).await,
            _ => Err(GatewayError::new(format!("Unsupported action {service}.{action}"))),
        }
    }
}

/// Maps an SDK error, keeping the HTTP status when a response was received.
fn sdk_error<E>(action: &str, err: SdkError<E, HttpResponse>) -> GatewayError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let status = err.raw_response().map(|r| r.status().as_u16());
    let message = err
        .message()
        .map_or_else(|| DisplayErrorContext(&err).to_string(), String::from);

    match status {
        Some(code) => GatewayError::provider(code, message),
        None => GatewayError::new(format!("{action} failed: {message}")),
    }
}

fn render_parameters(parameters: &[cloudformation::types::Parameter]) -> Vec<Value> {
    parameters
        .iter()
        .map(|p| {
            json!({
                "ParameterKey": p.parameter_key().unwrap_or_default(),
                "ParameterValue": p.parameter_value(),
            })
        })
        .collect()
}

fn render_tags(tags: &[cloudformation::types::Tag]) -> Vec<Value> {
    tags.iter()
        .map(|t| json!({ "Key": t.key(), "Value": t.value() }))
        .collect()
}

fn str_param(params: &Value, key: &str) -> Result<String, GatewayError> {
    opt_param(params, key)
        .ok_or_else(|| GatewayError::new(format!("Missing required parameter {key}")))
}

fn stack_tag(tag: &Value) -> Result<cloudformation::types::Tag, GatewayError> {
    Ok(cloudformation::types::Tag::builder()
        .key(str_param(tag, "Key")?)
        .value(str_param(tag, "Value")?)
        .build())
}

fn opt_param(params: &Value, key: &str) -> Option<String> {
    params.get(key).and_then(Value::as_str).map(String::from)
}

fn array_param<'a>(params: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    params
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}
