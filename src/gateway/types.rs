//! Request and response shapes exchanged with the remote gateway.
//!
//! Field names follow the control plane's PascalCase wire format so that
//! values built here can be passed to [`call`](super::call) unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Resource type of a stack (top-level or nested).
pub const STACK_RESOURCE_TYPE: &str = "AWS::CloudFormation::Stack";

// ============================================================================
// Stack events
// ============================================================================

/// One immutable fact from the control plane's event log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct StackEvent {
    /// Dedup key.
    pub event_id: String,
    /// Name of the stack that emitted the event.
    #[serde(default)]
    pub stack_name: String,
    /// Logical id of the resource the event is about.
    pub logical_resource_id: String,
    /// Resource type, [`STACK_RESOURCE_TYPE`] for stacks.
    pub resource_type: String,
    /// Status after the transition.
    #[serde(default)]
    pub resource_status: Option<String>,
    /// Free-form reason attached to the status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_status_reason: Option<String>,
    /// When the event happened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Input of `describeStackEvents`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeStackEventsInput {
    /// Stack name or id.
    pub stack_name: String,
}

/// Output of `describeStackEvents`, newest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeStackEventsOutput {
    /// Events, most recent first.
    #[serde(default)]
    pub stack_events: Vec<StackEvent>,
    /// Cursor for older events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

// ============================================================================
// Stacks
// ============================================================================

/// A template parameter as reported by the control plane.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Parameter {
    /// Parameter key.
    pub parameter_key: String,
    /// Parameter value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter_value: Option<String>,
}

/// A stack tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    /// Tag key.
    pub key: String,
    /// Tag value.
    pub value: String,
}

/// Description of a live stack.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Stack {
    /// Stack id (ARN).
    #[serde(default)]
    pub stack_id: Option<String>,
    /// Stack name.
    pub stack_name: String,
    /// Current stack status.
    pub stack_status: String,
    /// Current parameters.
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    /// Current tags.
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// Input of `describeStacks`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeStacksInput {
    /// Stack name.
    pub stack_name: String,
}

/// Output of `describeStacks`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeStacksOutput {
    /// Matching stacks.
    #[serde(default)]
    pub stacks: Vec<Stack>,
}

/// Input of `describeStackResource`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeStackResourceInput {
    /// Stack name.
    pub stack_name: String,
    /// Logical id of the resource.
    pub logical_resource_id: String,
}

/// Output of `describeStackResource`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeStackResourceOutput {
    /// Resource detail.
    pub stack_resource_detail: StackResourceDetail,
}

/// Detail of one stack resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StackResourceDetail {
    /// Physical id, e.g. the bucket name.
    #[serde(default)]
    pub physical_resource_id: Option<String>,
}

/// Input of `deleteStack`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteStackInput {
    /// Stack name.
    pub stack_name: String,
    /// Service role used for the deletion.
    #[serde(rename = "RoleARN", skip_serializing_if = "Option::is_none")]
    pub role_arn: Option<String>,
}

// ============================================================================
// Change sets
// ============================================================================

/// Input of `createChangeSet`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct CreateChangeSetInput {
    /// Target stack.
    pub stack_name: String,
    /// Change-set name.
    pub change_set_name: String,
    /// Acknowledged capabilities.
    pub capabilities: Vec<String>,
    /// `CREATE` or `UPDATE`.
    pub change_set_type: String,
    /// Template parameters.
    pub parameters: Vec<Parameter>,
    /// Template location.
    #[serde(rename = "TemplateURL")]
    pub template_url: String,
    /// Stack tags.
    pub tags: Vec<Tag>,
    /// Service role.
    #[serde(rename = "RoleARN", skip_serializing_if = "Option::is_none")]
    pub role_arn: Option<String>,
}

/// Input of `describeChangeSet` and `deleteChangeSet`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChangeSetRef {
    /// Target stack.
    pub stack_name: String,
    /// Change-set name.
    pub change_set_name: String,
    /// Cursor for more changes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

/// Output of `describeChangeSet`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ChangeSetDescription {
    /// Change-set name.
    #[serde(default)]
    pub change_set_name: String,
    /// Compilation status.
    #[serde(default)]
    pub status: String,
    /// Reason attached to the status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_reason: Option<String>,
    /// Proposed parameters.
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    /// Proposed tags.
    #[serde(default)]
    pub tags: Vec<Tag>,
    /// Proposed resource changes (one page).
    #[serde(default)]
    pub changes: Vec<Change>,
    /// Cursor for more changes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

/// One entry of a change set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Change {
    /// Proposed resource change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_change: Option<ResourceChange>,
}

/// A proposed change to one resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceChange {
    /// `Add`, `Modify`, `Remove`, `Import` or `Dynamic`.
    pub action: String,
    /// Logical id of the resource.
    pub logical_resource_id: String,
    /// Resource type.
    #[serde(default)]
    pub resource_type: String,
    /// `True`, `False` or `Conditional` for modifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
}

// ============================================================================
// Object store
// ============================================================================

/// Input of `listObjectsV2`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListObjectsInput {
    /// Bucket name.
    pub bucket: String,
    /// Key prefix.
    pub prefix: String,
    /// Cursor from the previous page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continuation_token: Option<String>,
}

/// Output of `listObjectsV2`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListObjectsOutput {
    /// Objects on this page.
    #[serde(default)]
    pub contents: Vec<ObjectSummary>,
    /// Whether more pages exist.
    #[serde(default)]
    pub is_truncated: bool,
    /// Cursor for the next page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_continuation_token: Option<String>,
}

/// One listed object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ObjectSummary {
    /// Object key.
    pub key: String,
}

/// Input of `deleteObjects`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteObjectsInput {
    /// Bucket name.
    pub bucket: String,
    /// Keys to delete.
    pub delete: DeleteBatch,
}

/// A batch of keys to delete.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteBatch {
    /// Objects to delete.
    pub objects: Vec<ObjectSummary>,
}

/// Output of `deleteObjects`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteObjectsOutput {
    /// Keys the store refused to delete.
    #[serde(default)]
    pub errors: Vec<DeleteObjectError>,
}

/// A key that could not be deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteObjectError {
    /// Object key.
    #[serde(default)]
    pub key: String,
    /// Error message.
    #[serde(default)]
    pub message: String,
}

/// Input of `headObject`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct HeadObjectInput {
    /// Bucket name.
    pub bucket: String,
    /// Object key.
    pub key: String,
}

/// Output of `headObject`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HeadObjectOutput {
    /// User metadata.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Input of `putObject`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PutObjectInput {
    /// Bucket name.
    pub bucket: String,
    /// Object key.
    pub key: String,
    /// Object body.
    pub body: String,
    /// MIME type.
    pub content_type: String,
    /// User metadata.
    pub metadata: HashMap<String, String>,
}

impl StackEvent {
    /// Returns true if the event is about the given top-level stack.
    #[must_use]
    pub fn is_stack_level(&self, stack_name: &str) -> bool {
        self.resource_type == STACK_RESOURCE_TYPE && self.logical_resource_id == stack_name
    }

    /// Returns the status reason, or the status itself when no reason was given.
    #[must_use]
    pub fn reason_or_status(&self) -> String {
        self.resource_status_reason
            .clone()
            .or_else(|| self.resource_status.clone())
            .unwrap_or_default()
    }
}
