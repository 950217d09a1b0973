//! Change-set lifecycle on the control plane.
//!
//! Creation falls back from `UPDATE` to `CREATE` exactly once when the stack
//! does not exist yet. Waiting is a bounded describe loop that treats an
//! empty change set as a successful no-op.

use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

use crate::classify;
use crate::config::ChangeSetConfig;
use crate::error::{GatewayError, PlanError, Result};
use crate::gateway::types::{ChangeSetDescription, ChangeSetRef, CreateChangeSetInput, Parameter, Tag};
use crate::gateway::{call, collect_pages, Page, SharedGateway, CLOUDFORMATION};

/// Status of a change set that compiled successfully.
const CREATE_COMPLETE: &str = "CREATE_COMPLETE";

/// Status of a change set that failed to compile.
const FAILED: &str = "FAILED";

/// Whether a change set targets a new or an existing stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeSetType {
    /// The stack does not exist yet.
    Create,
    /// The stack already exists.
    Update,
}

impl ChangeSetType {
    /// Wire value of the type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
        }
    }
}

impl fmt::Display for ChangeSetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to create one change set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSetRequest {
    /// Target stack.
    pub stack_name: String,
    /// Unique change-set name.
    pub change_set_name: String,
    /// URL of the uploaded template.
    pub template_url: String,
    /// Template parameters.
    pub parameters: Vec<Parameter>,
    /// Stack tags.
    pub tags: Vec<Tag>,
    /// Acknowledged capabilities.
    pub capabilities: Vec<String>,
    /// Service role.
    pub role_arn: Option<String>,
}

impl ChangeSetRequest {
    fn input(&self, change_set_type: ChangeSetType) -> CreateChangeSetInput {
        CreateChangeSetInput {
            stack_name: self.stack_name.clone(),
            change_set_name: self.change_set_name.clone(),
            capabilities: self.capabilities.clone(),
            change_set_type: change_set_type.as_str().to_string(),
            parameters: self.parameters.clone(),
            template_url: self.template_url.clone(),
            tags: self.tags.clone(),
            role_arn: self.role_arn.clone(),
        }
    }
}

/// Result of waiting for a change set to compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The change set compiled and can be analyzed.
    Ready,
    /// The change set compiled to nothing.
    NoChanges,
}

/// Creates, waits for, describes and deletes change sets.
pub struct ChangeSetClient {
    gateway: SharedGateway,
    poll_interval: Duration,
    max_attempts: u32,
}

impl ChangeSetClient {
    /// Creates a client with the configured waiter settings.
    #[must_use]
    pub fn new(gateway: SharedGateway, config: &ChangeSetConfig) -> Self {
        Self {
            gateway,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            max_attempts: config.max_attempts,
        }
    }

    /// Creates the change set, falling back to `CREATE` for a missing stack.
    ///
    /// # Errors
    ///
    /// Returns the gateway error of the final attempt.
    pub async fn create(&self, request: &ChangeSetRequest) -> Result<ChangeSetType> {
        info!("Creating change set {}", request.change_set_name);

        match self.submit(request, ChangeSetType::Update).await {
            Ok(()) => Ok(ChangeSetType::Update),
            Err(err) if classify::is_stack_missing(&err) => {
                info!("Stack {} does not exist yet, creating a CREATE change set", request.stack_name);
                self.submit(request, ChangeSetType::Create).await?;
                Ok(ChangeSetType::Create)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn submit(
        &self,
        request: &ChangeSetRequest,
        change_set_type: ChangeSetType,
    ) -> std::result::Result<(), GatewayError> {
        let _: Value = call(
            self.gateway.as_ref(),
            CLOUDFORMATION,
            "createChangeSet",
            request.input(change_set_type),
        )
        .await?;
        Ok(())
    }

    /// Polls until the change set has compiled.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::ChangeSetFailed`] for a failure other than an
    /// empty change set, and [`PlanError::WaiterExhausted`] when the attempts
    /// run out.
    pub async fn wait_for_change_set_create_complete(
        &self,
        stack_name: &str,
        change_set_name: &str,
    ) -> Result<WaitOutcome> {
        info!("Waiting for change set {change_set_name} to compile");

        for attempt in 1..=self.max_attempts {
            let description = self.describe_page(stack_name, change_set_name, None).await?;

            match description.status.as_str() {
                CREATE_COMPLETE => return Ok(WaitOutcome::Ready),
                FAILED => {
                    let reason = description.status_reason.unwrap_or_default();
                    if classify::is_empty_change_set(&reason) {
                        info!("Change set {change_set_name} contains no changes");
                        return Ok(WaitOutcome::NoChanges);
                    }
                    return Err(PlanError::ChangeSetFailed {
                        change_set_name: change_set_name.to_string(),
                        reason,
                    }
                    .into());
                }
                status => debug!("Attempt {attempt}: change set {change_set_name} is {status}"),
            }

            if attempt < self.max_attempts {
                tokio::time::sleep(self.poll_interval).await;
            }
        }

        Err(PlanError::WaiterExhausted {
            change_set_name: change_set_name.to_string(),
            attempts: self.max_attempts,
        }
        .into())
    }

    /// Describes the change set, merging every page of changes.
    ///
    /// # Errors
    ///
    /// Returns the gateway error of the failing page.
    pub async fn describe(&self, stack_name: &str, change_set_name: &str) -> Result<ChangeSetDescription> {
        let pages = collect_pages(|next_token| async move {
            let page = self.describe_page(stack_name, change_set_name, next_token).await?;
            let next = page.next_token.clone();
            Ok(Page {
                items: vec![page],
                next,
            })
        })
        .await?;

        let mut pages = pages.into_iter();
        let Some(mut description) = pages.next() else {
            return Ok(ChangeSetDescription::default());
        };
        for page in pages {
            description.changes.extend(page.changes);
        }
        description.next_token = None;

        Ok(description)
    }

    async fn describe_page(
        &self,
        stack_name: &str,
        change_set_name: &str,
        next_token: Option<String>,
    ) -> std::result::Result<ChangeSetDescription, GatewayError> {
        call(
            self.gateway.as_ref(),
            CLOUDFORMATION,
            "describeChangeSet",
            ChangeSetRef {
                stack_name: stack_name.to_string(),
                change_set_name: change_set_name.to_string(),
                next_token,
            },
        )
        .await
    }

    /// Deletes the change set.
    ///
    /// # Errors
    ///
    /// Returns the gateway error.
    pub async fn delete(&self, stack_name: &str, change_set_name: &str) -> Result<()> {
        let _: Value = call(
            self.gateway.as_ref(),
            CLOUDFORMATION,
            "deleteChangeSet",
            ChangeSetRef {
                stack_name: stack_name.to_string(),
                change_set_name: change_set_name.to_string(),
                next_token: None,
            },
        )
        .await?;

        info!("Deleted change set {change_set_name}");
        Ok(())
    }
}
