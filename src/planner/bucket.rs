//! Deployment bucket resolution, memoized per planner.

use tokio::sync::OnceCell;
use tracing::debug;

use crate::config::DEPLOYMENT_BUCKET_LOGICAL_ID;
use crate::error::{PlanError, Result};
use crate::gateway::types::{DescribeStackResourceInput, DescribeStackResourceOutput};
use crate::gateway::{call, SharedGateway, CLOUDFORMATION};

/// Resolves the artifact bucket once and caches it.
pub struct BucketResolver {
    gateway: SharedGateway,
    stack_name: String,
    configured: Option<String>,
    resolved: OnceCell<String>,
}

impl BucketResolver {
    /// Creates a resolver; a configured bucket wins over stack lookup.
    #[must_use]
    pub fn new(gateway: SharedGateway, stack_name: impl Into<String>, configured: Option<String>) -> Self {
        Self {
            gateway,
            stack_name: stack_name.into(),
            configured,
            resolved: OnceCell::new(),
        }
    }

    /// Returns the bucket name, looking it up on first use.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::BucketUnresolved`] if the stack has no deployment
    /// bucket resource or the lookup fails.
    pub async fn resolve(&self) -> Result<&str> {
        let bucket = self
            .resolved
            .get_or_try_init(|| self.lookup())
            .await?;

        Ok(bucket.as_str())
    }

    async fn lookup(&self) -> Result<String> {
        if let Some(bucket) = &self.configured {
            debug!("Using configured deployment bucket {bucket}");
            return Ok(bucket.clone());
        }

        let output: DescribeStackResourceOutput = call(
            self.gateway.as_ref(),
            CLOUDFORMATION,
            "describeStackResource",
            DescribeStackResourceInput {
                stack_name: self.stack_name.clone(),
                logical_resource_id: DEPLOYMENT_BUCKET_LOGICAL_ID.to_string(),
            },
        )
        .await
        .map_err(|e| PlanError::BucketUnresolved {
            stack_name: self.stack_name.clone(),
            message: e.to_string(),
        })?;

        let bucket = output
            .stack_resource_detail
            .physical_resource_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| PlanError::BucketUnresolved {
                stack_name: self.stack_name.clone(),
                message: format!("{DEPLOYMENT_BUCKET_LOGICAL_ID} has no physical id"),
            })?;

        debug!("Resolved deployment bucket {bucket} from stack {}", self.stack_name);
        Ok(bucket)
    }
}
