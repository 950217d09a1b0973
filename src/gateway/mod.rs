//! Remote request gateway.
//!
//! Every control-plane and object-store call goes through [`RemoteGateway`],
//! a single `request(service, action, params)` entry point. The monitor and
//! planner only ever see this trait, so tests drive them with a scripted
//! gateway and the binary plugs in [`AwsGateway`].

mod aws;
mod paginate;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

use crate::error::GatewayError;

pub use aws::AwsGateway;
pub use paginate::{collect_pages, list_objects, not_found_as_empty, Page};

/// Service name of the stack control plane.
pub const CLOUDFORMATION: &str = "CloudFormation";

/// Service name of the artifact object store.
pub const S3: &str = "S3";

/// A gateway shared between the monitor, planner and collaborators.
pub type SharedGateway = Arc<dyn RemoteGateway>;

/// Untyped request/response access to the remote control plane.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Issues one request and returns the raw response.
    async fn request(
        &self,
        service: &str,
        action: &str,
        params: Value,
    ) -> Result<Value, GatewayError>;
}

/// Issues a typed request through a gateway.
///
/// # Errors
///
/// Returns the gateway's error, or a gateway error if the params cannot be
/// encoded or the response does not match `R`.
pub async fn call<P, R>(
    gateway: &dyn RemoteGateway,
    service: &str,
    action: &str,
    params: P,
) -> Result<R, GatewayError>
where
    P: Serialize + Send,
    R: DeserializeOwned,
{
    let params = serde_json::to_value(params)
        .map_err(|e| GatewayError::new(format!("Failed to encode {service}.{action} params: {e}")))?;

    let response = gateway.request(service, action, params).await?;

    serde_json::from_value(response)
        .map_err(|e| GatewayError::new(format!("Malformed {service}.{action} response: {e}")))
}
