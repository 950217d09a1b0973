//! Error types for the stackpilot deployment core.
//!
//! This module provides the error hierarchy for every stage of a stack
//! operation: configuration, remote gateway calls, stack monitoring,
//! change-set planning, and classified deployment failures.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for stackpilot.
#[derive(Debug, Error)]
pub enum StackPilotError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Remote gateway errors (transport or provider-side).
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// A classified stack operation failure.
    #[error(transparent)]
    Deployment(#[from] DeploymentFailed),

    /// Stack monitoring errors.
    #[error("Monitor error: {0}")]
    Monitor(#[from] MonitorError),

    /// Change-set planning errors.
    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },
}

/// Provider-side detail attached to a gateway error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    /// HTTP status code returned by the provider.
    pub status_code: u16,
    /// Provider error message.
    pub message: String,
}

/// Error returned by a remote gateway request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct GatewayError {
    /// Human-readable error message.
    pub message: String,
    /// Provider detail, absent for pure transport failures.
    pub provider_error: Option<ProviderError>,
}

/// A stack operation that the control plane reported as failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("An error occurred: {resource_id} - {reason}.")]
pub struct DeploymentFailed {
    /// Logical id of the resource carrying the most specific reason.
    pub resource_id: String,
    /// Failure reason reported by the control plane.
    pub reason: String,
}

/// Stack monitoring errors.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The poll loop ran past its configured timeout.
    #[error("Timed out after {elapsed_secs}s waiting for {operation} of stack {stack_name}")]
    Timeout {
        /// Name of the monitored stack.
        stack_name: String,
        /// Operation being monitored.
        operation: String,
        /// Seconds elapsed when the loop gave up.
        elapsed_secs: u64,
    },

    /// Monitor options were rejected at construction.
    #[error("Invalid monitor options: {message}")]
    InvalidOptions {
        /// Description of the problem.
        message: String,
    },
}

/// Change-set planning errors.
#[derive(Debug, Error)]
pub enum PlanError {
    /// The deployment bucket could not be determined.
    #[error("Could not resolve deployment bucket for stack {stack_name}: {message}")]
    BucketUnresolved {
        /// Stack whose bucket was looked up.
        stack_name: String,
        /// Underlying reason.
        message: String,
    },

    /// The packaging step failed.
    #[error("Packaging failed: {message}")]
    PackagingFailed {
        /// Description of the failure.
        message: String,
    },

    /// The compiled template could not be read or parsed.
    #[error("Invalid compiled template {path}: {message}")]
    InvalidTemplate {
        /// Template path.
        path: PathBuf,
        /// Description of the problem.
        message: String,
    },

    /// The change set failed to compile for a reason other than "no changes".
    #[error("Change set {change_set_name} failed: {reason}")]
    ChangeSetFailed {
        /// Name of the failed change set.
        change_set_name: String,
        /// Status reason reported by the control plane.
        reason: String,
    },

    /// The change-set waiter ran out of attempts.
    #[error("Change set {change_set_name} did not finish compiling after {attempts} attempts")]
    WaiterExhausted {
        /// Name of the change set.
        change_set_name: String,
        /// Number of describe attempts made.
        attempts: u32,
    },

    /// Some artifacts could not be removed from the object store.
    #[error("Failed to delete {failed} object(s) under {folder}")]
    CleanupIncomplete {
        /// Folder being cleaned.
        folder: String,
        /// Number of keys the store refused to delete.
        failed: usize,
    },
}

/// Result type alias for stackpilot operations.
pub type Result<T> = std::result::Result<T, StackPilotError>;

impl StackPilotError {
    /// Returns true if the caller may reasonably retry the whole operation.
    ///
    /// Neither the monitor nor the planner retries on its own.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Gateway(err) => err.is_transient(),
            _ => false,
        }
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl GatewayError {
    /// Creates a transport-level error with no provider detail.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            provider_error: None,
        }
    }

    /// Creates an error carrying the provider's status code and message.
    #[must_use]
    pub fn provider(status_code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            provider_error: Some(ProviderError {
                status_code,
                message: message.clone(),
            }),
            message,
        }
    }

    /// Returns the provider status code, if any.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        self.provider_error.as_ref().map(|p| p.status_code)
    }

    /// Returns true for network failures, throttling and 5xx responses.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.status_code()
            .is_none_or(|code| code == 429 || code >= 500)
    }
}

impl DeploymentFailed {
    /// Creates a deployment failure for the given resource.
    #[must_use]
    pub fn new(resource_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            reason: reason.into(),
        }
    }
}
