//! Monitor inputs: operation kind, stack identity and polling options.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::config::{MonitorConfig, DEFAULT_POLL_INTERVAL_MS};
use crate::error::{MonitorError, Result};

/// The kind of stack operation being monitored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Stack creation.
    Create,
    /// Stack update.
    Update,
    /// Stack deletion.
    Delete,
}

impl OperationKind {
    /// Status of the stack-level event that opens this operation.
    #[must_use]
    pub const fn start_status(self) -> &'static str {
        match self {
            Self::Create => "CREATE_IN_PROGRESS",
            Self::Update => "UPDATE_IN_PROGRESS",
            Self::Delete => "DELETE_IN_PROGRESS",
        }
    }

    /// Stack status that ends this operation successfully.
    #[must_use]
    pub const fn success_status(self) -> &'static str {
        match self {
            Self::Create => "CREATE_COMPLETE",
            Self::Update => "UPDATE_COMPLETE",
            Self::Delete => "DELETE_COMPLETE",
        }
    }

    /// Lowercase name of the operation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a managed stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackHandle {
    /// Stack id (ARN) or name, used for requests.
    pub id: String,
    /// Stack name, used to recognise stack-level events.
    pub name: String,
}

impl StackHandle {
    /// Creates a handle from an id and a name.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Creates a handle for a stack known only by name.
    #[must_use]
    pub fn from_name(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
        }
    }
}

/// What the monitor should watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorTarget {
    /// An in-flight operation on this stack.
    Stack(StackHandle),
    /// The caller already knows there is nothing to wait for.
    AlreadySettled,
}

/// Validated polling options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorOptions {
    poll_interval: Duration,
    verbose: bool,
    disable_rollback: bool,
    timeout: Option<Duration>,
}

impl MonitorOptions {
    /// Creates validated options.
    ///
    /// # Errors
    ///
    /// Returns an error if the poll interval is zero or the timeout is shorter
    /// than one poll interval.
    pub fn new(
        poll_interval: Duration,
        verbose: bool,
        disable_rollback: bool,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        if poll_interval.is_zero() {
            return Err(MonitorError::InvalidOptions {
                message: String::from("poll interval must be positive"),
            }
            .into());
        }

        if let Some(limit) = timeout
            && limit < poll_interval
        {
            return Err(MonitorError::InvalidOptions {
                message: format!(
                    "timeout {}ms is shorter than the poll interval {}ms",
                    limit.as_millis(),
                    poll_interval.as_millis()
                ),
            }
            .into());
        }

        Ok(Self {
            poll_interval,
            verbose,
            disable_rollback,
            timeout,
        })
    }

    /// Builds options from the project configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured values are inconsistent.
    pub fn from_config(config: &MonitorConfig) -> Result<Self> {
        Self::new(
            Duration::from_millis(config.poll_interval_ms),
            config.verbose,
            config.disable_rollback,
            config.timeout_secs.map(Duration::from_secs),
        )
    }

    /// Delay between polls.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Whether to wait for the terminal failure status before raising.
    #[must_use]
    pub const fn verbose(&self) -> bool {
        self.verbose
    }

    /// Whether the stack was deployed with rollback disabled.
    #[must_use]
    pub const fn disable_rollback(&self) -> bool {
        self.disable_rollback
    }

    /// Overall timeout, checked between polls.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl Default for MonitorOptions {
    /// Polls every 5 seconds, raises on the first failure and never times out.
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            verbose: false,
            disable_rollback: false,
            timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_operation_statuses() {
        assert_eq!(OperationKind::Create.start_status(), "CREATE_IN_PROGRESS");
        assert_eq!(OperationKind::Update.success_status(), "UPDATE_COMPLETE");
        assert_eq!(OperationKind::Delete.to_string(), "delete");
    }

    #[test]
    fn test_zero_interval_rejected() {
        let err = MonitorOptions::new(Duration::ZERO, false, false, None).expect_err("must fail");
        assert!(err.to_string().contains("poll interval must be positive"));
    }

    #[test]
    fn test_timeout_shorter_than_interval_rejected() {
        assert_err!(MonitorOptions::new(
            Duration::from_secs(5),
            false,
            false,
            Some(Duration::from_secs(1)),
        ));
    }

    #[test]
    fn test_from_config() {
        let config = MonitorConfig {
            poll_interval_ms: 250,
            verbose: true,
            disable_rollback: true,
            timeout_secs: Some(60),
        };
        let options = assert_ok!(MonitorOptions::from_config(&config));

        assert_eq!(options.poll_interval(), Duration::from_millis(250));
        assert!(options.verbose());
        assert!(options.disable_rollback());
        assert_eq!(options.timeout(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_defaults() {
        let options = MonitorOptions::default();
        assert_eq!(options.poll_interval(), Duration::from_secs(5));
        assert!(!options.verbose());
        assert!(options.timeout().is_none());
    }

    #[test]
    fn test_handle_from_name() {
        let handle = StackHandle::from_name("new-service-dev");
        assert_eq!(handle.id, handle.name);
    }
}
