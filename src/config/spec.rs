//! Configuration specification types for stackpilot.
//!
//! This module defines the structs that map to `stackpilot.yaml`. The file
//! names the service and stage being deployed, where its artifacts live, and
//! how the monitor and change-set waiter should poll.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::naming::Naming;

/// The root configuration structure for a stackpilot project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeployConfig {
    /// Service name, the first half of the stack name.
    pub service: String,
    /// Stage (e.g., "dev", "prod").
    #[serde(default = "default_stage")]
    pub stage: String,
    /// AWS region; falls back to the SDK default chain when absent.
    #[serde(default)]
    pub region: Option<String>,
    /// Provider settings for the stack and its artifacts.
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Packaging settings.
    #[serde(default)]
    pub package: PackageConfig,
    /// Stack monitor settings.
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Change-set waiter settings.
    #[serde(default)]
    pub change_set: ChangeSetConfig,
}

/// Provider settings for the managed stack.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProviderConfig {
    /// Explicit artifact bucket; looked up from the stack when absent.
    pub deployment_bucket: Option<String>,
    /// Key prefix for all artifacts.
    pub deployment_prefix: String,
    /// Overrides the derived `{service}-{stage}` stack name.
    pub stack_name: Option<String>,
    /// Service role passed to change-set creation.
    pub role_arn: Option<String>,
    /// Tags applied to the stack.
    pub stack_tags: BTreeMap<String, String>,
    /// Template parameters.
    pub stack_parameters: Vec<StackParameter>,
    /// Capabilities acknowledged on change-set creation.
    pub capabilities: Vec<Capability>,
}

/// A single template parameter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StackParameter {
    /// Parameter key.
    pub key: String,
    /// Parameter value.
    pub value: String,
}

/// Capabilities the control plane requires to be acknowledged.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Template creates IAM resources.
    #[serde(rename = "CAPABILITY_IAM")]
    Iam,
    /// Template creates named IAM resources.
    #[serde(rename = "CAPABILITY_NAMED_IAM")]
    NamedIam,
    /// Template contains macros.
    #[serde(rename = "CAPABILITY_AUTO_EXPAND")]
    AutoExpand,
}

/// Packaging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PackageConfig {
    /// Path of the compiled template, relative to the config file.
    pub template: PathBuf,
    /// Command run to produce the template (argv form).
    pub command: Option<Vec<String>>,
    /// Skip change detection and always plan.
    pub force: bool,
}

/// Stack monitor settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MonitorConfig {
    /// Delay between event polls in milliseconds.
    pub poll_interval_ms: u64,
    /// Wait for the full rollback before reporting a failure.
    pub verbose: bool,
    /// The stack was deployed with rollback disabled.
    pub disable_rollback: bool,
    /// Overall timeout in seconds.
    pub timeout_secs: Option<u64>,
}

/// Change-set waiter settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChangeSetConfig {
    /// Delay between describe calls in milliseconds.
    pub poll_interval_ms: u64,
    /// Maximum number of describe calls.
    pub max_attempts: u32,
}

// Default value functions

/// Default delay between polls, matching the control plane's own waiters.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5000;

/// Default number of change-set describe attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 120;

fn default_stage() -> String {
    String::from("dev")
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            deployment_bucket: None,
            deployment_prefix: String::from("serverless"),
            stack_name: None,
            role_arn: None,
            stack_tags: BTreeMap::new(),
            stack_parameters: Vec::new(),
            capabilities: vec![Capability::Iam, Capability::NamedIam, Capability::AutoExpand],
        }
    }
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            template: PathBuf::from(".serverless/cloudformation-template-update-stack.json"),
            command: None,
            force: false,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            verbose: false,
            disable_rollback: false,
            timeout_secs: None,
        }
    }
}

impl Default for ChangeSetConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl Capability {
    /// Returns the wire name of the capability.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Iam => "CAPABILITY_IAM",
            Self::NamedIam => "CAPABILITY_NAMED_IAM",
            Self::AutoExpand => "CAPABILITY_AUTO_EXPAND",
        }
    }
}

impl DeployConfig {
    /// Returns the naming scheme for this project.
    #[must_use]
    pub fn naming(&self) -> Naming {
        Naming::new(&self.service, &self.stage, &self.provider.deployment_prefix)
            .with_stack_name(self.provider.stack_name.clone())
    }

    /// Returns the name of the managed stack.
    #[must_use]
    pub fn stack_name(&self) -> String {
        self.naming().stack_name()
    }
}
