//! Configuration module for stackpilot.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `stackpilot.yaml`
//! - Validation of configuration values
//! - Stack, change-set and artifact naming
//! - Template hashing for change detection

mod spec;
mod parser;
mod validator;
mod hash;
mod naming;

pub use spec::{
    Capability, ChangeSetConfig, DeployConfig, MonitorConfig, PackageConfig, ProviderConfig,
    StackParameter, DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL_MS,
};
pub use parser::{ConfigParser, find_config_file, DEFAULT_CONFIG_FILES};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
pub use hash::TemplateHasher;
pub use naming::{
    is_deployment_directory, Naming, COMPILED_TEMPLATE_FILE_NAME, DEPLOYMENT_BUCKET_LOGICAL_ID,
};
