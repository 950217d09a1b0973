//! Configuration validation for stackpilot projects.
//!
//! Errors block every command; warnings are reported but do not stop a run.

use crate::error::{ConfigError, Result, StackPilotError};
use std::collections::HashSet;
use tracing::debug;

use super::spec::{ChangeSetConfig, DeployConfig, MonitorConfig, PackageConfig, ProviderConfig};

/// Maximum length of a stack name accepted by the control plane.
const MAX_STACK_NAME_LEN: usize = 128;

/// Maximum number of tags on a stack.
const MAX_STACK_TAGS: usize = 50;

/// Validator for project configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a project configuration.
    ///
    /// # Errors
    ///
    /// Returns the first validation error if any were found.
    pub fn validate(&self, config: &DeployConfig) -> Result<ValidationResult> {
        let result = self.check(config);

        if let Some(first_error) = result.errors.first() {
            return Err(StackPilotError::Config(ConfigError::validation(
                first_error.message.clone(),
                first_error.field.clone(),
            )));
        }

        debug!("Configuration validation passed");
        Ok(result)
    }

    /// Collects every error and warning without failing.
    #[must_use]
    pub fn check(&self, config: &DeployConfig) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_identity(config, &mut result);
        Self::validate_provider(&config.provider, &mut result);
        Self::validate_package(&config.package, &mut result);
        Self::validate_monitor(&config.monitor, &mut result);
        Self::validate_change_set(&config.change_set, &mut result);

        result
    }

    /// Validates service, stage and the resulting stack name.
    fn validate_identity(config: &DeployConfig, result: &mut ValidationResult) {
        if config.service.is_empty() {
            result.error("service", "Service name cannot be empty");
        }

        if config.stage.is_empty() {
            result.error("stage", "Stage cannot be empty");
        }

        if config.service.is_empty() || config.stage.is_empty() {
            return;
        }

        let stack_name = config.stack_name();
        if !is_valid_stack_name(&stack_name) {
            result.error(
                "provider.stack_name",
                format!(
                    "Stack name '{stack_name}' is invalid. Must start with a letter, contain only letters, digits and hyphens, and be at most {MAX_STACK_NAME_LEN} characters."
                ),
            );
        }
    }

    /// Validates provider settings.
    fn validate_provider(provider: &ProviderConfig, result: &mut ValidationResult) {
        if provider
            .deployment_bucket
            .as_ref()
            .is_some_and(String::is_empty)
        {
            result.error("provider.deployment_bucket", "Deployment bucket cannot be empty");
        }

        if provider.deployment_prefix.contains("//") {
            result.error(
                "provider.deployment_prefix",
                "Deployment prefix cannot contain empty path segments",
            );
        }

        let mut seen_keys = HashSet::new();
        for (i, parameter) in provider.stack_parameters.iter().enumerate() {
            if parameter.key.is_empty() {
                result.error(
                    format!("provider.stack_parameters[{i}].key"),
                    "Parameter key cannot be empty",
                );
            } else if !seen_keys.insert(parameter.key.as_str()) {
                result.error(
                    format!("provider.stack_parameters[{i}].key"),
                    format!("Duplicate parameter key: {}", parameter.key),
                );
            }
        }

        if provider.stack_tags.len() > MAX_STACK_TAGS {
            result.error(
                "provider.stack_tags",
                format!("At most {MAX_STACK_TAGS} stack tags are allowed"),
            );
        }

        if provider.capabilities.is_empty() {
            result
                .warnings
                .push(String::from("No capabilities acknowledged; IAM resources will be rejected"));
        }
    }

    /// Validates packaging settings.
    fn validate_package(package: &PackageConfig, result: &mut ValidationResult) {
        if package.command.as_ref().is_some_and(Vec::is_empty) {
            result.error("package.command", "Packaging command cannot be empty");
        }

        if package
            .template
            .extension()
            .is_none_or(|ext| !ext.eq_ignore_ascii_case("json"))
        {
            result.warnings.push(format!(
                "Compiled template {} does not have a .json extension",
                package.template.display()
            ));
        }
    }

    /// Validates monitor timing.
    fn validate_monitor(monitor: &MonitorConfig, result: &mut ValidationResult) {
        if monitor.poll_interval_ms == 0 {
            result.error("monitor.poll_interval_ms", "Poll interval must be positive");
        }

        if let Some(timeout) = monitor.timeout_secs
            && timeout.saturating_mul(1000) < monitor.poll_interval_ms
        {
            result.error(
                "monitor.timeout_secs",
                "Timeout must be at least one poll interval",
            );
        }
    }

    /// Validates change-set waiter settings.
    fn validate_change_set(change_set: &ChangeSetConfig, result: &mut ValidationResult) {
        if change_set.poll_interval_ms == 0 {
            result.error("change_set.poll_interval_ms", "Poll interval must be positive");
        }

        if change_set.max_attempts == 0 {
            result.error("change_set.max_attempts", "Max attempts must be at least 1");
        }
    }
}

/// Stack names start with a letter and contain letters, digits and hyphens.
fn is_valid_stack_name(name: &str) -> bool {
    let mut chars = name.chars();

    if !chars.next().is_some_and(|c| c.is_ascii_alphabetic()) {
        return false;
    }

    name.len() <= MAX_STACK_NAME_LEN && chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}

impl ValidationResult {
    /// Records an error for a field.
    fn error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}
