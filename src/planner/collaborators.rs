//! External collaborators of the planner.
//!
//! Packaging, change detection and artifact upload sit behind small traits so
//! the planner can be driven with mocks. The concrete implementations here
//! shell out to the packaging command and talk to the artifact store through
//! the gateway.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, info};

use crate::classify;
use crate::config::{is_deployment_directory, Naming, TemplateHasher, COMPILED_TEMPLATE_FILE_NAME};
use crate::error::{GatewayError, PlanError, Result};
use crate::gateway::types::{HeadObjectInput, HeadObjectOutput, ObjectSummary, PutObjectInput};
use crate::gateway::{call, list_objects, not_found_as_empty, SharedGateway, S3};

use super::template::CompiledTemplate;

/// Object metadata key holding the template's SHA-256.
pub const FILE_SHA256_METADATA_KEY: &str = "filesha256";

/// Produces the compiled template.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Packager: Send + Sync {
    /// Runs packaging to completion.
    async fn package(&self) -> Result<()>;
}

/// Decides whether the compiled template differs from the deployed one.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChangeDetector: Send + Sync {
    /// Returns true when a deployment is needed.
    async fn has_changes(&self, bucket: &str, template: &CompiledTemplate) -> Result<bool>;
}

/// Uploads the compiled template to the artifact store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArtifactUploader: Send + Sync {
    /// Uploads `template` to `bucket` under `key`.
    async fn upload(&self, bucket: &str, key: &str, template: &CompiledTemplate) -> Result<()>;
}

// ============================================================================
// Packaging
// ============================================================================

/// Runs the configured packaging command, or nothing when none is set.
#[derive(Debug, Clone)]
pub struct CommandPackager {
    command: Option<Vec<String>>,
    working_dir: PathBuf,
}

impl CommandPackager {
    /// Creates a packager for `command`, run from `working_dir`.
    #[must_use]
    pub const fn new(command: Option<Vec<String>>, working_dir: PathBuf) -> Self {
        Self {
            command,
            working_dir,
        }
    }
}

#[async_trait]
impl Packager for CommandPackager {
    async fn package(&self) -> Result<()> {
        let Some(command) = self.command.as_deref() else {
            debug!("No packaging command configured, using existing template");
            return Ok(());
        };
        let Some((program, args)) = command.split_first() else {
            return Err(PlanError::PackagingFailed {
                message: String::from("packaging command is empty"),
            }
            .into());
        };

        info!("Packaging with `{}`", command.join(" "));

        let output = Command::new(program)
            .args(args)
            .current_dir(&self.working_dir)
            .output()
            .await
            .map_err(|e| PlanError::PackagingFailed {
                message: format!("failed to run {program}: {e}"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PlanError::PackagingFailed {
                message: format!("{program} exited with {}: {}", output.status, stderr.trim()),
            }
            .into());
        }

        Ok(())
    }
}

// ============================================================================
// Change detection
// ============================================================================

/// Compares the local template hash with the last deployed template's metadata.
pub struct ArtifactChangeDetector {
    gateway: SharedGateway,
    naming: Naming,
    force: bool,
}

impl ArtifactChangeDetector {
    /// Creates a detector; `force` makes every template count as changed.
    #[must_use]
    pub fn new(gateway: SharedGateway, naming: Naming, force: bool) -> Self {
        Self {
            gateway,
            naming,
            force,
        }
    }
}

#[async_trait]
impl ChangeDetector for ArtifactChangeDetector {
    async fn has_changes(&self, bucket: &str, template: &CompiledTemplate) -> Result<bool> {
        if self.force {
            info!("Deployment forced, skipping change detection");
            return Ok(true);
        }

        let directory = self.naming.artifact_directory();
        let prefix = format!("{directory}/");
        let objects = not_found_as_empty(list_objects(self.gateway.as_ref(), bucket, &prefix).await)?;

        let Some(latest) = latest_deployment(&prefix, &objects) else {
            info!("No previous deployment found under {prefix}");
            return Ok(true);
        };

        let key = format!("{directory}/{latest}/{COMPILED_TEMPLATE_FILE_NAME}");
        let head: std::result::Result<HeadObjectOutput, GatewayError> = call(
            self.gateway.as_ref(),
            S3,
            "headObject",
            HeadObjectInput {
                bucket: bucket.to_string(),
                key: key.clone(),
            },
        )
        .await;

        let head = match head {
            Ok(head) => head,
            Err(err) if classify::is_not_found(&err) => {
                debug!("Deployed template {key} not found");
                return Ok(true);
            }
            Err(err) => return Err(err.into()),
        };

        let Some(deployed) = head.metadata.get(FILE_SHA256_METADATA_KEY) else {
            debug!("Deployed template {key} carries no hash");
            return Ok(true);
        };

        let local = template.sha256();
        let changed = !TemplateHasher::hashes_match(deployed, &local);
        debug!(
            "Template hash {} vs deployed {}",
            TemplateHasher::new().short_hash(&local),
            TemplateHasher::new().short_hash(deployed)
        );

        Ok(changed)
    }
}

/// Picks the newest deployment directory under `prefix`.
fn latest_deployment<'a>(prefix: &str, objects: &'a [ObjectSummary]) -> Option<&'a str> {
    objects
        .iter()
        .filter_map(|o| o.key.strip_prefix(prefix))
        .filter_map(|rest| rest.split('/').next())
        .filter(|dir| is_deployment_directory(dir))
        .max_by_key(|dir| {
            let millis = dir
                .split_once('-')
                .and_then(|(m, _)| m.parse::<u64>().ok())
                .unwrap_or_default();
            (millis, *dir)
        })
}

// ============================================================================
// Upload
// ============================================================================

/// Uploads templates with `putObject`, tagging them with their hash.
pub struct S3ArtifactUploader {
    gateway: SharedGateway,
}

impl S3ArtifactUploader {
    /// Creates an uploader.
    #[must_use]
    pub fn new(gateway: SharedGateway) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl ArtifactUploader for S3ArtifactUploader {
    async fn upload(&self, bucket: &str, key: &str, template: &CompiledTemplate) -> Result<()> {
        let metadata = HashMap::from([(
            FILE_SHA256_METADATA_KEY.to_string(),
            template.sha256(),
        )]);

        let _: Value = call(
            self.gateway.as_ref(),
            S3,
            "putObject",
            PutObjectInput {
                bucket: bucket.to_string(),
                key: key.to_string(),
                body: template.body.clone(),
                content_type: String::from("application/json"),
                metadata,
            },
        )
        .await?;

        info!("Uploaded template to s3://{bucket}/{key}");
        Ok(())
    }
}
