//! Change-set planner.
//!
//! Runs one dry-run deployment: resolve the bucket, package, detect changes,
//! upload the template, create and wait for a change set, diff it against the
//! live stack, then delete the change set and its artifacts. Once a change set
//! exists it is always deleted, and once the template is uploaded its folder
//! is always cleaned, whatever happened in between.

use std::path::PathBuf;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::classify;
use crate::config::{DeployConfig, Naming};
use crate::error::Result;
use crate::gateway::types::{DescribeStacksInput, DescribeStacksOutput, Parameter, Stack, Tag};
use crate::gateway::{call, SharedGateway, CLOUDFORMATION};

use super::bucket::BucketResolver;
use super::changeset::{ChangeSetClient, ChangeSetRequest, ChangeSetType, WaitOutcome};
use super::cleanup::delete_change_set_artifacts;
use super::collaborators::{
    ArtifactChangeDetector, ArtifactUploader, ChangeDetector, CommandPackager, Packager,
    S3ArtifactUploader,
};
use super::diff::DiffEngine;
use super::plan::PlanOutcome;
use super::template::CompiledTemplate;

/// Stack settings copied onto every change set.
#[derive(Debug, Clone)]
struct StackSettings {
    parameters: Vec<Parameter>,
    tags: Vec<Tag>,
    capabilities: Vec<String>,
    role_arn: Option<String>,
}

impl StackSettings {
    fn from_config(config: &DeployConfig) -> Self {
        let provider = &config.provider;
        Self {
            parameters: provider
                .stack_parameters
                .iter()
                .map(|p| Parameter {
                    parameter_key: p.key.clone(),
                    parameter_value: Some(p.value.clone()),
                })
                .collect(),
            tags: provider
                .stack_tags
                .iter()
                .map(|(key, value)| Tag {
                    key: key.clone(),
                    value: value.clone(),
                })
                .collect(),
            capabilities: provider
                .capabilities
                .iter()
                .map(|c| c.as_str().to_string())
                .collect(),
            role_arn: provider.role_arn.clone(),
        }
    }
}

/// Plans deployments through short-lived change sets.
pub struct ChangeSetPlanner {
    gateway: SharedGateway,
    naming: Naming,
    region: Option<String>,
    template_path: PathBuf,
    settings: StackSettings,
    bucket: BucketResolver,
    change_sets: ChangeSetClient,
    packager: Box<dyn Packager>,
    detector: Box<dyn ChangeDetector>,
    uploader: Box<dyn ArtifactUploader>,
    diff: DiffEngine,
}

impl ChangeSetPlanner {
    /// Creates a planner with explicit collaborators.
    #[must_use]
    pub fn new(
        gateway: SharedGateway,
        config: &DeployConfig,
        packager: Box<dyn Packager>,
        detector: Box<dyn ChangeDetector>,
        uploader: Box<dyn ArtifactUploader>,
    ) -> Self {
        let naming = config.naming();
        let bucket = BucketResolver::new(
            gateway.clone(),
            naming.stack_name(),
            config.provider.deployment_bucket.clone(),
        );

        Self {
            change_sets: ChangeSetClient::new(gateway.clone(), &config.change_set),
            gateway,
            naming,
            region: config.region.clone(),
            template_path: config.package.template.clone(),
            settings: StackSettings::from_config(config),
            bucket,
            packager,
            detector,
            uploader,
            diff: DiffEngine::new(),
        }
    }

    /// Creates a planner wired to the packaging command and artifact store.
    ///
    /// `force` skips change detection in addition to `package.force`.
    #[must_use]
    pub fn from_config(
        gateway: SharedGateway,
        config: &DeployConfig,
        working_dir: PathBuf,
        force: bool,
    ) -> Self {
        let packager = CommandPackager::new(config.package.command.clone(), working_dir);
        let detector = ArtifactChangeDetector::new(
            gateway.clone(),
            config.naming(),
            force || config.package.force,
        );
        let uploader = S3ArtifactUploader::new(gateway.clone());

        Self::new(
            gateway,
            config,
            Box::new(packager),
            Box::new(detector),
            Box::new(uploader),
        )
    }

    /// Runs one planning pass.
    ///
    /// # Errors
    ///
    /// Returns the first error of the pipeline. Cleanup errors are logged and
    /// never replace it.
    pub async fn plan(&self) -> Result<PlanOutcome> {
        let run_id = Uuid::new_v4();
        let span = info_span!("plan", %run_id, stack = %self.naming.stack_name());
        self.run(run_id).instrument(span).await
    }

    async fn run(&self, run_id: Uuid) -> Result<PlanOutcome> {
        let stack_name = self.naming.stack_name();
        let bucket = self.bucket.resolve().await?;

        let suffix = Naming::change_set_suffix(run_id);
        let folder = self.naming.change_set_folder(&suffix);
        let change_set_name = self.naming.change_set_name(&suffix);

        self.packager.package().await?;

        let template = CompiledTemplate::load(&self.template_path)?;
        if !self.detector.has_changes(bucket, &template).await? {
            info!("Template unchanged, nothing to plan");
            return Ok(PlanOutcome::NoChanges);
        }

        let key = Naming::template_key(&folder);
        self.uploader.upload(bucket, &key, &template).await?;

        let request = ChangeSetRequest {
            stack_name: stack_name.clone(),
            change_set_name: change_set_name.clone(),
            template_url: Naming::template_url(bucket, &key, self.region.as_deref()),
            parameters: self.settings.parameters.clone(),
            tags: self.settings.tags.clone(),
            capabilities: self.settings.capabilities.clone(),
            role_arn: self.settings.role_arn.clone(),
        };

        let change_set_type = match self.change_sets.create(&request).await {
            Ok(change_set_type) => change_set_type,
            Err(err) => {
                self.cleanup_artifacts(bucket, &folder).await;
                return Err(err);
            }
        };

        let outcome = self.analyze(&stack_name, &change_set_name, change_set_type).await;

        self.cleanup_change_set(&stack_name, &change_set_name).await;
        self.cleanup_artifacts(bucket, &folder).await;

        outcome
    }

    async fn analyze(
        &self,
        stack_name: &str,
        change_set_name: &str,
        change_set_type: ChangeSetType,
    ) -> Result<PlanOutcome> {
        let waited = self
            .change_sets
            .wait_for_change_set_create_complete(stack_name, change_set_name)
            .await?;
        if waited == WaitOutcome::NoChanges {
            return Ok(PlanOutcome::EmptyChangeSet);
        }

        let (live, description) = tokio::try_join!(
            self.describe_stack(stack_name),
            self.change_sets.describe(stack_name, change_set_name),
        )?;

        let report = self
            .diff
            .compute_report(change_set_type, live.as_ref(), &description, stack_name);
        Ok(PlanOutcome::Planned(report))
    }

    /// Describes the live stack, `None` when it does not exist yet.
    async fn describe_stack(&self, stack_name: &str) -> Result<Option<Stack>> {
        let output: std::result::Result<DescribeStacksOutput, _> = call(
            self.gateway.as_ref(),
            CLOUDFORMATION,
            "describeStacks",
            DescribeStacksInput {
                stack_name: stack_name.to_string(),
            },
        )
        .await;

        match output {
            Ok(output) => Ok(output.stacks.into_iter().next()),
            Err(err) if classify::is_stack_missing(&err) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn cleanup_change_set(&self, stack_name: &str, change_set_name: &str) {
        if let Err(err) = self.change_sets.delete(stack_name, change_set_name).await {
            warn!("Failed to delete change set {change_set_name}: {err}");
        }
    }

    async fn cleanup_artifacts(&self, bucket: &str, folder: &str) {
        if let Err(err) = delete_change_set_artifacts(&self.gateway, bucket, folder).await {
            warn!("Failed to clean up artifacts under {folder}: {err}");
        }
    }
}
