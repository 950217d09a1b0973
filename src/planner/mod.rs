//! Change-set planning for dry-run deployments.
//!
//! This module handles:
//! - Resolving the artifact bucket and naming the change set
//! - Packaging, change detection and template upload
//! - Creating, waiting for and describing the change set
//! - Diffing it against the live stack
//! - Removing the change set and its artifacts afterwards

mod bucket;
mod changeset;
mod cleanup;
mod collaborators;
mod diff;
mod executor;
mod plan;
mod template;

pub use bucket::BucketResolver;
pub use changeset::{ChangeSetClient, ChangeSetRequest, ChangeSetType, WaitOutcome};
pub use cleanup::{delete_change_set_artifacts, MAX_DELETE_BATCH};
pub use collaborators::{
    ArtifactChangeDetector, ArtifactUploader, ChangeDetector, CommandPackager, Packager,
    S3ArtifactUploader, FILE_SHA256_METADATA_KEY,
};
pub use diff::DiffEngine;
pub use executor::ChangeSetPlanner;
pub use plan::{PlanOutcome, PlanReport, ResourceChangeSummary, ValueChange};
pub use template::CompiledTemplate;
