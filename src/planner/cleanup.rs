//! Removal of change-set artifacts from the object store.

use std::collections::BTreeSet;
use tracing::{info, warn};

use crate::error::{PlanError, Result};
use crate::gateway::types::{DeleteBatch, DeleteObjectsInput, DeleteObjectsOutput, ObjectSummary};
use crate::gateway::{call, list_objects, SharedGateway, S3};

/// Maximum number of keys accepted by one `deleteObjects` call.
pub const MAX_DELETE_BATCH: usize = 1000;

/// Deletes every object under a change-set folder, plus the folder marker.
///
/// The folder is drained page by page before deleting, and the marker key
/// `{folder}/` is always part of the batch even when the listing is empty.
///
/// # Errors
///
/// Returns the gateway error of a failing call, or
/// [`PlanError::CleanupIncomplete`] if the store refused some keys.
pub async fn delete_change_set_artifacts(
    gateway: &SharedGateway,
    bucket: &str,
    folder: &str,
) -> Result<usize> {
    let marker = format!("{}/", folder.trim_end_matches('/'));
    let listed = list_objects(gateway.as_ref(), bucket, &marker).await?;

    let keys: BTreeSet<String> = listed
        .into_iter()
        .map(|o| o.key)
        .chain(std::iter::once(marker.clone()))
        .collect();
    let keys: Vec<String> = keys.into_iter().collect();

    let mut failed = 0_usize;
    for batch in keys.chunks(MAX_DELETE_BATCH) {
        let output: DeleteObjectsOutput = call(
            gateway.as_ref(),
            S3,
            "deleteObjects",
            DeleteObjectsInput {
                bucket: bucket.to_string(),
                delete: DeleteBatch {
                    objects: batch
                        .iter()
                        .map(|key| ObjectSummary { key: key.clone() })
                        .collect(),
                },
            },
        )
        .await?;

        for error in &output.errors {
            warn!("Could not delete s3://{bucket}/{}: {}", error.key, error.message);
        }
        failed += output.errors.len();
    }

    if failed > 0 {
        return Err(PlanError::CleanupIncomplete {
            folder: marker,
            failed,
        }
        .into());
    }

    info!("Removed {} artifact(s) under s3://{bucket}/{marker}", keys.len());
    Ok(keys.len())
}
