//! Template hashing for change detection.
//!
//! The compiled template is normalized before hashing so that values which
//! change on every packaging run (deployment resource suffixes, artifact keys)
//! do not register as changes. The digest is the base64 SHA-256 of the compact
//! JSON text with keys in document order, matching the `filesha256` metadata
//! stored next to earlier deployments.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

const API_GATEWAY_DEPLOYMENT: &str = "ApiGatewayDeployment";
const WEBSOCKETS_DEPLOYMENT: &str = "WebsocketsDeployment";
const WEBSOCKETS_DEPLOYMENT_STAGE: &str = "WebsocketsDeploymentStage";

/// Hasher for compiled templates.
#[derive(Debug, Default)]
pub struct TemplateHasher;

impl TemplateHasher {
    /// Creates a new template hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the base64 SHA-256 of a normalized template.
    #[must_use]
    pub fn hash_template(&self, template: &Value) -> String {
        let normalized = normalize_template(template);
        self.hash_bytes(normalized.to_string().as_bytes())
    }

    /// Computes the base64 SHA-256 of raw bytes.
    #[must_use]
    pub fn hash_bytes(&self, bytes: &[u8]) -> String {
        STANDARD.encode(Sha256::digest(bytes))
    }

    /// Computes a short hash (first 8 characters) for display purposes.
    #[must_use]
    pub fn short_hash(&self, hash: &str) -> String {
        hash.chars().take(8).collect()
    }

    /// Compares two hashes in constant time.
    #[must_use]
    pub fn hashes_match(hash1: &str, hash2: &str) -> bool {
        if hash1.len() != hash2.len() {
            return false;
        }

        hash1
            .bytes()
            .zip(hash2.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

/// Strips per-run values from a compiled template.
///
/// Timestamped deployment resources lose their suffix and move to the end of
/// `Resources`, and function and layer code keys are blanked. Everything else
/// keeps its position.
#[must_use]
pub fn normalize_template(template: &Value) -> Value {
    let mut normalized = template.clone();

    let Some(resources) = normalized
        .get_mut("Resources")
        .and_then(Value::as_object_mut)
    else {
        return normalized;
    };

    let keys: Vec<String> = resources.keys().cloned().collect();
    for key in keys {
        let target = if key.starts_with(API_GATEWAY_DEPLOYMENT) {
            API_GATEWAY_DEPLOYMENT
        } else if key.starts_with(WEBSOCKETS_DEPLOYMENT) && key != WEBSOCKETS_DEPLOYMENT_STAGE {
            WEBSOCKETS_DEPLOYMENT
        } else {
            continue;
        };

        if key == target {
            continue;
        }
        if let Some(resource) = resources.shift_remove(&key) {
            resources.shift_remove(target);
            resources.insert(target.to_string(), resource);
        }
    }

    if let Some(Value::Object(stage)) = resources.get_mut(WEBSOCKETS_DEPLOYMENT_STAGE) {
        set_path(stage, &["Properties", "DeploymentId", "Ref"], WEBSOCKETS_DEPLOYMENT);
    }

    for resource in resources.values_mut() {
        let Some(resource) = resource.as_object_mut() else {
            continue;
        };
        match resource.get("Type").and_then(Value::as_str) {
            Some("AWS::Lambda::Function") => set_path(resource, &["Properties", "Code", "S3Key"], ""),
            Some("AWS::Lambda::LayerVersion") => {
                set_path(resource, &["Properties", "Content", "S3Key"], "");
            }
            _ => {}
        }
    }

    normalized
}

/// Overwrites a nested string below existing parent objects.
fn set_path(object: &mut Map<String, Value>, path: &[&str], value: &str) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };

    let mut current = object;
    for key in parents {
        let Some(Value::Object(next)) = current.get_mut(*key) else {
            return;
        };
        current = next;
    }

    current.insert((*last).to_string(), Value::String(value.to_string()));
}
