//! Naming scheme for stacks, change sets and artifact keys.
//!
//! Every name the monitor and planner use is derived here from the service,
//! stage and artifact prefix, so the derivation rules live in one place.

use chrono::Utc;
use uuid::Uuid;

/// File name of the compiled template inside an artifact folder.
pub const COMPILED_TEMPLATE_FILE_NAME: &str = "compiled-cloudformation-template.json";

/// Logical id of the deployment bucket resource inside the stack.
pub const DEPLOYMENT_BUCKET_LOGICAL_ID: &str = "ServerlessDeploymentBucket";

/// Run id digits appended to the change-set timestamp.
const RUN_ID_DIGITS: usize = 8;

/// Region whose S3 endpoint has no region component.
const LEGACY_S3_REGION: &str = "us-east-1";

/// Derives stack, change-set and artifact names for one service stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Naming {
    service: String,
    stage: String,
    prefix: String,
    stack_name: Option<String>,
}

impl Naming {
    /// Creates a naming scheme for the given service, stage and artifact prefix.
    #[must_use]
    pub fn new(service: &str, stage: &str, prefix: &str) -> Self {
        Self {
            service: service.to_string(),
            stage: stage.to_string(),
            prefix: prefix.trim_matches('/').to_string(),
            stack_name: None,
        }
    }

    /// Overrides the derived stack name.
    #[must_use]
    pub fn with_stack_name(mut self, stack_name: Option<String>) -> Self {
        self.stack_name = stack_name;
        self
    }

    /// Returns the stack name, `{service}-{stage}` unless overridden.
    #[must_use]
    pub fn stack_name(&self) -> String {
        self.stack_name
            .clone()
            .unwrap_or_else(|| format!("{}-{}", self.service, self.stage))
    }

    /// Returns the directory holding every artifact of this service stage.
    #[must_use]
    pub fn artifact_directory(&self) -> String {
        if self.prefix.is_empty() {
            format!("{}/{}", self.service, self.stage)
        } else {
            format!("{}/{}/{}", self.prefix, self.service, self.stage)
        }
    }

    /// Generates a fresh change-set suffix from the current time and the
    /// first eight hex digits of the planning run id.
    #[must_use]
    pub fn change_set_suffix(run_id: Uuid) -> String {
        let run = run_id.simple().to_string();
        format!(
            "{}-{}",
            Utc::now().format("%Y%m%d%H%M%S%3f"),
            &run[..RUN_ID_DIGITS]
        )
    }

    /// Returns the change-set name for a suffix.
    #[must_use]
    pub fn change_set_name(&self, suffix: &str) -> String {
        format!("{}-{suffix}", self.stack_name())
    }

    /// Returns the artifact folder scoped to one change set.
    #[must_use]
    pub fn change_set_folder(&self, suffix: &str) -> String {
        format!("{}/changesets/{suffix}", self.artifact_directory())
    }

    /// Returns the key of the compiled template inside a folder.
    #[must_use]
    pub fn template_key(folder: &str) -> String {
        format!("{folder}/{COMPILED_TEMPLATE_FILE_NAME}")
    }

    /// Returns the URL the control plane reads the template from.
    #[must_use]
    pub fn template_url(bucket: &str, key: &str, region: Option<&str>) -> String {
        match region {
            Some(region) if region != LEGACY_S3_REGION => {
                format!("https://s3.{region}.amazonaws.com/{bucket}/{key}")
            }
            _ => format!("https://s3.amazonaws.com/{bucket}/{key}"),
        }
    }
}

/// Returns true if a directory name looks like `{millis}-{ISO timestamp}`.
#[must_use]
pub fn is_deployment_directory(token: &str) -> bool {
    const PATTERN: &[u8] = b"dddd-dd-ddTdd:dd:dd";

    let Some((millis, rest)) = token.split_once('-') else {
        return false;
    };
    if millis.is_empty() || !millis.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let rest = rest.as_bytes();
    rest.len() >= PATTERN.len()
        && PATTERN.iter().zip(rest).all(|(expected, actual)| match expected {
            b'd' => actual.is_ascii_digit(),
            literal => literal == actual,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_names() {
        let naming = Naming::new("new-service", "dev", "serverless");
        assert_eq!(naming.stack_name(), "new-service-dev");
        assert_eq!(naming.artifact_directory(), "serverless/new-service/dev");
        assert_eq!(naming.change_set_name("123"), "new-service-dev-123");
        assert_eq!(
            naming.change_set_folder("123"),
            "serverless/new-service/dev/changesets/123"
        );
        assert_eq!(
            Naming::template_key("a/b"),
            "a/b/compiled-cloudformation-template.json"
        );
    }

    #[test]
    fn test_prefix_slashes_trimmed() {
        let naming = Naming::new("svc", "prod", "/deploys/");
        assert_eq!(naming.artifact_directory(), "deploys/svc/prod");

        let bare = Naming::new("svc", "prod", "");
        assert_eq!(bare.artifact_directory(), "svc/prod");
    }

    #[test]
    fn test_change_set_suffix_shape() {
        let run_id = Uuid::parse_str("3f2504e0-4f89-41d3-9a0c-0305e82c3301").expect("uuid");
        let suffix = Naming::change_set_suffix(run_id);
        let (timestamp, run) = suffix.split_once('-').expect("separator");

        assert_eq!(suffix.len(), 26);
        assert_eq!(timestamp.len(), 17);
        assert!(timestamp.bytes().all(|b| b.is_ascii_digit()));
        assert_eq!(run, "3f2504e0");
    }

    #[test]
    fn test_change_set_suffix_differs_within_same_millisecond() {
        let a = Naming::change_set_suffix(Uuid::new_v4());
        let b = Naming::change_set_suffix(Uuid::new_v4());
        assert_ne!(a, b);
    }

    #[test]
    fn test_template_url_by_region() {
        assert_eq!(
            Naming::template_url("bkt", "k.json", None),
            "https://s3.amazonaws.com/bkt/k.json"
        );
        assert_eq!(
            Naming::template_url("bkt", "k.json", Some("us-east-1")),
            "https://s3.amazonaws.com/bkt/k.json"
        );
        assert_eq!(
            Naming::template_url("bkt", "k.json", Some("eu-west-1")),
            "https://s3.eu-west-1.amazonaws.com/bkt/k.json"
        );
    }

    #[test]
    fn test_deployment_directory_tokens() {
        assert!(is_deployment_directory("1589988704359-2020-05-20T15:31:44.359Z"));
        assert!(!is_deployment_directory("changesets"));
        assert!(!is_deployment_directory("2020-05-20T15:31:44"));
        assert!(!is_deployment_directory("123-2020-05-20"));
    }
}
