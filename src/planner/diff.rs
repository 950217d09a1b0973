//! Diff engine for comparing the live stack with a compiled change set.
//!
//! Parameters and tags are compared key by key; resource changes come straight
//! from the change set, which already computed them server-side.

use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::gateway::types::{ChangeSetDescription, Parameter, Stack, Tag};

use super::changeset::ChangeSetType;
use super::plan::{PlanReport, ResourceChangeSummary, ValueChange};

/// Engine for computing plan reports.
#[derive(Debug, Default)]
pub struct DiffEngine;

impl DiffEngine {
    /// Creates a new diff engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the report for a compiled change set.
    ///
    /// `live` is `None` when the stack does not exist yet, in which case every
    /// parameter and tag is reported as added.
    #[must_use]
    pub fn compute_report(
        &self,
        change_set_type: ChangeSetType,
        live: Option<&Stack>,
        change_set: &ChangeSetDescription,
        stack_name: &str,
    ) -> PlanReport {
        let parameters = diff_values(
            live.map(|s| parameter_map(&s.parameters)).unwrap_or_default(),
            parameter_map(&change_set.parameters),
        );
        let tags = diff_values(
            live.map(|s| tag_map(&s.tags)).unwrap_or_default(),
            tag_map(&change_set.tags),
        );

        let resources: Vec<ResourceChangeSummary> = change_set
            .changes
            .iter()
            .filter_map(|c| c.resource_change.as_ref())
            .map(|r| ResourceChangeSummary {
                action: r.action.clone(),
                logical_resource_id: r.logical_resource_id.clone(),
                resource_type: r.resource_type.clone(),
                replacement: r.replacement.clone(),
            })
            .collect();

        debug!(
            "Plan for {stack_name}: {} parameter, {} tag and {} resource change(s)",
            parameters.len(),
            tags.len(),
            resources.len()
        );

        PlanReport {
            stack_name: stack_name.to_string(),
            change_set_name: change_set.change_set_name.clone(),
            change_set_type,
            parameters,
            tags,
            resources,
        }
    }
}

fn parameter_map(parameters: &[Parameter]) -> BTreeMap<String, Option<String>> {
    parameters
        .iter()
        .map(|p| (p.parameter_key.clone(), p.parameter_value.clone()))
        .collect()
}

fn tag_map(tags: &[Tag]) -> BTreeMap<String, Option<String>> {
    tags.iter()
        .map(|t| (t.key.clone(), Some(t.value.clone())))
        .collect()
}

/// Compares two keyed maps, returning changed keys in key order.
fn diff_values(
    mut before: BTreeMap<String, Option<String>>,
    mut after: BTreeMap<String, Option<String>>,
) -> Vec<ValueChange> {
    let keys: BTreeSet<String> = before.keys().chain(after.keys()).cloned().collect();

    keys.into_iter()
        .filter_map(|key| {
            let old = before.remove(&key).flatten();
            let new = after.remove(&key).flatten();
            (old != new).then_some(ValueChange {
                key,
                before: old,
                after: new,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::types::{Change, ResourceChange};

    fn param(key: &str, value: &str) -> Parameter {
        Parameter {
            parameter_key: key.to_string(),
            parameter_value: Some(value.to_string()),
        }
    }

    fn tag(key: &str, value: &str) -> Tag {
        Tag {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    fn live_stack() -> Stack {
        Stack {
            stack_id: Some(String::from("arn:stack")),
            stack_name: String::from("svc-dev"),
            stack_status: String::from("UPDATE_COMPLETE"),
            parameters: vec![param("Memory", "128"), param("Old", "x")],
            tags: vec![tag("STAGE", "dev"), tag("TEAM", "a")],
        }
    }

    fn change_set() -> ChangeSetDescription {
        ChangeSetDescription {
            change_set_name: String::from("svc-dev-1"),
            status: String::from("CREATE_COMPLETE"),
            parameters: vec![param("Memory", "256"), param("New", "y")],
            tags: vec![tag("STAGE", "dev"), tag("TEAM", "b")],
            changes: vec![
                Change {
                    resource_change: Some(ResourceChange {
                        action: String::from("Modify"),
                        logical_resource_id: String::from("Fn"),
                        resource_type: String::from("AWS::Lambda::Function"),
                        replacement: Some(String::from("False")),
                    }),
                },
                Change { resource_change: None },
            ],
            ..ChangeSetDescription::default()
        }
    }

    #[test]
    fn test_update_report() {
        let live = live_stack();
        let report =
            DiffEngine::new().compute_report(ChangeSetType::Update, Some(&live), &change_set(), "svc-dev");

        let keys: Vec<&str> = report.parameters.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["Memory", "New", "Old"]);
        assert_eq!(report.parameters[0].before.as_deref(), Some("128"));
        assert_eq!(report.parameters[0].after.as_deref(), Some("256"));
        assert_eq!(report.parameters[2].after, None);

        assert_eq!(report.tags.len(), 1);
        assert_eq!(report.tags[0].key, "TEAM");

        assert_eq!(report.resources.len(), 1);
        assert_eq!(report.change_set_name, "svc-dev-1");
    }

    #[test]
    fn test_new_stack_reports_everything_added() {
        let report = DiffEngine::new().compute_report(ChangeSetType::Create, None, &change_set(), "svc-dev");

        assert!(report.parameters.iter().all(|c| c.before.is_none()));
        assert_eq!(report.tags.len(), 2);
        assert_eq!(report.change_set_type, ChangeSetType::Create);
    }

    #[test]
    fn test_identical_values_produce_no_changes() {
        let before = BTreeMap::from([(String::from("k"), Some(String::from("v")))]);
        assert!(diff_values(before.clone(), before).is_empty());
    }
}
