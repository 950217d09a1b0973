//! Plan report types.
//!
//! A [`PlanReport`] is what an operator sees after a dry run: which
//! parameters and tags would change, and which resources the change set would
//! add, modify or remove.

use serde::Serialize;

use super::changeset::ChangeSetType;

/// Result of one planning run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PlanOutcome {
    /// The compiled template matches the deployed one; nothing was created.
    NoChanges,
    /// A change set was compiled but contained no changes.
    EmptyChangeSet,
    /// A change set was compiled and analyzed.
    Planned(PlanReport),
}

/// Analysis of one compiled change set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanReport {
    /// Target stack.
    pub stack_name: String,
    /// Name of the analyzed change set.
    pub change_set_name: String,
    /// Whether the change set creates or updates the stack.
    pub change_set_type: ChangeSetType,
    /// Parameter changes.
    pub parameters: Vec<ValueChange>,
    /// Tag changes.
    pub tags: Vec<ValueChange>,
    /// Resource changes in change-set order.
    pub resources: Vec<ResourceChangeSummary>,
}

/// A keyed value before and after the change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueChange {
    /// Parameter or tag key.
    pub key: String,
    /// Current value, `None` when added.
    pub before: Option<String>,
    /// Proposed value, `None` when removed.
    pub after: Option<String>,
}

/// One proposed resource change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceChangeSummary {
    /// `Add`, `Modify`, `Remove`, `Import` or `Dynamic`.
    pub action: String,
    /// Logical id of the resource.
    pub logical_resource_id: String,
    /// Resource type.
    pub resource_type: String,
    /// Replacement flag for modifications.
    pub replacement: Option<String>,
}

impl PlanReport {
    /// Returns true if nothing would change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty() && self.tags.is_empty() && self.resources.is_empty()
    }

    /// Counts resource changes with the given action.
    #[must_use]
    pub fn count(&self, action: &str) -> usize {
        self.resources.iter().filter(|r| r.action == action).count()
    }
}

impl ValueChange {
    /// Single-character marker: `+` added, `-` removed, `~` changed.
    #[must_use]
    pub fn marker(&self) -> char {
        match (&self.before, &self.after) {
            (None, Some(_)) => '+',
            (Some(_), None) => '-',
            _ => '~',
        }
    }
}

impl ResourceChangeSummary {
    /// Returns true if the change replaces the resource.
    #[must_use]
    pub fn replaces(&self) -> bool {
        self.replacement.as_deref() == Some("True")
    }
}

impl std::fmt::Display for ValueChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let before = self.before.as_deref().unwrap_or("-");
        let after = self.after.as_deref().unwrap_or("-");
        write!(f, "{} {}: {before} => {after}", self.marker(), self.key)
    }
}

impl std::fmt::Display for ResourceChangeSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} ({})", self.action, self.logical_resource_id, self.resource_type)?;
        if self.replaces() {
            write!(f, " [replacement]")?;
        }
        Ok(())
    }
}

impl std::fmt::Display for PlanReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Change set {} ({}) for stack {}",
            self.change_set_name, self.change_set_type, self.stack_name
        )?;

        if self.is_empty() {
            return write!(f, "  No changes");
        }

        if !self.parameters.is_empty() {
            writeln!(f, "Parameters:")?;
            for change in &self.parameters {
                writeln!(f, "  {change}")?;
            }
        }

        if !self.tags.is_empty() {
            writeln!(f, "Tags:")?;
            for change in &self.tags {
                writeln!(f, "  {change}")?;
            }
        }

        if !self.resources.is_empty() {
            writeln!(f, "Resources ({}):", self.resources.len())?;
            for resource in &self.resources {
                writeln!(f, "  {resource}")?;
            }
        }

        Ok(())
    }
}

impl std::fmt::Display for PlanOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoChanges => write!(f, "No changes to deploy"),
            Self::EmptyChangeSet => write!(f, "Change set contains no changes"),
            Self::Planned(report) => write!(f, "{report}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> PlanReport {
        PlanReport {
            stack_name: String::from("svc-dev"),
            change_set_name: String::from("svc-dev-1"),
            change_set_type: ChangeSetType::Update,
            parameters: vec![ValueChange {
                key: String::from("Memory"),
                before: Some(String::from("128")),
                after: Some(String::from("256")),
            }],
            tags: vec![ValueChange {
                key: String::from("TEAM"),
                before: None,
                after: Some(String::from("infra")),
            }],
            resources: vec![
                ResourceChangeSummary {
                    action: String::from("Modify"),
                    logical_resource_id: String::from("Bucket"),
                    resource_type: String::from("AWS::S3::Bucket"),
                    replacement: Some(String::from("True")),
                },
                ResourceChangeSummary {
                    action: String::from("Add"),
                    logical_resource_id: String::from("Queue"),
                    resource_type: String::from("AWS::SQS::Queue"),
                    replacement: None,
                },
            ],
        }
    }

    #[test]
    fn test_report_display() {
        let text = report().to_string();

        assert!(text.contains("Change set svc-dev-1 (UPDATE) for stack svc-dev"));
        assert!(text.contains("~ Memory: 128 => 256"));
        assert!(text.contains("+ TEAM: - => infra"));
        assert!(text.contains("Modify Bucket (AWS::S3::Bucket) [replacement]"));
    }

    #[test]
    fn test_counts() {
        let report = report();
        assert!(!report.is_empty());
        assert_eq!(report.count("Add"), 1);
        assert_eq!(report.count("Remove"), 0);
    }

    #[test]
    fn test_outcome_json() {
        let value = serde_json::to_value(PlanOutcome::Planned(report())).expect("json");
        assert_eq!(value["outcome"], "planned");
        assert_eq!(value["change_set_type"], "UPDATE");

        let value = serde_json::to_value(PlanOutcome::NoChanges).expect("json");
        assert_eq!(value["outcome"], "no_changes");
    }

    #[test]
    fn test_removed_marker() {
        let change = ValueChange {
            key: String::from("k"),
            before: Some(String::from("v")),
            after: None,
        };
        assert_eq!(change.marker(), '-');
    }
}
