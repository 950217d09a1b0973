//! Per-operation event cursor.
//!
//! [`MonitorCursor`] is the state machine behind the monitor's poll loop. It
//! remembers which events were already consumed, where the monitored
//! operation started in the event log, which resources failed, and what the
//! stack itself last reported. It lives for one poll loop and is never shared.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::error::DeploymentFailed;
use crate::gateway::types::StackEvent;

use super::options::{MonitorOptions, OperationKind, StackHandle};

/// A failure reason attached to one logical resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFailure {
    /// Logical id of the failed resource.
    pub logical_resource_id: String,
    /// Reason reported by the control plane, or the status when none was given.
    pub reason: String,
}

/// Decision taken after consuming one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Keep polling.
    Continue,
    /// The operation reached its success status.
    Succeeded(String),
    /// The operation failed.
    Failed(DeploymentFailed),
}

/// Event cursor for one monitored operation.
#[derive(Debug, Default)]
pub struct MonitorCursor {
    monitored_since: Option<DateTime<Utc>>,
    start_marker: Option<String>,
    processed: HashSet<String>,
    captured_failures: Vec<CapturedFailure>,
    stack_failure: Option<CapturedFailure>,
    failure_signaled: bool,
    stack_status: Option<String>,
}

impl MonitorCursor {
    /// Creates an empty cursor that accepts any start event.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cursor that only accepts start events stamped at or after
    /// `monitored_since`.
    ///
    /// Start events of earlier operations are then treated as history even
    /// when the new operation's own start event is not visible yet.
    #[must_use]
    pub fn since(monitored_since: DateTime<Utc>) -> Self {
        Self {
            monitored_since: Some(monitored_since),
            ..Self::default()
        }
    }

    /// Id of the stack-level event that opened the operation, once seen.
    #[must_use]
    pub fn start_marker(&self) -> Option<&str> {
        self.start_marker.as_deref()
    }

    /// Resource failures seen so far, oldest first.
    #[must_use]
    pub fn captured_failures(&self) -> &[CapturedFailure] {
        &self.captured_failures
    }

    /// Last status reported by the stack itself.
    #[must_use]
    pub fn stack_status(&self) -> Option<&str> {
        self.stack_status.as_deref()
    }

    /// Feeds one newest-first response into the cursor and decides whether
    /// polling should stop.
    pub fn advance(
        &mut self,
        operation: OperationKind,
        stack: &StackHandle,
        options: &MonitorOptions,
        events: &[StackEvent],
    ) -> Verdict {
        for event in self.fresh_events(operation, &stack.name, events) {
            if self.processed.insert(event.event_id.clone()) {
                self.consume(operation, &stack.name, options, event);
            }
        }

        self.verdict(operation, &stack.name, options)
    }

    /// Returns unseen events of the current operation, oldest first.
    ///
    /// Until the operation's start event shows up, every event is treated as
    /// history of earlier operations.
    fn fresh_events<'e>(
        &mut self,
        operation: OperationKind,
        stack_name: &str,
        events: &'e [StackEvent],
    ) -> Vec<&'e StackEvent> {
        if self.start_marker.is_none() {
            let start = events.iter().position(|e| {
                e.is_stack_level(stack_name)
                    && e.resource_status.as_deref() == Some(operation.start_status())
                    && self.is_within_bound(e)
            });

            let Some(start) = start else {
                debug!(
                    "No {} event yet, skipping {} historical event(s)",
                    operation.start_status(),
                    events.len()
                );
                self.processed
                    .extend(events.iter().map(|e| e.event_id.clone()));
                return Vec::new();
            };

            self.start_marker = Some(events[start].event_id.clone());
            self.processed
                .extend(events[start + 1..].iter().map(|e| e.event_id.clone()));
        }

        events
            .iter()
            .rev()
            .filter(|e| !self.processed.contains(&e.event_id))
            .collect()
    }

    /// Events without a timestamp cannot be dated and are accepted.
    fn is_within_bound(&self, event: &StackEvent) -> bool {
        match (self.monitored_since, event.timestamp) {
            (Some(since), Some(timestamp)) => timestamp >= since,
            _ => true,
        }
    }

    /// Classifies one new event.
    fn consume(
        &mut self,
        operation: OperationKind,
        stack_name: &str,
        options: &MonitorOptions,
        event: &StackEvent,
    ) {
        let Some(status) = event.resource_status.as_deref() else {
            debug!("Event {} carries no status", event.event_id);
            return;
        };

        log_event(event, status, options.verbose());

        if event.is_stack_level(stack_name) {
            self.stack_status = Some(status.to_string());

            let signal = is_failure_signal(operation, status);
            if signal {
                self.failure_signaled = true;
            }
            if (signal || is_terminal_failure(operation, options, status))
                && self.stack_failure.is_none()
            {
                self.stack_failure = Some(CapturedFailure {
                    logical_resource_id: event.logical_resource_id.clone(),
                    reason: event.reason_or_status(),
                });
            }
        } else if status.ends_with("FAILED") {
            self.failure_signaled = true;
            self.captured_failures.push(CapturedFailure {
                logical_resource_id: event.logical_resource_id.clone(),
                reason: event.reason_or_status(),
            });
        }
    }

    /// Decides the outcome from everything consumed so far.
    fn verdict(
        &self,
        operation: OperationKind,
        stack_name: &str,
        options: &MonitorOptions,
    ) -> Verdict {
        let status = self.stack_status.as_deref();
        let terminal_failure = status.is_some_and(|s| is_terminal_failure(operation, options, s));

        if terminal_failure || (self.failure_signaled && !options.verbose()) {
            return Verdict::Failed(self.failure(stack_name));
        }

        match status {
            Some(status) if status == operation.success_status() => {
                for failure in &self.captured_failures {
                    warn!(
                        "{} reported {} but the stack reached {status}",
                        failure.logical_resource_id, failure.reason
                    );
                }
                Verdict::Succeeded(status.to_string())
            }
            _ => Verdict::Continue,
        }
    }

    /// Picks the most specific failure reason available.
    fn failure(&self, stack_name: &str) -> DeploymentFailed {
        self.captured_failures
            .first()
            .or(self.stack_failure.as_ref())
            .map_or_else(
                || DeploymentFailed::new(stack_name, "Stack operation failed"),
                |f| DeploymentFailed::new(&f.logical_resource_id, &f.reason),
            )
    }
}

/// A stack-level status that means the operation is going wrong.
fn is_failure_signal(operation: OperationKind, status: &str) -> bool {
    status.ends_with("FAILED")
        || (operation != OperationKind::Delete
            && (status.ends_with("ROLLBACK_IN_PROGRESS") || status == "DELETE_IN_PROGRESS"))
}

/// A stack-level status after which nothing more will happen.
fn is_terminal_failure(operation: OperationKind, options: &MonitorOptions, status: &str) -> bool {
    status.ends_with("ROLLBACK_COMPLETE")
        || status.ends_with("ROLLBACK_FAILED")
        || status == "DELETE_FAILED"
        || (operation != OperationKind::Delete && status == "DELETE_COMPLETE")
        || (options.disable_rollback() && matches!(status, "CREATE_FAILED" | "UPDATE_FAILED"))
}

fn log_event(event: &StackEvent, status: &str, verbose: bool) {
    let timestamp = event
        .timestamp
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_default();
    let reason = event
        .resource_status_reason
        .as_deref()
        .map(|r| format!(" ({r})"))
        .unwrap_or_default();

    if verbose {
        info!(
            "{timestamp} {status} {} {}{reason}",
            event.resource_type, event.logical_resource_id
        );
    } else {
        debug!(
            "{timestamp} {status} {} {}{reason}",
            event.resource_type, event.logical_resource_id
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::types::STACK_RESOURCE_TYPE;

    const STACK: &str = "new-service-dev";

    fn event(id: &str, logical: &str, resource_type: &str, status: &str) -> StackEvent {
        StackEvent {
            event_id: id.to_string(),
            stack_name: STACK.to_string(),
            logical_resource_id: logical.to_string(),
            resource_type: resource_type.to_string(),
            resource_status: Some(status.to_string()),
            resource_status_reason: None,
            timestamp: None,
        }
    }

    fn stack_event(id: &str, status: &str) -> StackEvent {
        event(id, STACK, STACK_RESOURCE_TYPE, status)
    }

    #[test]
    fn test_history_before_start_is_ignored() {
        let mut cursor = MonitorCursor::new();
        let mut old_failure = event("0", "oldBucket", "AWS::S3::Bucket", "CREATE_FAILED");
        old_failure.resource_status_reason = Some(String::from("old"));
        let events = vec![
            stack_event("3", "UPDATE_IN_PROGRESS"),
            stack_event("2", "UPDATE_ROLLBACK_COMPLETE"),
            stack_event("1", "UPDATE_IN_PROGRESS"),
            old_failure,
        ];

        let verdict = cursor.advance(
            OperationKind::Update,
            &StackHandle::from_name(STACK),
            &MonitorOptions::default(),
            &events,
        );

        assert_eq!(verdict, Verdict::Continue);
        assert_eq!(cursor.start_marker(), Some("3"));
        assert!(cursor.captured_failures().is_empty());
        assert_eq!(cursor.stack_status(), Some("UPDATE_IN_PROGRESS"));
    }

    #[test]
    fn test_start_events_before_bound_are_history() {
        let since = "2024-05-01T12:00:00Z".parse::<DateTime<Utc>>().expect("timestamp");
        let at = |id: &str, status: &str, time: &str| {
            let mut event = stack_event(id, status);
            event.timestamp = Some(time.parse().expect("timestamp"));
            event
        };
        let mut cursor = MonitorCursor::since(since);
        let handle = StackHandle::from_name(STACK);
        let options = MonitorOptions::default();

        let previous = vec![
            at("3", "UPDATE_ROLLBACK_COMPLETE", "2024-05-01T11:00:09Z"),
            at("2", "UPDATE_ROLLBACK_IN_PROGRESS", "2024-05-01T11:00:05Z"),
            at("1", "UPDATE_IN_PROGRESS", "2024-05-01T11:00:00Z"),
        ];
        let verdict = cursor.advance(OperationKind::Update, &handle, &options, &previous);

        assert_eq!(verdict, Verdict::Continue);
        assert!(cursor.start_marker().is_none());

        let mut current = vec![
            at("5", "UPDATE_COMPLETE", "2024-05-01T12:00:07Z"),
            at("4", "UPDATE_IN_PROGRESS", "2024-05-01T12:00:01Z"),
        ];
        current.extend(previous);
        let verdict = cursor.advance(OperationKind::Update, &handle, &options, &current);

        assert_eq!(verdict, Verdict::Succeeded(String::from("UPDATE_COMPLETE")));
        assert_eq!(cursor.start_marker(), Some("4"));
    }

    #[test]
    fn test_no_start_event_keeps_waiting() {
        let mut cursor = MonitorCursor::new();
        let events = vec![stack_event("1", "UPDATE_COMPLETE")];

        let verdict = cursor.advance(
            OperationKind::Update,
            &StackHandle::from_name(STACK),
            &MonitorOptions::default(),
            &events,
        );

        assert_eq!(verdict, Verdict::Continue);
        assert!(cursor.start_marker().is_none());
        assert!(cursor.stack_status().is_none());
    }

    #[test]
    fn test_events_consumed_once() {
        let mut cursor = MonitorCursor::new();
        let handle = StackHandle::from_name(STACK);
        let options = MonitorOptions::new(std::time::Duration::from_millis(1), true, false, None)
            .expect("valid");
        let failed = event("2", "myBucket", "AWS::S3::Bucket", "CREATE_FAILED");
        let events = vec![failed.clone(), stack_event("1", "CREATE_IN_PROGRESS")];

        cursor.advance(OperationKind::Create, &handle, &options, &events);
        cursor.advance(OperationKind::Create, &handle, &options, &events);

        assert_eq!(cursor.captured_failures().len(), 1);
        assert_eq!(cursor.captured_failures()[0].reason, "CREATE_FAILED");
    }

    #[test]
    fn test_failure_signals() {
        assert!(is_failure_signal(OperationKind::Create, "CREATE_FAILED"));
        assert!(is_failure_signal(OperationKind::Update, "UPDATE_ROLLBACK_IN_PROGRESS"));
        assert!(is_failure_signal(OperationKind::Create, "DELETE_IN_PROGRESS"));
        assert!(!is_failure_signal(OperationKind::Delete, "DELETE_IN_PROGRESS"));
        assert!(!is_failure_signal(OperationKind::Update, "UPDATE_COMPLETE_CLEANUP_IN_PROGRESS"));
    }

    #[test]
    fn test_terminal_failures() {
        let defaults = MonitorOptions::default();
        assert!(is_terminal_failure(OperationKind::Create, &defaults, "ROLLBACK_COMPLETE"));
        assert!(is_terminal_failure(OperationKind::Update, &defaults, "UPDATE_ROLLBACK_COMPLETE"));
        assert!(is_terminal_failure(OperationKind::Create, &defaults, "DELETE_COMPLETE"));
        assert!(!is_terminal_failure(OperationKind::Delete, &defaults, "DELETE_COMPLETE"));
        assert!(!is_terminal_failure(OperationKind::Create, &defaults, "CREATE_FAILED"));

        let no_rollback = MonitorOptions::new(std::time::Duration::from_secs(1), false, true, None)
            .expect("valid");
        assert!(is_terminal_failure(OperationKind::Create, &no_rollback, "CREATE_FAILED"));
    }
}
