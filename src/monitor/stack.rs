//! Stack operation monitor.
//!
//! Polls the stack event log until the monitored operation succeeds or fails.
//! Transport errors are not retried here: apart from a vanished stack during
//! deletion, they surface to the caller.

use chrono::{TimeDelta, Utc};
use std::time::Instant;
use tracing::{debug, error, info};

use crate::classify;
use crate::error::{GatewayError, MonitorError, Result};
use crate::gateway::types::{DescribeStackEventsInput, DescribeStackEventsOutput, StackEvent};
use crate::gateway::{call, SharedGateway, CLOUDFORMATION};

use super::cursor::{MonitorCursor, Verdict};
use super::options::{MonitorOptions, MonitorTarget, OperationKind, StackHandle};

/// Tolerated clock difference between this host and the control plane, in seconds.
pub const CLOCK_SKEW_SECS: i64 = 5;

/// Terminal result of a monitored operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorOutcome {
    /// The stack reached the operation's success status.
    Completed(String),
    /// Nothing was monitored.
    Skipped,
}

impl MonitorOutcome {
    /// Returns the final stack status, if monitoring took place.
    #[must_use]
    pub fn status(&self) -> Option<&str> {
        match self {
            Self::Completed(status) => Some(status),
            Self::Skipped => None,
        }
    }
}

/// Watches one stack operation through the event log.
pub struct StackMonitor {
    /// Gateway used for `describeStackEvents`.
    gateway: SharedGateway,
    /// Polling options.
    options: MonitorOptions,
}

impl StackMonitor {
    /// Creates a monitor.
    #[must_use]
    pub fn new(gateway: SharedGateway, options: MonitorOptions) -> Self {
        Self { gateway, options }
    }

    /// Returns the monitor's options.
    #[must_use]
    pub const fn options(&self) -> &MonitorOptions {
        &self.options
    }

    /// Polls until the operation just issued on `target` reaches a terminal
    /// state.
    ///
    /// Only start events stamped after the call (less [`CLOCK_SKEW_SECS`]) open
    /// the operation, so an earlier operation's ending is never reported.
    ///
    /// # Errors
    ///
    /// Returns [`DeploymentFailed`](crate::error::DeploymentFailed) when the
    /// control plane reports a failure, [`MonitorError::Timeout`] when the
    /// configured timeout elapses, and any gateway error other than a missing
    /// stack during deletion.
    pub async fn monitor(
        &self,
        operation: OperationKind,
        target: &MonitorTarget,
    ) -> Result<MonitorOutcome> {
        let monitored_since = Utc::now() - TimeDelta::seconds(CLOCK_SKEW_SECS);
        self.poll(operation, target, MonitorCursor::since(monitored_since))
            .await
    }

    /// Attaches to an operation that may have started at any time before the
    /// call, taking the newest start event as its beginning.
    ///
    /// # Errors
    ///
    /// Same as [`monitor`](Self::monitor).
    pub async fn attach(
        &self,
        operation: OperationKind,
        target: &MonitorTarget,
    ) -> Result<MonitorOutcome> {
        self.poll(operation, target, MonitorCursor::new()).await
    }

    async fn poll(
        &self,
        operation: OperationKind,
        target: &MonitorTarget,
        mut cursor: MonitorCursor,
    ) -> Result<MonitorOutcome> {
        let MonitorTarget::Stack(stack) = target else {
            info!("Stack already settled, nothing to monitor for {operation}");
            return Ok(MonitorOutcome::Skipped);
        };

        info!("Checking stack {operation} progress for {}", stack.name);

        let started = Instant::now();
        let mut polls = 0_u32;

        loop {
            polls += 1;

            let events = match self.fetch_events(stack).await {
                Ok(events) => events,
                Err(err)
                    if operation == OperationKind::Delete && classify::is_stack_missing(&err) =>
                {
                    info!("Stack {} is gone after {polls} poll(s)", stack.name);
                    return Ok(MonitorOutcome::Completed(
                        operation.success_status().to_string(),
                    ));
                }
                Err(err) => return Err(err.into()),
            };

            debug!("Poll {polls}: {} event(s) for {}", events.len(), stack.name);

            match cursor.advance(operation, stack, &self.options, &events) {
                Verdict::Succeeded(status) => {
                    info!("Stack {} reached {status} after {polls} poll(s)", stack.name);
                    return Ok(MonitorOutcome::Completed(status));
                }
                Verdict::Failed(failure) => {
                    error!("Stack {} {operation} failed: {failure}", stack.name);
                    return Err(failure.into());
                }
                Verdict::Continue => {}
            }

            if let Some(limit) = self.options.timeout()
                && started.elapsed() >= limit
            {
                return Err(MonitorError::Timeout {
                    stack_name: stack.name.clone(),
                    operation: operation.to_string(),
                    elapsed_secs: started.elapsed().as_secs(),
                }
                .into());
            }

            tokio::time::sleep(self.options.poll_interval()).await;
        }
    }

    /// Fetches the newest page of the stack's event log.
    async fn fetch_events(
        &self,
        stack: &StackHandle,
    ) -> std::result::Result<Vec<StackEvent>, GatewayError> {
        let output: DescribeStackEventsOutput = call(
            self.gateway.as_ref(),
            CLOUDFORMATION,
            "describeStackEvents",
            DescribeStackEventsInput {
                stack_name: stack.id.clone(),
            },
        )
        .await?;

        Ok(output.stack_events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DeploymentFailed, StackPilotError};
    use crate::gateway::testing::ScriptedGateway;
    use chrono::DateTime;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;

    const STACK: &str = "new-service-dev";
    const ACTION: &str = "describeStackEvents";

    fn stack_event(id: &str, status: &str) -> Value {
        json!({
            "EventId": id,
            "StackName": STACK,
            "LogicalResourceId": STACK,
            "ResourceType": "AWS::CloudFormation::Stack",
            "ResourceStatus": status,
        })
    }

    fn stack_event_with_reason(id: &str, status: &str, reason: &str) -> Value {
        let mut event = stack_event(id, status);
        event["ResourceStatusReason"] = json!(reason);
        event
    }

    fn resource_event(id: &str, logical: &str, status: &str, reason: Option<&str>) -> Value {
        json!({
            "EventId": id,
            "StackName": STACK,
            "LogicalResourceId": logical,
            "ResourceType": "AWS::S3::Bucket",
            "ResourceStatus": status,
            "ResourceStatusReason": reason,
        })
    }

    fn nested_stack_event(id: &str, status: &str) -> Value {
        json!({
            "EventId": id,
            "StackName": STACK,
            "LogicalResourceId": "NestedStack",
            "ResourceType": "AWS::CloudFormation::Stack",
            "ResourceStatus": status,
        })
    }

    /// Scripts one response per poll; each response is newest first.
    fn gateway_with(polls: Vec<Vec<Value>>) -> Arc<ScriptedGateway> {
        let gateway = Arc::new(ScriptedGateway::new());
        for events in polls {
            gateway.push_ok(CLOUDFORMATION, ACTION, json!({ "StackEvents": events }));
        }
        gateway
    }

    fn options(verbose: bool, disable_rollback: bool) -> MonitorOptions {
        MonitorOptions::new(Duration::from_millis(1), verbose, disable_rollback, None)
            .expect("valid options")
    }

    fn target() -> MonitorTarget {
        MonitorTarget::Stack(StackHandle::new("arn:aws:cloudformation:stack/new-service-dev", STACK))
    }

    async fn run(
        gateway: &Arc<ScriptedGateway>,
        operation: OperationKind,
        options: MonitorOptions,
    ) -> Result<MonitorOutcome> {
        StackMonitor::new(gateway.clone(), options)
            .monitor(operation, &target())
            .await
    }

    fn stamped(mut event: Value, timestamp: DateTime<Utc>) -> Value {
        event["Timestamp"] = json!(timestamp.to_rfc3339());
        event
    }

    /// Event log of an update that finished an hour ago.
    fn previous_update() -> Vec<Value> {
        let earlier = Utc::now() - TimeDelta::hours(1);
        vec![
            stamped(stack_event("2", "UPDATE_COMPLETE"), earlier),
            stamped(stack_event("1", "UPDATE_IN_PROGRESS"), earlier),
        ]
    }

    fn deployment_failure(result: Result<MonitorOutcome>) -> DeploymentFailed {
        match result {
            Err(StackPilotError::Deployment(failure)) => failure,
            other => panic!("expected deployment failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_completes() {
        let gateway = gateway_with(vec![
            vec![stack_event("1", "CREATE_IN_PROGRESS")],
            vec![stack_event("2", "CREATE_COMPLETE"), stack_event("1", "CREATE_IN_PROGRESS")],
        ]);

        let outcome = run(&gateway, OperationKind::Create, options(false, false))
            .await
            .expect("create should complete");

        assert_eq!(outcome, MonitorOutcome::Completed(String::from("CREATE_COMPLETE")));
        let calls = gateway.calls_to(ACTION);
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[0].params["StackName"],
            "arn:aws:cloudformation:stack/new-service-dev"
        );
    }

    #[tokio::test]
    async fn test_update_completes_through_cleanup() {
        let gateway = gateway_with(vec![
            vec![stack_event("1", "UPDATE_IN_PROGRESS")],
            vec![
                stack_event("2", "UPDATE_COMPLETE_CLEANUP_IN_PROGRESS"),
                stack_event("1", "UPDATE_IN_PROGRESS"),
            ],
            vec![
                stack_event("3", "UPDATE_COMPLETE"),
                stack_event("2", "UPDATE_COMPLETE_CLEANUP_IN_PROGRESS"),
                stack_event("1", "UPDATE_IN_PROGRESS"),
            ],
        ]);

        let outcome = run(&gateway, OperationKind::Update, options(false, false))
            .await
            .expect("update should complete");

        assert_eq!(outcome.status(), Some("UPDATE_COMPLETE"));
        assert_eq!(gateway.calls_to(ACTION).len(), 3);
    }

    #[tokio::test]
    async fn test_delete_completes_when_stack_vanishes() {
        let gateway = gateway_with(vec![vec![stack_event("1", "DELETE_IN_PROGRESS")]]);
        gateway.push_err(
            CLOUDFORMATION,
            ACTION,
            GatewayError::provider(400, "Stack new-service-dev does not exist"),
        );

        let outcome = run(&gateway, OperationKind::Delete, options(false, false))
            .await
            .expect("vanished stack means deleted");

        assert_eq!(outcome.status(), Some("DELETE_COMPLETE"));
        assert_eq!(gateway.calls_to(ACTION).len(), 2);
    }

    #[tokio::test]
    async fn test_delete_propagates_other_errors() {
        let gateway = Arc::new(ScriptedGateway::new());
        gateway.push_err(CLOUDFORMATION, ACTION, GatewayError::new("socket hang up"));

        let err = run(&gateway, OperationKind::Delete, options(false, false))
            .await
            .expect_err("must fail");

        assert!(matches!(err, StackPilotError::Gateway(_)));
        assert_eq!(gateway.calls_to(ACTION).len(), 1);
    }

    #[tokio::test]
    async fn test_delete_propagates_other_missing_resources() {
        let gateway = gateway_with(vec![vec![stack_event("1", "DELETE_IN_PROGRESS")]]);
        gateway.push_err(
            CLOUDFORMATION,
            ACTION,
            GatewayError::provider(400, "Role arn:aws:iam::123:role/cfn does not exist"),
        );

        let err = run(&gateway, OperationKind::Delete, options(false, false))
            .await
            .expect_err("only a missing stack means deleted");

        assert!(matches!(err, StackPilotError::Gateway(_)));
    }

    #[tokio::test]
    async fn test_missing_stack_during_create_is_an_error() {
        let gateway = Arc::new(ScriptedGateway::new());
        gateway.push_err(
            CLOUDFORMATION,
            ACTION,
            GatewayError::provider(400, "Stack new-service-dev does not exist"),
        );

        let err = run(&gateway, OperationKind::Create, options(false, false))
            .await
            .expect_err("must fail");

        assert!(matches!(err, StackPilotError::Gateway(_)));
    }

    #[tokio::test]
    async fn test_resource_failure_reported_before_stack_reason() {
        let gateway = gateway_with(vec![
            vec![stack_event("1", "CREATE_IN_PROGRESS")],
            vec![
                resource_event("3", "myBucket", "CREATE_FAILED", Some("Bucket already exists")),
                stack_event("2", "CREATE_IN_PROGRESS"),
                stack_event("1", "CREATE_IN_PROGRESS"),
            ],
        ]);

        let result = run(&gateway, OperationKind::Create, options(false, false)).await;
        let failure = deployment_failure(result);

        assert_eq!(failure.resource_id, "myBucket");
        assert_eq!(failure.reason, "Bucket already exists");
        assert_eq!(
            failure.to_string(),
            "An error occurred: myBucket - Bucket already exists."
        );
        assert_eq!(gateway.calls_to(ACTION).len(), 2);
    }

    #[tokio::test]
    async fn test_verbose_waits_for_rollback_complete() {
        let history = vec![
            vec![stack_event("1", "CREATE_IN_PROGRESS")],
            vec![
                resource_event("2", "myBucket", "CREATE_FAILED", Some("Bucket already exists")),
                stack_event("1", "CREATE_IN_PROGRESS"),
            ],
            vec![
                stack_event_with_reason(
                    "3",
                    "ROLLBACK_IN_PROGRESS",
                    "The following resource(s) failed to create: [myBucket].",
                ),
                resource_event("2", "myBucket", "CREATE_FAILED", Some("Bucket already exists")),
                stack_event("1", "CREATE_IN_PROGRESS"),
            ],
            vec![
                stack_event("4", "ROLLBACK_COMPLETE"),
                stack_event_with_reason("3", "ROLLBACK_IN_PROGRESS", "Resource creation cancelled"),
                resource_event("2", "myBucket", "CREATE_FAILED", Some("Bucket already exists")),
                stack_event("1", "CREATE_IN_PROGRESS"),
            ],
        ];

        let quiet = gateway_with(history.clone());
        let quiet_failure =
            deployment_failure(run(&quiet, OperationKind::Create, options(false, false)).await);

        let verbose = gateway_with(history);
        let verbose_failure =
            deployment_failure(run(&verbose, OperationKind::Create, options(true, false)).await);

        assert_eq!(quiet_failure, verbose_failure);
        assert_eq!(verbose_failure.resource_id, "myBucket");
        assert_eq!(quiet.calls_to(ACTION).len(), 2);
        assert_eq!(verbose.calls_to(ACTION).len(), 4);
    }

    #[tokio::test]
    async fn test_verbose_with_disabled_rollback_stops_at_create_failed() {
        let gateway = gateway_with(vec![
            vec![stack_event("1", "CREATE_IN_PROGRESS")],
            vec![resource_event("2", "myBucket", "CREATE_FAILED", Some("Access Denied"))],
            vec![stack_event("3", "CREATE_FAILED")],
        ]);

        let failure =
            deployment_failure(run(&gateway, OperationKind::Create, options(true, true)).await);

        assert_eq!(failure.resource_id, "myBucket");
        assert_eq!(failure.reason, "Access Denied");
        assert_eq!(gateway.calls_to(ACTION).len(), 3);
    }

    #[tokio::test]
    async fn test_verbose_create_ending_in_delete_complete_fails() {
        let gateway = gateway_with(vec![
            vec![stack_event("1", "CREATE_IN_PROGRESS")],
            vec![resource_event("2", "myBucket", "CREATE_FAILED", Some("Bucket already exists"))],
            vec![stack_event("3", "DELETE_IN_PROGRESS")],
            vec![stack_event("4", "DELETE_COMPLETE")],
        ]);

        let failure =
            deployment_failure(run(&gateway, OperationKind::Create, options(true, false)).await);

        assert_eq!(failure.reason, "Bucket already exists");
        assert_eq!(gateway.calls_to(ACTION).len(), 4);
    }

    #[tokio::test]
    async fn test_stack_delete_during_create_uses_its_reason() {
        let gateway = gateway_with(vec![
            vec![stack_event("1", "CREATE_IN_PROGRESS")],
            vec![stack_event_with_reason(
                "2",
                "DELETE_IN_PROGRESS",
                "User Initiated",
            )],
        ]);

        let failure =
            deployment_failure(run(&gateway, OperationKind::Create, options(false, false)).await);

        assert_eq!(failure.resource_id, STACK);
        assert_eq!(failure.reason, "User Initiated");
    }

    #[tokio::test]
    async fn test_resource_delete_during_update_is_not_a_failure() {
        let gateway = gateway_with(vec![
            vec![stack_event("1", "UPDATE_IN_PROGRESS")],
            vec![
                resource_event("3", "myBucket", "DELETE_COMPLETE", None),
                resource_event("2", "myBucket", "DELETE_IN_PROGRESS", None),
            ],
            vec![stack_event("4", "UPDATE_COMPLETE")],
        ]);

        let outcome = run(&gateway, OperationKind::Update, options(false, false))
            .await
            .expect("replacement is not a failure");

        assert_eq!(outcome.status(), Some("UPDATE_COMPLETE"));
    }

    #[tokio::test]
    async fn test_update_rollback_without_reason_uses_status() {
        let gateway = gateway_with(vec![
            vec![stack_event("1", "UPDATE_IN_PROGRESS")],
            vec![stack_event("2", "UPDATE_ROLLBACK_IN_PROGRESS")],
        ]);

        let err = run(&gateway, OperationKind::Update, options(false, false))
            .await
            .expect_err("rollback is a failure");

        assert_eq!(
            err.to_string(),
            "An error occurred: new-service-dev - UPDATE_ROLLBACK_IN_PROGRESS."
        );
    }

    #[tokio::test]
    async fn test_nested_stack_completion_is_ignored() {
        let gateway = gateway_with(vec![
            vec![stack_event("1", "CREATE_IN_PROGRESS")],
            vec![nested_stack_event("2", "CREATE_COMPLETE")],
            vec![stack_event("3", "CREATE_COMPLETE")],
        ]);

        let outcome = run(&gateway, OperationKind::Create, options(false, false))
            .await
            .expect("create should complete");

        assert_eq!(outcome.status(), Some("CREATE_COMPLETE"));
        assert_eq!(gateway.calls_to(ACTION).len(), 3);
    }

    #[tokio::test]
    async fn test_full_history_processed_from_start_event() {
        let gateway = gateway_with(vec![vec![
            stack_event("6", "UPDATE_COMPLETE"),
            resource_event("5", "myBucket", "UPDATE_COMPLETE", None),
            stack_event("4", "UPDATE_IN_PROGRESS"),
            stack_event("3", "UPDATE_ROLLBACK_COMPLETE"),
            resource_event("2", "oldBucket", "UPDATE_FAILED", Some("old failure")),
            stack_event("1", "UPDATE_IN_PROGRESS"),
        ]]);

        let outcome = run(&gateway, OperationKind::Update, options(false, false))
            .await
            .expect("earlier failures belong to a previous update");

        assert_eq!(outcome.status(), Some("UPDATE_COMPLETE"));
        assert_eq!(gateway.calls_to(ACTION).len(), 1);
    }

    #[tokio::test]
    async fn test_previous_operation_ending_is_not_reported() {
        let now = Utc::now();
        let mut current = vec![
            stamped(stack_event("4", "UPDATE_COMPLETE"), now),
            stamped(stack_event("3", "UPDATE_IN_PROGRESS"), now),
        ];
        current.extend(previous_update());
        let gateway = gateway_with(vec![previous_update(), current]);

        let outcome = run(&gateway, OperationKind::Update, options(false, false))
            .await
            .expect("update should complete");

        assert_eq!(outcome.status(), Some("UPDATE_COMPLETE"));
        assert_eq!(gateway.calls_to(ACTION).len(), 2);
    }

    #[tokio::test]
    async fn test_previous_operation_failure_is_not_reported() {
        let earlier = Utc::now() - TimeDelta::hours(1);
        let old_failure = vec![
            stamped(stack_event("3", "UPDATE_ROLLBACK_COMPLETE"), earlier),
            stamped(
                resource_event("2", "oldBucket", "UPDATE_FAILED", Some("old failure")),
                earlier,
            ),
            stamped(stack_event("1", "UPDATE_IN_PROGRESS"), earlier),
        ];
        let mut current = vec![
            stamped(stack_event("5", "UPDATE_COMPLETE"), Utc::now()),
            stamped(stack_event("4", "UPDATE_IN_PROGRESS"), Utc::now()),
        ];
        current.extend(old_failure.clone());
        let gateway = gateway_with(vec![old_failure, current]);

        let outcome = run(&gateway, OperationKind::Update, options(false, false))
            .await
            .expect("old rollback belongs to a previous update");

        assert_eq!(outcome.status(), Some("UPDATE_COMPLETE"));
        assert_eq!(gateway.calls_to(ACTION).len(), 2);
    }

    #[tokio::test]
    async fn test_attach_follows_operation_already_in_flight() {
        let started = Utc::now() - TimeDelta::minutes(10);
        let gateway = gateway_with(vec![
            vec![stamped(stack_event("1", "UPDATE_IN_PROGRESS"), started)],
            vec![
                stamped(stack_event("2", "UPDATE_COMPLETE"), Utc::now()),
                stamped(stack_event("1", "UPDATE_IN_PROGRESS"), started),
            ],
        ]);

        let outcome = StackMonitor::new(gateway.clone(), options(false, false))
            .attach(OperationKind::Update, &target())
            .await
            .expect("attached update should complete");

        assert_eq!(outcome.status(), Some("UPDATE_COMPLETE"));
        assert_eq!(gateway.calls_to(ACTION).len(), 2);
    }

    #[tokio::test]
    async fn test_event_without_status_keeps_polling() {
        let gateway = gateway_with(vec![
            vec![json!({
                "EventId": "1",
                "StackName": STACK,
                "LogicalResourceId": "myBucket",
                "ResourceType": "AWS::S3::Bucket",
            })],
            vec![stack_event("2", "CREATE_IN_PROGRESS")],
            vec![stack_event("3", "CREATE_COMPLETE")],
        ]);

        let outcome = run(&gateway, OperationKind::Create, options(false, false))
            .await
            .expect("create should complete");

        assert_eq!(outcome.status(), Some("CREATE_COMPLETE"));
        assert_eq!(gateway.calls_to(ACTION).len(), 3);
    }

    #[tokio::test]
    async fn test_already_settled_issues_no_request() {
        let gateway = Arc::new(ScriptedGateway::new());

        let outcome = StackMonitor::new(gateway.clone(), options(false, false))
            .monitor(OperationKind::Create, &MonitorTarget::AlreadySettled)
            .await
            .expect("skip");

        assert_eq!(outcome, MonitorOutcome::Skipped);
        assert!(outcome.status().is_none());
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_timeout_between_polls() {
        let gateway = gateway_with(vec![
            vec![stack_event("1", "CREATE_IN_PROGRESS")],
            vec![stack_event("1", "CREATE_IN_PROGRESS")],
            vec![stack_event("1", "CREATE_IN_PROGRESS")],
        ]);
        let options = MonitorOptions::new(
            Duration::from_millis(1),
            false,
            false,
            Some(Duration::from_millis(1)),
        )
        .expect("valid options");

        let monitor = StackMonitor::new(gateway.clone(), options);
        assert_eq!(monitor.options().timeout(), Some(Duration::from_millis(1)));

        let err = monitor
            .monitor(OperationKind::Create, &target())
            .await
            .expect_err("must time out");

        assert!(matches!(
            err,
            StackPilotError::Monitor(MonitorError::Timeout { .. })
        ));
        assert!(gateway.calls_to(ACTION).len() <= 2);
    }
}
