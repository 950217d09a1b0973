//! Stack operation monitoring.
//!
//! This module handles:
//! - Describing the operation to watch (kind, stack identity, options)
//! - Tracking which events belong to the operation
//! - Polling until the stack settles, fails or the timeout elapses

mod cursor;
mod options;
mod stack;

pub use cursor::{CapturedFailure, MonitorCursor, Verdict};
pub use options::{MonitorOptions, MonitorTarget, OperationKind, StackHandle};
pub use stack::{MonitorOutcome, StackMonitor, CLOCK_SKEW_SECS};
