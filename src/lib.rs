// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Stackpilot
//!
//! Change-set planning and stack operation monitoring for `CloudFormation`.
//!
//! ## Overview
//!
//! Stackpilot drives the two long-running halves of a stack deployment:
//!
//! - Previewing a deployment through a short-lived change set, without
//!   executing it, and cleaning up everything the preview created
//! - Following an in-flight create, update or delete through the stack event
//!   log until it settles, surfacing the first real failure reason
//!
//! ## Architecture
//!
//! Every remote call goes through a single request gateway:
//!
//! 1. **Gateway**: `request(service, action, params)`, backed by the AWS SDK
//! 2. **Monitor**: polls `describeStackEvents` with a cursor over the event log
//! 3. **Planner**: package, detect changes, upload, create, wait, describe, diff
//!
//! ## Modules
//!
//! - [`config`]: Configuration parsing, validation and naming
//! - [`gateway`]: Remote request gateway and pagination
//! - [`monitor`]: Stack operation monitor
//! - [`planner`]: Change-set planner
//! - [`classify`]: Error and status message classification
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! service: billing
//! stage: prod
//! region: eu-west-1
//!
//! provider:
//!   stack_tags:
//!     TEAM: payments
//!
//! monitor:
//!   verbose: true
//!   timeout_secs: 3600
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod classify;
pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod monitor;
pub mod planner;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, ConfigValidator, DeployConfig, Naming, TemplateHasher};
pub use error::{Result, StackPilotError};
pub use gateway::{AwsGateway, RemoteGateway, SharedGateway};
pub use monitor::{MonitorOptions, MonitorOutcome, MonitorTarget, OperationKind, StackMonitor};
pub use planner::{ChangeSetPlanner, DiffEngine, PlanOutcome, PlanReport};
