//! Classification of control-plane messages.
//!
//! The control plane reports "stack missing" and "empty change set" only as
//! free-form message text. All matching on that text lives here so callers
//! work with [`ErrorClass`] and never inspect messages themselves.

use crate::error::GatewayError;

/// Phrase used by the control plane when a stack cannot be found.
const STACK_MISSING_PHRASE: &str = "does not exist";

/// Subject that starts a stack-missing clause.
const STACK_SUBJECT: &str = "Stack";

/// Phrases used when a change set compiled to an empty diff.
const NO_CHANGES_PHRASES: &[&str] = &["didn't contain changes", "No updates are to be performed"];

/// HTTP status treated as "nothing there yet".
const NOT_FOUND_STATUS: u16 = 404;

/// Classification of an error or status reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The target stack does not exist.
    StackMissing,
    /// A change set contained no changes.
    NoChanges,
    /// A listing or describe call found nothing (404).
    NotFound,
    /// Anything else.
    Unclassified,
}

/// Returns true if the clause saying "does not exist" is about a stack.
///
/// Matches `Stack with id X does not exist`, `Stack [X] does not exist` and
/// `Stack X does not exist`, but not e.g. `S3 error: The specified key does
/// not exist.`
fn names_missing_stack(message: &str) -> bool {
    let Some(end) = message.find(STACK_MISSING_PHRASE) else {
        return false;
    };

    let before = &message[..end];
    let clause_start = [". ", ": "]
        .iter()
        .filter_map(|sep| before.rfind(sep).map(|i| i + sep.len()))
        .max()
        .unwrap_or(0);

    let clause = before[clause_start..].trim_start();
    clause
        .strip_prefix(STACK_SUBJECT)
        .is_some_and(|rest| rest.starts_with([' ', '[', ':']))
}

/// Classifies a free-form message.
#[must_use]
pub fn classify_message(message: &str) -> ErrorClass {
    if names_missing_stack(message) {
        ErrorClass::StackMissing
    } else if NO_CHANGES_PHRASES.iter().any(|p| message.contains(p)) {
        ErrorClass::NoChanges
    } else {
        ErrorClass::Unclassified
    }
}

/// Classifies a gateway error, giving a 404 status precedence over the message.
#[must_use]
pub fn classify_error(err: &GatewayError) -> ErrorClass {
    if err.status_code() == Some(NOT_FOUND_STATUS) {
        return ErrorClass::NotFound;
    }
    classify_message(&err.message)
}

/// Returns true if the error says the stack does not exist.
#[must_use]
pub fn is_stack_missing(err: &GatewayError) -> bool {
    classify_message(&err.message) == ErrorClass::StackMissing
}

/// Returns true if the error means "not deployed yet" for listing-style calls.
#[must_use]
pub fn is_not_found(err: &GatewayError) -> bool {
    classify_error(err) == ErrorClass::NotFound
}

/// Returns true if a change-set status reason means it compiled to no changes.
#[must_use]
pub fn is_empty_change_set(reason: &str) -> bool {
    classify_message(reason) == ErrorClass::NoChanges
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_missing_message() {
        let err = GatewayError::provider(400, "Stack with id new-service-dev does not exist");
        assert!(is_stack_missing(&err));
        assert_eq!(classify_error(&err), ErrorClass::StackMissing);
    }

    #[test]
    fn test_stack_missing_formats() {
        assert!(is_stack_missing(&GatewayError::provider(400, "Stack [svc-dev] does not exist")));
        assert!(is_stack_missing(&GatewayError::provider(
            400,
            "ValidationError: Stack with id arn:aws:cloudformation:us-east-1:123:stack/svc-dev/1 does not exist"
        )));
        assert!(is_stack_missing(&GatewayError::new("Stack svc-dev does not exist")));
    }

    #[test]
    fn test_other_missing_things_are_not_stacks() {
        let key = GatewayError::provider(400, "S3 error: The specified key does not exist.");
        assert!(!is_stack_missing(&key));
        assert_eq!(classify_error(&key), ErrorClass::Unclassified);

        assert!(!is_stack_missing(&GatewayError::provider(
            400,
            "Role arn:aws:iam::123:role/cfn does not exist"
        )));
        assert!(!is_stack_missing(&GatewayError::provider(
            400,
            "StackSet my-set does not exist"
        )));
    }

    #[test]
    fn test_not_found_status_wins() {
        let err = GatewayError::provider(404, "The specified bucket does not exist");
        assert_eq!(classify_error(&err), ErrorClass::NotFound);
        assert!(is_not_found(&err));
    }

    #[test]
    fn test_empty_change_set_reasons() {
        assert!(is_empty_change_set(
            "The submitted information didn't contain changes. Submit different information to create a change set."
        ));
        assert!(is_empty_change_set("No updates are to be performed."));
        assert!(!is_empty_change_set("Template format error: unsupported structure"));
    }

    #[test]
    fn test_unclassified() {
        assert_eq!(classify_message("Rate exceeded"), ErrorClass::Unclassified);
        assert!(!is_not_found(&GatewayError::new("socket hang up")));
    }
}
