//! # Driver Error Taxonomy
//!
//! All fallible APIs in this crate return `eyre::Result`. Errors that a
//! caller may need to distinguish programmatically carry a typed
//! [`DriverError`] payload inside the report; recover it with
//! `report.downcast_ref::<DriverError>()`.
//!
//! Transport and protocol errors raised by the query-execution collaborator
//! are passed through unchanged and never wrapped in a `DriverError`.

use std::fmt;

/// Errors originating in the statement-processing core itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// Unterminated string/comment/dollar-quote, unbalanced parentheses,
    /// or an operator the connected server is too old to accept. Fatal to
    /// the call that triggered it; no unit of the batch executes.
    Lexical { message: String, position: usize },
    /// Malformed `{...}` escape clause. Surfaced before any network round
    /// trip.
    EscapeSyntax { message: String, position: usize },
    /// `execute_update` on a batch in which some unit produces rows.
    NotAnUpdate,
    /// Any accessor called after `close()`.
    StatementClosed,
    /// The query-timeout scheduler cancelled this execution.
    Cancelled,
}

impl DriverError {
    pub fn lexical(message: impl Into<String>, position: usize) -> Self {
        DriverError::Lexical {
            message: message.into(),
            position,
        }
    }

    pub fn escape_syntax(message: impl Into<String>, position: usize) -> Self {
        DriverError::EscapeSyntax {
            message: message.into(),
            position,
        }
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverError::Lexical { message, position } => {
                write!(f, "lexical error at byte {}: {}", position, message)
            }
            DriverError::EscapeSyntax { message, position } => {
                write!(f, "escape syntax error at byte {}: {}", position, message)
            }
            DriverError::NotAnUpdate => {
                write!(f, "statement produces a result set; not an update")
            }
            DriverError::StatementClosed => write!(f, "statement is closed"),
            DriverError::Cancelled => write!(f, "execution cancelled by query timeout"),
        }
    }
}

impl std::error::Error for DriverError {}

/// True when `report` carries the given driver error kind. Convenience for
/// callers (and tests) that only care about the variant.
pub fn is_driver_error(report: &eyre::Report, matcher: fn(&DriverError) -> bool) -> bool {
    report.downcast_ref::<DriverError>().is_some_and(matcher)
}
