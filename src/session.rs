//! # Session Contracts
//!
//! Narrow contracts between the statement-processing core and its
//! collaborators: the query-execution backend that owns the wire protocol,
//! and the connection/session provider that reports server capabilities.
//!
//! The core never opens sockets or frames protocol messages. It hands each
//! translated statement unit to a [`QueryExecutor`] and interprets the
//! outcome; everything below `submit` is someone else's problem.

use eyre::Result;

/// Server version reported by the connection at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerVersion {
    pub major: u16,
    pub minor: u16,
}

impl ServerVersion {
    pub fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    pub fn is_at_least(&self, major: u16, minor: u16) -> bool {
        (self.major, self.minor) >= (major, minor)
    }
}

/// Capability flags the core consults before accepting certain syntax.
#[derive(Debug, Clone, Copy)]
pub struct SessionInfo {
    pub server_version: ServerVersion,
}

impl SessionInfo {
    pub fn new(server_version: ServerVersion) -> Self {
        Self { server_version }
    }

    /// JSON containment operators (`??`, `?|`, `?&`) require server 9.4.
    pub fn accepts_json_operators(&self) -> bool {
        self.server_version.is_at_least(9, 4)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OwnedValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub values: Vec<OwnedValue>,
}

/// Fully materialized result rows for one row-producing statement unit.
#[derive(Debug, Clone, PartialEq)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

/// One statement unit resolves to rows or to an update count, never both.
/// DDL and other no-count statements report `Count(0)`.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecOutcome {
    Rows(RowSet),
    Count(u64),
}

impl ExecOutcome {
    pub fn is_rows(&self) -> bool {
        matches!(self, ExecOutcome::Rows(_))
    }
}

/// Asynchronous server notice attached to a statement execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub code: String,
    pub message: String,
}

/// What the backend hands back for one submitted statement unit.
#[derive(Debug, Clone)]
pub struct Submission {
    pub outcome: ExecOutcome,
    pub notices: Vec<Notice>,
}

/// The query-execution collaborator. `submit` blocks until the unit
/// completes; `cancel` is called out-of-band (from the timeout scheduler's
/// timer thread) and must interrupt an in-flight `submit`, which then
/// returns the cancellation as its error outcome.
pub trait QueryExecutor: Send + Sync {
    fn submit(&self, sql: &str, param_count: usize) -> Result<Submission>;

    fn cancel(&self);
}
