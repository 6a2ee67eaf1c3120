//! # pglink - PostgreSQL Client Statement Core
//!
//! pglink is the statement-processing core of a PostgreSQL client: the
//! layer between a caller's raw SQL string and the wire protocol. It owns
//! the only non-trivial reasoning in the client -- lexical state machines,
//! recursive escape translation, and a cancellation race -- and treats
//! everything else (transport, framing, codecs, row materialization) as a
//! collaborator behind a narrow trait.
//!
//! ## What happens to one SQL string
//!
//! ```text
//! "SELECT {fn user()}; UPDATE t SET i=1"
//!     │
//!     ▼
//! ┌─────────────────────────────────────────────────────┐
//! │ 1. SCAN: covering spans, paren depth, placeholders  │
//! │    sql::lexer -- quoting/comment/escape aware       │
//! └─────────────────────────────────────────────────────┘
//!     │
//!     ▼
//! ┌─────────────────────────────────────────────────────┐
//! │ 2. SPLIT: top-level semicolons only                 │
//! │    sql::splitter -- rule bodies stay whole          │
//! └─────────────────────────────────────────────────────┘
//!     │
//!     ▼
//! ┌─────────────────────────────────────────────────────┐
//! │ 3. TRANSLATE: {fn ...}/{d ...}/{oj ...} -> native   │
//! │    sql::escape -- nested clauses resolve inside-out │
//! └─────────────────────────────────────────────────────┘
//!     │
//!     ▼
//! ┌─────────────────────────────────────────────────────┐
//! │ 4. EXECUTE: one unit at a time, results multiplexed │
//! │    statement -- timer-armed when a timeout is set   │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use pglink::{ServerVersion, SessionInfo, Statement};
//!
//! let mut stmt = Statement::new(executor, SessionInfo::new(ServerVersion::new(14, 0)));
//! if stmt.execute("SELECT 1; UPDATE t SET i = 1; SELECT 2")? {
//!     let rows = stmt.result_set()?.unwrap();
//!     // ...
//! }
//! while stmt.get_more_results()? || stmt.update_count()? != -1 {
//!     // walk the remaining results
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`sql`]: lexer, statement splitter, escape-clause translator
//! - [`statement`]: execution driver and query-timeout scheduler
//! - [`session`]: collaborator contracts (executor trait, capability flags)
//! - [`error`]: the typed driver error taxonomy

pub mod error;
pub mod session;
pub mod sql;
pub mod statement;

pub use error::DriverError;
pub use session::{
    ExecOutcome, Notice, OwnedValue, QueryExecutor, Row, RowSet, ServerVersion, SessionInfo,
    Submission,
};
pub use sql::{prepare_statements, SqlOptions, StatementUnit};
pub use statement::Statement;
