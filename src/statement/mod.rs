//! # Statement Execution Driver
//!
//! The driver-facing statement object: accepts one raw SQL string per
//! `execute` call, runs it through the lexer/splitter/escape pipeline, and
//! executes the resulting units in order against the query-execution
//! collaborator, exposing the multiplexed JDBC-style view of the results.
//!
//! ## Result Multiplexing
//!
//! One `execute` call buffers one outcome per statement unit -- a row set
//! XOR an update count. A single cursor walks the queue:
//!
//! ```text
//! Idle ──execute──▶ Active(0) ──get_more_results──▶ Active(1) ── ... ──▶ Exhausted
//! ```
//!
//! `result_set()` and `update_count()` report the current item only;
//! after exhaustion `update_count()` is `-1` permanently. Executing an
//! empty (or all-comment) string is legal and leaves both accessors
//! reporting absence.
//!
//! ## Timeouts
//!
//! With a query timeout configured, every unit execution arms a
//! generation-bound timer ([`timeout::ArmedTimer`]); completion advances
//! the shared generation before disarming, so a late-firing timer can
//! never cancel a later execution.
//!
//! ## Lifecycle
//!
//! `close()` is idempotent; every other method on a closed statement
//! fails with `DriverError::StatementClosed`. Warnings accumulate per
//! statement and are cleared at the start of each new `execute` call.

pub(crate) mod timeout;

use crate::error::DriverError;
use crate::session::{ExecOutcome, Notice, QueryExecutor, RowSet, SessionInfo};
use crate::sql::{prepare_statements, SqlOptions, StatementUnit};
use eyre::{bail, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use timeout::ArmedTimer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    Idle,
    Active(usize),
    Exhausted,
}

/// One client statement object over a shared session.
pub struct Statement<E: QueryExecutor + ?Sized + 'static> {
    executor: Arc<E>,
    options: SqlOptions,
    escape_processing: bool,
    timeout: Duration,
    /// Generation counter shared with armed timers; equals the in-flight
    /// execution's token exactly while that execution runs.
    active: Arc<AtomicU64>,
    results: Vec<ExecOutcome>,
    cursor: Cursor,
    warnings: Vec<Notice>,
    closed: bool,
}

impl<E: QueryExecutor + ?Sized + 'static> Statement<E> {
    pub fn new(executor: Arc<E>, session: SessionInfo) -> Self {
        Self {
            executor,
            options: SqlOptions::from(&session),
            escape_processing: true,
            timeout: Duration::ZERO,
            active: Arc::new(AtomicU64::new(0)),
            results: Vec::new(),
            cursor: Cursor::Idle,
            warnings: Vec::new(),
            closed: false,
        }
    }

    /// Execute a (possibly multi-statement) SQL string. Returns `true`
    /// iff the first buffered result is a row set.
    pub fn execute(&mut self, sql: &str) -> Result<bool> {
        self.ensure_open()?;
        self.warnings.clear();
        self.results.clear();
        self.cursor = Cursor::Idle;

        let units = prepare_statements(sql, &self.options, self.escape_processing)?;
        let mut outcomes = Vec::with_capacity(units.len());
        for unit in &units {
            outcomes.push(self.run_unit(unit)?);
        }

        let first_is_rows = outcomes.first().map(ExecOutcome::is_rows).unwrap_or(false);
        self.cursor = if outcomes.is_empty() {
            Cursor::Exhausted
        } else {
            Cursor::Active(0)
        };
        self.results = outcomes;
        Ok(first_is_rows)
    }

    /// Execute and require the first result to be a row set.
    pub fn execute_query(&mut self, sql: &str) -> Result<RowSet> {
        let has_rows = self.execute(sql)?;
        if !has_rows {
            bail!("query produced no result set");
        }
        match self.results.first() {
            Some(ExecOutcome::Rows(rows)) => Ok(rows.clone()),
            _ => bail!("query produced no result set"),
        }
    }

    /// Execute and require every unit to be a non-row-producing statement.
    /// Returns the first unit's update count (0 for DDL and empty input).
    pub fn execute_update(&mut self, sql: &str) -> Result<i64> {
        self.execute(sql)?;
        if self.results.iter().any(ExecOutcome::is_rows) {
            self.results.clear();
            self.cursor = Cursor::Exhausted;
            return Err(DriverError::NotAnUpdate.into());
        }
        Ok(match self.results.first() {
            Some(&ExecOutcome::Count(count)) => count as i64,
            _ => 0,
        })
    }

    /// The current result's row set, or `None` when the current result is
    /// an update count or the queue is exhausted.
    pub fn result_set(&self) -> Result<Option<&RowSet>> {
        self.ensure_open()?;
        Ok(match self.cursor {
            Cursor::Active(index) => match &self.results[index] {
                ExecOutcome::Rows(rows) => Some(rows),
                ExecOutcome::Count(_) => None,
            },
            _ => None,
        })
    }

    /// The current result's update count, or `-1` when the current result
    /// is a row set or the queue is exhausted.
    pub fn update_count(&self) -> Result<i64> {
        self.ensure_open()?;
        Ok(match self.cursor {
            Cursor::Active(index) => match self.results[index] {
                ExecOutcome::Count(count) => count as i64,
                ExecOutcome::Rows(_) => -1,
            },
            _ => -1,
        })
    }

    /// Advance to the next buffered result. Returns whether the new
    /// current item is a row set; past the last item the statement is
    /// exhausted and every later call returns `false`.
    pub fn get_more_results(&mut self) -> Result<bool> {
        self.ensure_open()?;
        match self.cursor {
            Cursor::Active(index) if index + 1 < self.results.len() => {
                self.cursor = Cursor::Active(index + 1);
                Ok(self.results[index + 1].is_rows())
            }
            _ => {
                self.cursor = Cursor::Exhausted;
                Ok(false)
            }
        }
    }

    /// Server notices accumulated since the last `execute` call.
    pub fn warnings(&self) -> Result<&[Notice]> {
        self.ensure_open()?;
        Ok(&self.warnings)
    }

    /// A timeout of zero (the default) disables cancellation entirely.
    pub fn set_query_timeout(&mut self, seconds: u64) -> Result<()> {
        self.set_query_timeout_duration(Duration::from_secs(seconds))
    }

    pub fn set_query_timeout_duration(&mut self, timeout: Duration) -> Result<()> {
        self.ensure_open()?;
        self.timeout = timeout;
        Ok(())
    }

    pub fn query_timeout(&self) -> Result<Duration> {
        self.ensure_open()?;
        Ok(self.timeout)
    }

    /// When disabled, `{...}` clauses pass to the server verbatim.
    pub fn set_escape_processing(&mut self, enabled: bool) -> Result<()> {
        self.ensure_open()?;
        self.escape_processing = enabled;
        Ok(())
    }

    /// Idempotent. No timer can fire against a closed statement: timers
    /// are scoped to `run_unit`, and the generation advance below
    /// invalidates any comparison a stale thread could still attempt.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.active.fetch_add(1, Ordering::SeqCst);
        self.results.clear();
        self.warnings.clear();
        self.cursor = Cursor::Exhausted;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(DriverError::StatementClosed.into());
        }
        Ok(())
    }

    fn run_unit(&mut self, unit: &StatementUnit) -> Result<ExecOutcome> {
        let generation = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        let mut timer = (!self.timeout.is_zero()).then(|| {
            ArmedTimer::arm(
                Arc::clone(&self.executor),
                Arc::clone(&self.active),
                generation,
                self.timeout,
            )
        });

        let result = self.executor.submit(&unit.sql, unit.param_count);

        // invalidate the token before the timer can compare against it
        self.active.fetch_add(1, Ordering::SeqCst);
        if let Some(timer) = timer.as_mut() {
            timer.disarm();
        }

        let submission = result?;
        self.warnings.extend(submission.notices);
        Ok(submission.outcome)
    }
}

impl<E: QueryExecutor + ?Sized + 'static> Drop for Statement<E> {
    fn drop(&mut self) {
        self.close();
    }
}
