//! Integration tests for query-timeout cancellation, including the
//! disable race: a timer armed for one execution must never cancel a
//! later execution, even after the timeout has been turned off.

use eyre::Result;
use parking_lot::{Condvar, Mutex};
use pglink::{
    DriverError, ExecOutcome, QueryExecutor, ServerVersion, SessionInfo, Statement, Submission,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Backend whose queries are literal sleeps: `sleep <ms>` blocks for
/// that many milliseconds unless `cancel` interrupts it first.
struct SleepingBackend {
    cancelled: Mutex<bool>,
    signal: Condvar,
}

impl SleepingBackend {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            cancelled: Mutex::new(false),
            signal: Condvar::new(),
        })
    }
}

impl QueryExecutor for SleepingBackend {
    fn submit(&self, sql: &str, _param_count: usize) -> Result<Submission> {
        let millis: u64 = sql
            .strip_prefix("sleep ")
            .and_then(|rest| rest.trim().parse().ok())
            .unwrap_or(0);
        let deadline = Instant::now() + Duration::from_millis(millis);

        let mut cancelled = self.cancelled.lock();
        *cancelled = false;
        while !*cancelled {
            if self.signal.wait_until(&mut cancelled, deadline).timed_out() {
                break;
            }
        }
        if *cancelled {
            return Err(DriverError::Cancelled.into());
        }
        Ok(Submission {
            outcome: ExecOutcome::Count(0),
            notices: Vec::new(),
        })
    }

    fn cancel(&self) {
        let mut cancelled = self.cancelled.lock();
        *cancelled = true;
        self.signal.notify_all();
    }
}

fn statement(backend: &Arc<SleepingBackend>) -> Statement<SleepingBackend> {
    Statement::new(
        Arc::clone(backend),
        SessionInfo::new(ServerVersion::new(14, 0)),
    )
}

#[test]
fn timeout_cancels_a_long_query() {
    let backend = SleepingBackend::new();
    let mut stmt = statement(&backend);

    stmt.set_query_timeout_duration(Duration::from_millis(100))
        .unwrap();
    let started = Instant::now();
    let err = stmt.execute("sleep 2000").unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DriverError>(),
        Some(DriverError::Cancelled)
    ));
    assert!(started.elapsed() < Duration::from_millis(1500));
}

#[test]
fn fast_query_beats_the_timer() {
    let backend = SleepingBackend::new();
    let mut stmt = statement(&backend);

    stmt.set_query_timeout_duration(Duration::from_millis(500))
        .unwrap();
    stmt.execute("sleep 10").unwrap();
    assert_eq!(stmt.update_count().unwrap(), 0);
}

#[test]
fn zero_timeout_never_arms_a_timer() {
    let backend = SleepingBackend::new();
    let mut stmt = statement(&backend);

    stmt.execute("sleep 150").unwrap();
    assert_eq!(stmt.update_count().unwrap(), 0);
}

#[test]
fn disabled_timeout_does_not_cancel_a_later_query() {
    let backend = SleepingBackend::new();
    let mut stmt = statement(&backend);

    // first query completes well inside its timeout; the armed timer is
    // disarmed synchronously when the execution finishes
    stmt.set_query_timeout_duration(Duration::from_millis(120))
        .unwrap();
    stmt.execute("sleep 10").unwrap();

    // the old deadline (120ms after the first arm) now falls in the
    // middle of this longer, untimed query; it must run to completion
    stmt.set_query_timeout(0).unwrap();
    stmt.execute("sleep 300").unwrap();
    assert_eq!(stmt.update_count().unwrap(), 0);
}

#[test]
fn cancelled_query_then_disabled_timeout_runs_clean() {
    let backend = SleepingBackend::new();
    let mut stmt = statement(&backend);

    stmt.set_query_timeout_duration(Duration::from_millis(100))
        .unwrap();
    let err = stmt.execute("sleep 500").unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DriverError>(),
        Some(DriverError::Cancelled)
    ));

    // the earlier timer is dead; this longer query must not be cancelled
    stmt.set_query_timeout(0).unwrap();
    stmt.execute("sleep 300").unwrap();
    assert_eq!(stmt.update_count().unwrap(), 0);
}

#[test]
fn timer_is_rearmed_per_statement_unit() {
    let backend = SleepingBackend::new();
    let mut stmt = statement(&backend);

    // each unit gets the full timeout; both finish under it
    stmt.set_query_timeout_duration(Duration::from_millis(150))
        .unwrap();
    stmt.execute("sleep 100; sleep 100").unwrap();
    assert_eq!(stmt.update_count().unwrap(), 0);

    // a slow second unit is cancelled on its own deadline
    let err = stmt.execute("sleep 10; sleep 2000").unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DriverError>(),
        Some(DriverError::Cancelled)
    ));
}
