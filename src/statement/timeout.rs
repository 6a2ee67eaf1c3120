//! # Query-Timeout Cancellation Scheduler
//!
//! One timer per execution attempt, armed only when a query timeout is
//! configured. The race this module exists to close: a timer armed for a
//! short query must never cancel the next, unrelated query, even when the
//! timer thread is scheduled late.
//!
//! The mechanism is a single monotonically increasing generation counter
//! shared between the driver and the timer thread. The driver advances it
//! the instant an execution finishes; the timer compares its armed
//! generation against the counter at fire time and cancels only on a
//! match. Both sides use `SeqCst`, so the advance happens-before any late
//! comparison.
//!
//! Disarming is synchronous: the timer waits on a condvar rather than
//! sleeping, and `disarm` notifies it and joins the thread before
//! returning, so no callback can fire once the owning statement has moved
//! on.

use crate::session::QueryExecutor;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

pub(crate) struct ArmedTimer {
    shared: Arc<TimerShared>,
    handle: Option<thread::JoinHandle<()>>,
}

struct TimerShared {
    disarmed: Mutex<bool>,
    signal: Condvar,
}

impl ArmedTimer {
    /// Arm a timer bound to `generation`. When it expires it requests
    /// cancellation iff `active` still equals `generation`.
    pub(crate) fn arm<E>(
        executor: Arc<E>,
        active: Arc<AtomicU64>,
        generation: u64,
        timeout: Duration,
    ) -> Self
    where
        E: QueryExecutor + ?Sized + 'static,
    {
        let shared = Arc::new(TimerShared {
            disarmed: Mutex::new(false),
            signal: Condvar::new(),
        });
        let timer_shared = Arc::clone(&shared);

        let handle = thread::spawn(move || {
            let deadline = Instant::now() + timeout;
            let mut disarmed = timer_shared.disarmed.lock();
            while !*disarmed {
                if timer_shared.signal.wait_until(&mut disarmed, deadline).timed_out() {
                    break;
                }
            }
            if *disarmed {
                return;
            }
            drop(disarmed);

            if active.load(Ordering::SeqCst) == generation {
                executor.cancel();
            }
        });

        Self {
            shared,
            handle: Some(handle),
        }
    }

    /// Release the timer synchronously: after this returns the callback
    /// has either already fired or never will.
    pub(crate) fn disarm(&mut self) {
        if let Some(handle) = self.handle.take() {
            {
                let mut disarmed = self.shared.disarmed.lock();
                *disarmed = true;
            }
            self.shared.signal.notify_all();
            let _ = handle.join();
        }
    }
}

impl Drop for ArmedTimer {
    fn drop(&mut self) {
        self.disarm();
    }
}
