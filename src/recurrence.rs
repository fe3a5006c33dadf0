//! Recurrence scheduler — periodic sweep that mints new assignment
//! instances.
//!
//! Spawns a background thread that sweeps once a minute. For every
//! assignment with a nonzero repeat interval, the sweep loads its instances
//! and mints exactly one new instance when every existing instance is older
//! than the interval. An assignment with no instances is left alone:
//! creation always seeds the first instance, so an empty set means the data
//! is in an unexpected state, not that a new instance is due.
//!
//! A sweep holds a single-flight latch for its whole run, so a slow sweep
//! can never overlap with the next tick and double-mint an instance for the
//! same due evaluation.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDateTime, Utc};
use rusqlite::Connection;

use crate::db::repository::assignment::{insert_instance, instances_for_assignment, repeating_assignments};
use crate::db::{self, DatabaseError};

/// Sweep interval: every 60 seconds.
const SWEEP_INTERVAL_SECS: u64 = 60;

/// Sleep granularity for shutdown responsiveness (5 seconds).
const SLEEP_GRANULARITY_SECS: u64 = 5;

/// What one sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Repeating assignments examined.
    pub examined: usize,
    /// New instances minted.
    pub minted: usize,
}

/// Handle for the recurrence scheduler thread.
///
/// Supports graceful shutdown via `shutdown()` or automatic cleanup on `Drop`.
pub struct RecurrenceHandle {
    shutdown: Arc<AtomicBool>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl RecurrenceHandle {
    /// Request graceful shutdown. A sweep in progress will complete, but no
    /// new sweeps will be started.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

impl Drop for RecurrenceHandle {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

/// Start the recurrence scheduler on a separate thread. Returns a handle the
/// caller stores for graceful shutdown.
pub fn start_recurrence_scheduler(db_path: PathBuf) -> RecurrenceHandle {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();

    let handle = std::thread::spawn(move || {
        tracing::info!("Recurrence scheduler started (sweep every {}s)", SWEEP_INTERVAL_SECS);
        scheduler_loop(&db_path, &flag);
    });

    RecurrenceHandle {
        shutdown,
        handle: Some(handle),
    }
}

fn scheduler_loop(db_path: &std::path::Path, shutdown: &AtomicBool) {
    let sweeper = Sweeper::new();

    while !shutdown.load(Ordering::Relaxed) {
        // Sleep in small increments for responsive shutdown
        for _ in 0..(SWEEP_INTERVAL_SECS / SLEEP_GRANULARITY_SECS) {
            if shutdown.load(Ordering::Relaxed) {
                tracing::info!("Recurrence scheduler shutting down");
                return;
            }
            std::thread::sleep(Duration::from_secs(SLEEP_GRANULARITY_SECS));
        }

        if shutdown.load(Ordering::Relaxed) {
            break;
        }

        match db::open_database(db_path) {
            Ok(conn) => match sweeper.sweep(&conn, Utc::now().naive_utc()) {
                Ok(stats) if stats.minted > 0 => {
                    tracing::info!(examined = stats.examined, minted = stats.minted, "sweep minted instances");
                }
                Ok(stats) => {
                    tracing::debug!(examined = stats.examined, "sweep found nothing due");
                }
                Err(e) => tracing::error!(error = %e, "recurrence sweep failed"),
            },
            Err(e) => tracing::error!(error = %e, "recurrence scheduler could not open database"),
        }
    }
    tracing::info!("Recurrence scheduler shutting down");
}

/// Wraps the sweep with a single-flight latch. The scheduler thread is the
/// only caller in production, but the latch also covers a resolver-triggered
/// manual sweep racing the timer.
pub struct Sweeper {
    in_flight: AtomicBool,
}

impl Sweeper {
    pub fn new() -> Self {
        Self {
            in_flight: AtomicBool::new(false),
        }
    }

    /// Run one sweep unless one is already running; an overlapping call is
    /// skipped and reports zero work.
    pub fn sweep(&self, conn: &Connection, now: NaiveDateTime) -> Result<SweepStats, DatabaseError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            tracing::warn!("sweep already in flight, skipping");
            return Ok(SweepStats::default());
        }

        let result = run_sweep(conn, now);
        self.in_flight.store(false, Ordering::Release);
        result
    }
}

impl Default for Sweeper {
    fn default() -> Self {
        Self::new()
    }
}

/// One full sweep over all repeating assignments. `now` is a parameter so
/// callers (and tests) control the clock.
pub fn run_sweep(conn: &Connection, now: NaiveDateTime) -> Result<SweepStats, DatabaseError> {
    let assignments = repeating_assignments(conn)?;
    let mut stats = SweepStats {
        examined: assignments.len(),
        minted: 0,
    };

    for assignment in assignments {
        // repeating_assignments only returns rows with interval > 0
        let interval = chrono::Duration::minutes(assignment.repeat_interval.unwrap_or(0));
        let instances = instances_for_assignment(conn, assignment.id)?;

        if instances.is_empty() {
            tracing::debug!(
                assignment_id = assignment.id,
                "repeating assignment has no instances; leaving for creation-time seeding"
            );
            continue;
        }

        let all_older = instances.iter().all(|i| now - i.created > interval);
        if all_older {
            let id = insert_instance(conn, &assignment, now)?;
            tracing::debug!(assignment_id = assignment.id, instance_id = id, "minted instance");
            stats.minted += 1;
        }
    }

    Ok(stats)
}
