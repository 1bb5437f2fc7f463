//! Pipeline counters
//!
//! The dispatch worker bumps these while callers read snapshots, so every
//! counter is atomic and the timestamps sit behind a lock.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    /// Raw events accepted off the source
    pub total_events: u64,
    /// Events discarded by the filter, while paused, or on outlet overflow
    pub dropped_events: u64,
    /// Events absorbed by the debouncer
    pub debounced_events: u64,
    /// Events appended to the batch buffer
    pub batched_events: u64,
    /// Events handed to the handler or the pull outlet
    pub delivered_events: u64,
    /// Errors reported by the source
    pub errors: u64,
    pub last_event_time: Option<DateTime<Utc>>,
    pub start_time: Option<DateTime<Utc>>,
    pub files_watched: u64,
    pub dirs_watched: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatsCollector {
    total: AtomicU64,
    dropped: AtomicU64,
    debounced: AtomicU64,
    batched: AtomicU64,
    delivered: AtomicU64,
    errors: AtomicU64,
    files: AtomicU64,
    dirs: AtomicU64,
    times: Mutex<Times>,
}

#[derive(Debug, Default)]
struct Times {
    last_event: Option<DateTime<Utc>>,
    start: Option<DateTime<Utc>>,
}

impl StatsCollector {
    /// Reset the per-run counters; registry counts survive
    pub fn reset_run(&self) {
        for counter in [
            &self.total,
            &self.dropped,
            &self.debounced,
            &self.batched,
            &self.delivered,
            &self.errors,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        let mut times = self.times.lock();
        times.last_event = None;
        times.start = Some(Utc::now());
    }

    pub fn record_event(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.times.lock().last_event = Some(Utc::now());
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped_many(&self, count: usize) {
        self.dropped.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_debounced(&self) {
        self.debounced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_batched(&self) {
        self.batched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivered(&self, count: usize) {
        self.delivered.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_watched(&self, files: u64, dirs: u64) {
        self.files.store(files, Ordering::Relaxed);
        self.dirs.store(dirs, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Stats {
        let times = self.times.lock();
        Stats {
            total_events: self.total.load(Ordering::Relaxed),
            dropped_events: self.dropped.load(Ordering::Relaxed),
            debounced_events: self.debounced.load(Ordering::Relaxed),
            batched_events: self.batched.load(Ordering::Relaxed),
            delivered_events: self.delivered.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            last_event_time: times.last_event,
            start_time: times.start,
            files_watched: self.files.load(Ordering::Relaxed),
            dirs_watched: self.dirs.load(Ordering::Relaxed),
        }
    }
}
