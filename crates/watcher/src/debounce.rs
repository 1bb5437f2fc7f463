//! Per-path debouncing with a global flush timer
//!
//! Each path gets one pending [`DebouncedEvent`] that absorbs every
//! qualifying event until the next flush. The flush timer is shared by all
//! paths: any event on any path pushes it out to `max_wait` from now, and
//! when it fires every pending path is emitted in one sweep.
//!
//! Continuous activity on a single path therefore holds back every other
//! pending path too. There is no per-path ceiling.
//!
//! The engine is plain data driven by the dispatch loop, which owns it and
//! passes the clock in.

use crate::config::millis;
use crate::event::{Event, EventType};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Debounce configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebounceConfig {
    pub enabled: bool,

    /// Quiet period; carried for configuration compatibility, the sweep is
    /// timed by `max_wait`
    #[serde(with = "millis", rename = "delay_ms")]
    pub delay: Duration,

    /// Time after the most recent event (on any path) before the sweep
    #[serde(with = "millis", rename = "max_wait_ms")]
    pub max_wait: Duration,

    /// Let later events overwrite the representative type of a group
    pub merge_events: bool,

    /// Only merge an event arriving within this long of the previous one
    /// for the same path (zero: no limit)
    #[serde(with = "millis", rename = "merge_window_ms")]
    pub merge_window: Duration,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            delay: Duration::from_millis(100),
            max_wait: Duration::from_millis(500),
            merge_events: true,
            merge_window: Duration::ZERO,
        }
    }
}

impl DebounceConfig {
    /// Enabled config with the given delay and sweep timer
    pub fn new(delay: Duration, max_wait: Duration) -> Self {
        Self {
            enabled: true,
            delay,
            max_wait,
            ..Self::default()
        }
    }
}

/// Events coalesced for one path
#[derive(Debug, Clone)]
pub struct DebouncedEvent {
    pub first_event: Event,
    pub last_event: Event,
    pub event_count: u64,
    /// Type reported when the group is emitted
    pub event_type: EventType,
    pub window_start: Instant,
    pub window_end: Instant,
}

impl DebouncedEvent {
    fn new(event: Event, now: Instant) -> Self {
        Self {
            event_type: event.event_type(),
            first_event: event.clone(),
            last_event: event,
            event_count: 1,
            window_start: now,
            window_end: now,
        }
    }

    /// The event handed to the handler on flush
    pub fn emit(&self) -> Event {
        self.last_event.retyped(self.event_type)
    }
}

/// Debounce engine
#[derive(Debug)]
pub struct Debouncer {
    config: DebounceConfig,
    pending: AHashMap<PathBuf, DebouncedEvent>,
    last_event_at: Option<Instant>,
}

impl Debouncer {
    pub fn new(config: DebounceConfig) -> Self {
        Self {
            config,
            pending: AHashMap::new(),
            last_event_at: None,
        }
    }

    /// Absorb a qualifying event and push the sweep timer out
    pub fn push(&mut self, event: Event, now: Instant) {
        let merge_events = self.config.merge_events;
        let merge_window = self.config.merge_window;

        match self.pending.get_mut(event.path()) {
            Some(entry) => {
                let within_window =
                    merge_window.is_zero() || now.duration_since(entry.window_end) <= merge_window;
                if merge_events && within_window {
                    entry.event_type = event.event_type();
                }
                entry.last_event = event;
                entry.event_count += 1;
                entry.window_end = now;
            }
            None => {
                self.pending
                    .insert(event.path().to_path_buf(), DebouncedEvent::new(event, now));
            }
        }
        self.last_event_at = Some(now);
    }

    /// When the sweep fires, if anything is pending
    pub fn deadline(&self) -> Option<Instant> {
        if self.pending.is_empty() {
            return None;
        }
        self.last_event_at.map(|at| at + self.config.max_wait)
    }

    /// Emit everything if the sweep timer has expired
    pub fn flush_due(&mut self, now: Instant) -> Vec<Event> {
        match self.deadline() {
            Some(deadline) if deadline <= now => self.drain(),
            _ => Vec::new(),
        }
    }

    /// Emit every pending path regardless of the timer, oldest group first
    pub fn drain(&mut self) -> Vec<Event> {
        let mut groups: Vec<DebouncedEvent> = self.pending.drain().map(|(_, g)| g).collect();
        groups.sort_by_key(|g| g.window_start);
        self.last_event_at = None;
        groups.iter().map(DebouncedEvent::emit).collect()
    }

    /// Pending group for a path
    pub fn pending(&self, path: &std::path::Path) -> Option<&DebouncedEvent> {
        self.pending.get(path)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
