//! Lifecycle state machine
//!
//! ```text
//!  Idle/Stopped --start--> Running --pause--> Paused
//!                          Running <-resume-- Paused
//!  Running/Paused --source error--> Error
//!  Running/Paused/Error --stop--> Stopped
//! ```
//!
//! Registry and configuration mutators are only legal in Idle or Stopped.
//! Once closed, nothing but queries is legal.

use crate::error::{Result, WatchError};
use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};

/// Current lifecycle state of a watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WatcherState {
    Idle,
    Running,
    Paused,
    Stopped,
    Error,
}

impl WatcherState {
    /// A dispatch worker exists in this state
    pub fn is_active(self) -> bool {
        matches!(
            self,
            WatcherState::Running | WatcherState::Paused | WatcherState::Error
        )
    }
}

impl fmt::Display for WatcherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WatcherState::Idle => "idle",
            WatcherState::Running => "running",
            WatcherState::Paused => "paused",
            WatcherState::Stopped => "stopped",
            WatcherState::Error => "error",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
struct Inner {
    state: WatcherState,
    closed: bool,
    /// Start of the most recent pause and, once resumed, its end
    pause_window: Option<(Instant, Option<Instant>)>,
}

/// Shared between the facade and the dispatch worker
#[derive(Debug)]
pub(crate) struct Lifecycle {
    inner: Mutex<Inner>,
    settled: Condvar,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: WatcherState::Idle,
                closed: false,
                pause_window: None,
            }),
            settled: Condvar::new(),
        }
    }
}

impl Lifecycle {
    pub fn state(&self) -> WatcherState {
        self.inner.lock().state
    }

    /// Mutators and start require Idle or Stopped on an open watcher
    pub fn ensure_mutable(&self) -> Result<()> {
        let inner = self.inner.lock();
        if inner.closed {
            return Err(WatchError::WatcherStopped);
        }
        match inner.state {
            WatcherState::Idle | WatcherState::Stopped => Ok(()),
            _ => Err(WatchError::WatcherRunning),
        }
    }

    pub fn mark_running(&self) {
        let mut inner = self.inner.lock();
        inner.state = WatcherState::Running;
        inner.pause_window = None;
    }

    pub fn mark_stopped(&self) {
        let mut inner = self.inner.lock();
        inner.state = WatcherState::Stopped;
        inner.pause_window = None;
        self.settled.notify_all();
    }

    /// Returns false if the watcher was already closed
    pub fn close(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.closed {
            return false;
        }
        inner.closed = true;
        if !inner.state.is_active() {
            inner.state = WatcherState::Stopped;
            self.settled.notify_all();
        }
        true
    }

    /// Running becomes Paused; Paused is a no-op
    ///
    /// An errored run is still live and fails with `WatcherRunning`, the same
    /// kind mutators get; with no run it is `WatcherStopped`.
    pub fn pause(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        match inner.state {
            WatcherState::Running => {
                inner.state = WatcherState::Paused;
                inner.pause_window = Some((Instant::now(), None));
                Ok(())
            }
            WatcherState::Paused => Ok(()),
            WatcherState::Error => Err(WatchError::WatcherRunning),
            WatcherState::Idle | WatcherState::Stopped => Err(WatchError::WatcherStopped),
        }
    }

    /// Returns true if the watcher was paused
    pub fn resume(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state != WatcherState::Paused {
            return false;
        }
        inner.state = WatcherState::Running;
        if let Some((start, _)) = inner.pause_window {
            inner.pause_window = Some((start, Some(Instant::now())));
        }
        true
    }

    /// Move a live watcher into Error; returns true on transition
    pub fn fail(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            WatcherState::Running | WatcherState::Paused => {
                inner.state = WatcherState::Error;
                true
            }
            _ => false,
        }
    }

    /// Whether an event received at `received` falls inside a pause
    pub fn should_discard(&self, received: Instant) -> bool {
        let inner = self.inner.lock();
        if inner.state == WatcherState::Paused {
            return true;
        }
        match inner.pause_window {
            Some((start, Some(end))) => received >= start && received < end,
            _ => false,
        }
    }

    /// Block until no run is active
    pub fn wait(&self) {
        let mut inner = self.inner.lock();
        while inner.state.is_active() {
            self.settled.wait(&mut inner);
        }
    }

    /// Block until no run is active or `timeout` passes; true if settled
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        while inner.state.is_active() {
            if self.settled.wait_until(&mut inner, deadline).timed_out() {
                return !inner.state.is_active();
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_mutators_only_when_idle_or_stopped() {
        let lc = Lifecycle::default();
        assert!(lc.ensure_mutable().is_ok());

        lc.mark_running();
        assert_eq!(lc.ensure_mutable().unwrap_err().kind(), ErrorKind::WatcherRunning);

        lc.pause().unwrap();
        assert_eq!(lc.ensure_mutable().unwrap_err().kind(), ErrorKind::WatcherRunning);

        lc.mark_stopped();
        assert!(lc.ensure_mutable().is_ok());
    }

    #[test]
    fn test_pause_resume_transitions() {
        let lc = Lifecycle::default();
        assert_eq!(lc.pause().unwrap_err().kind(), ErrorKind::WatcherStopped);
        assert!(!lc.resume());

        lc.mark_running();
        lc.pause().unwrap();
        assert_eq!(lc.state(), WatcherState::Paused);
        lc.pause().unwrap();

        assert!(lc.resume());
        assert_eq!(lc.state(), WatcherState::Running);
        assert!(!lc.resume());
    }

    #[test]
    fn test_pause_window_discards_late_events() {
        let lc = Lifecycle::default();
        lc.mark_running();
        let before = Instant::now();

        lc.pause().unwrap();
        let during = Instant::now();
        assert!(lc.should_discard(during));

        thread::sleep(Duration::from_millis(2));
        lc.resume();
        let after = Instant::now();

        assert!(!lc.should_discard(before));
        assert!(lc.should_discard(during));
        assert!(!lc.should_discard(after));
    }

    #[test]
    fn test_error_only_from_live_states() {
        let lc = Lifecycle::default();
        assert!(!lc.fail());
        lc.mark_running();
        assert!(lc.fail());
        assert_eq!(lc.state(), WatcherState::Error);
        assert_eq!(lc.ensure_mutable().unwrap_err().kind(), ErrorKind::WatcherRunning);
        assert_eq!(lc.pause().unwrap_err().kind(), ErrorKind::WatcherRunning);
    }

    #[test]
    fn test_close_is_idempotent() {
        let lc = Lifecycle::default();
        assert!(lc.close());
        assert!(!lc.close());
        assert_eq!(lc.state(), WatcherState::Stopped);
        assert_eq!(lc.ensure_mutable().unwrap_err().kind(), ErrorKind::WatcherStopped);
    }

    #[test]
    fn test_wait_returns_after_stop() {
        let lc = Arc::new(Lifecycle::default());
        lc.mark_running();
        assert!(!lc.wait_timeout(Duration::from_millis(10)));

        let stopper = {
            let lc = lc.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                lc.mark_stopped();
            })
        };
        lc.wait();
        assert_eq!(lc.state(), WatcherState::Stopped);
        stopper.join().unwrap();
    }
}
