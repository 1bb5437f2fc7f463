//! Size/time bounded batching
//!
//! Events accumulate in one buffer. Reaching `max_size` hands the buffer out
//! immediately; otherwise every append re-arms the timer to `max_wait` from
//! now and the buffer goes out when it expires.

use crate::config::millis;
use crate::event::Event;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Batch configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub enabled: bool,

    /// Buffer length that triggers an immediate flush
    pub max_size: usize,

    /// Time after the most recent append before a timed flush
    #[serde(with = "millis", rename = "max_wait_ms")]
    pub max_wait: Duration,

    /// Timed flushes hold back buffers shorter than this
    pub min_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_size: 100,
            max_wait: Duration::from_millis(1000),
            min_size: 1,
        }
    }
}

impl BatchConfig {
    /// Enabled config with the given bounds
    pub fn new(max_size: usize, max_wait: Duration) -> Self {
        Self {
            enabled: true,
            max_size,
            max_wait,
            ..Self::default()
        }
    }
}

/// Batch engine
#[derive(Debug)]
pub struct Batcher {
    config: BatchConfig,
    buffer: Vec<Event>,
    deadline: Option<Instant>,
}

impl Batcher {
    pub fn new(mut config: BatchConfig) -> Self {
        config.max_size = config.max_size.max(1);
        Self {
            buffer: Vec::with_capacity(config.max_size),
            config,
            deadline: None,
        }
    }

    /// Append an event; returns the full batch if this append filled it
    pub fn push(&mut self, event: Event, now: Instant) -> Option<Vec<Event>> {
        self.buffer.push(event);
        if self.buffer.len() >= self.config.max_size {
            return Some(self.take());
        }
        self.deadline = Some(now + self.config.max_wait);
        None
    }

    /// When the timed flush fires, if armed
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Hand out the buffer if the timer expired and `min_size` is met
    ///
    /// A short buffer stays put and the timer is disarmed until the next
    /// append re-arms it.
    pub fn flush_due(&mut self, now: Instant) -> Option<Vec<Event>> {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                if self.buffer.is_empty() || self.buffer.len() < self.config.min_size {
                    return None;
                }
                Some(self.take())
            }
            _ => None,
        }
    }

    /// Hand out whatever is buffered, ignoring `min_size`
    pub fn drain(&mut self) -> Option<Vec<Event>> {
        if self.buffer.is_empty() {
            self.deadline = None;
            return None;
        }
        Some(self.take())
    }

    fn take(&mut self) -> Vec<Event> {
        self.deadline = None;
        std::mem::replace(&mut self.buffer, Vec::with_capacity(self.config.max_size))
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventType;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn event(n: usize) -> Event {
        Event::new(EventType::Write, format!("/w/{n}.txt"))
    }

    #[test]
    fn test_full_batch_flushes_immediately() {
        let mut b = Batcher::new(BatchConfig::new(5, ms(100)));
        let now = Instant::now();

        for i in 0..4 {
            assert!(b.push(event(i), now).is_none());
        }
        let batch = b.push(event(4), now).unwrap();
        assert_eq!(batch.len(), 5);
        assert_eq!(batch[0].path(), std::path::Path::new("/w/0.txt"));
        assert!(b.is_empty());
        assert_eq!(b.deadline(), None);
    }

    #[test]
    fn test_partial_batch_flushes_after_max_wait() {
        let mut b = Batcher::new(BatchConfig::new(5, ms(100)));
        let t0 = Instant::now();

        b.push(event(0), t0);
        b.push(event(1), t0 + ms(30));
        assert_eq!(b.deadline(), Some(t0 + ms(130)));
        assert!(b.flush_due(t0 + ms(100)).is_none());

        let batch = b.flush_due(t0 + ms(130)).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(b.deadline(), None);
    }

    #[test]
    fn test_min_size_holds_short_batches() {
        let config = BatchConfig {
            min_size: 3,
            ..BatchConfig::new(10, ms(50))
        };
        let mut b = Batcher::new(config);
        let t0 = Instant::now();

        b.push(event(0), t0);
        assert!(b.flush_due(t0 + ms(60)).is_none());
        assert_eq!(b.len(), 1);

        b.push(event(1), t0 + ms(70));
        b.push(event(2), t0 + ms(80));
        assert_eq!(b.flush_due(t0 + ms(130)).unwrap().len(), 3);
    }

    #[test]
    fn test_drain_ignores_min_size() {
        let config = BatchConfig {
            min_size: 3,
            ..BatchConfig::new(10, ms(50))
        };
        let mut b = Batcher::new(config);
        b.push(event(0), Instant::now());

        assert_eq!(b.drain().unwrap().len(), 1);
        assert!(b.drain().is_none());
    }

    #[test]
    fn test_zero_max_size_treated_as_one() {
        let mut b = Batcher::new(BatchConfig::new(0, ms(50)));
        assert_eq!(b.push(event(0), Instant::now()).unwrap().len(), 1);
    }
}
