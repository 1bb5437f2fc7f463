//! In-memory event source
//!
//! Events and errors are injected by hand. Useful for driving the pipeline
//! deterministically and for bridging producers that are not file systems.

use super::{RawEvent, RawSource, RawStreams, SourceFactory};
use crate::error::{Result, WatchError};
use crate::event::Op;
use crossbeam_channel::{bounded, Sender};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Default)]
struct Shared {
    events: Option<Sender<RawEvent>>,
    errors: Option<Sender<WatchError>>,
    watched: BTreeSet<PathBuf>,
    opened: usize,
}

/// Factory handing out channel-backed sources
#[derive(Clone, Default)]
pub struct MemoryFactory {
    shared: Arc<Mutex<Shared>>,
}

/// Sending side of a [`MemoryFactory`]
///
/// Always targets the most recently opened source.
#[derive(Clone)]
pub struct MemoryInjector {
    shared: Arc<Mutex<Shared>>,
}

impl MemoryFactory {
    /// Create a factory and its injector
    pub fn new() -> (Self, MemoryInjector) {
        let factory = Self::default();
        let injector = MemoryInjector {
            shared: factory.shared.clone(),
        };
        (factory, injector)
    }
}

impl SourceFactory for MemoryFactory {
    fn open(&self, capacity: usize) -> Result<(Box<dyn RawSource>, RawStreams)> {
        let (event_tx, event_rx) = bounded(capacity.max(1));
        let (error_tx, error_rx) = bounded(capacity.max(1));

        let mut shared = self.shared.lock();
        shared.events = Some(event_tx);
        shared.errors = Some(error_tx);
        shared.watched.clear();
        shared.opened += 1;

        let source = MemorySource {
            shared: self.shared.clone(),
        };
        let streams = RawStreams {
            events: event_rx,
            errors: error_rx,
        };
        Ok((Box::new(source), streams))
    }
}

struct MemorySource {
    shared: Arc<Mutex<Shared>>,
}

impl RawSource for MemorySource {
    fn watch(&mut self, path: &Path) -> Result<()> {
        let mut shared = self.shared.lock();
        if shared.events.is_none() {
            return Err(WatchError::WatcherStopped);
        }
        shared.watched.insert(path.to_path_buf());
        Ok(())
    }

    fn unwatch(&mut self, path: &Path) -> Result<()> {
        self.shared.lock().watched.remove(path);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let mut shared = self.shared.lock();
        shared.events = None;
        shared.errors = None;
        shared.watched.clear();
        Ok(())
    }
}

impl MemoryInjector {
    /// Inject an event; returns false when no source is open
    pub fn send(&self, path: impl Into<PathBuf>, op: Op) -> bool {
        self.send_raw(RawEvent::new(path, op))
    }

    /// Inject a rename carrying both sides
    pub fn send_rename(&self, from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> bool {
        self.send_raw(RawEvent::rename(from, to))
    }

    pub fn send_raw(&self, event: RawEvent) -> bool {
        // Clone the sender so a full channel does not block while holding the lock
        let sender = self.shared.lock().events.clone();
        match sender {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Inject a source error; returns false when no source is open
    pub fn send_error(&self, err: WatchError) -> bool {
        let sender = self.shared.lock().errors.clone();
        match sender {
            Some(tx) => tx.send(err).is_ok(),
            None => false,
        }
    }

    /// Paths registered on the currently open source
    pub fn watched(&self) -> Vec<PathBuf> {
        self.shared.lock().watched.iter().cloned().collect()
    }

    /// Whether a source is currently open
    pub fn is_open(&self) -> bool {
        self.shared.lock().events.is_some()
    }

    /// How many sources have been opened so far
    pub fn opened(&self) -> usize {
        self.shared.lock().opened
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inject_before_open_fails() {
        let (_factory, injector) = MemoryFactory::new();
        assert!(!injector.is_open());
        assert!(!injector.send("/tmp/a", Op::WRITE));
    }

    #[test]
    fn test_open_inject_close() {
        let (factory, injector) = MemoryFactory::new();
        let (mut source, streams) = factory.open(4).unwrap();

        source.watch(Path::new("/tmp/w")).unwrap();
        assert_eq!(injector.watched(), vec![PathBuf::from("/tmp/w")]);

        assert!(injector.send("/tmp/w/a", Op::CREATE | Op::WRITE));
        let raw = streams.events.try_recv().unwrap();
        assert_eq!(raw.path, PathBuf::from("/tmp/w/a"));
        assert_eq!(raw.op, Op::CREATE | Op::WRITE);

        assert!(injector.send_error(WatchError::NoHandler));
        assert!(streams.errors.try_recv().is_ok());

        source.close().unwrap();
        assert!(!injector.is_open());
        assert!(streams.events.recv().is_err());
        assert_eq!(injector.opened(), 1);
    }
}
