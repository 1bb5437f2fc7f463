//! Raw event sources
//!
//! The pipeline never talks to the OS notification primitive directly. It
//! opens a [`RawSource`] through a [`SourceFactory`] on every start, registers
//! the watched paths on it, and reads [`RawEvent`]s and errors from the
//! returned [`RawStreams`].
//!
//! - [`NativeFactory`] wraps `notify`'s recommended backend
//! - [`MemoryFactory`] is fed programmatically through a [`MemoryInjector`]

pub mod memory;
pub mod native;

pub use memory::{MemoryFactory, MemoryInjector};
pub use native::NativeFactory;

use crate::error::{Result, WatchError};
use crate::event::Op;
use crossbeam_channel::Receiver;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// An event as reported by the source, before normalization
#[derive(Debug, Clone)]
pub struct RawEvent {
    /// Path the operation applies to
    pub path: PathBuf,
    /// Operation bits; may carry more than one
    pub op: Op,
    /// Previous path when the source reported both sides of a rename
    pub old_path: Option<PathBuf>,
    /// When the source received the event
    pub received: Instant,
}

impl RawEvent {
    pub fn new(path: impl Into<PathBuf>, op: Op) -> Self {
        Self {
            path: path.into(),
            op,
            old_path: None,
            received: Instant::now(),
        }
    }

    pub fn rename(from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Self {
        Self {
            old_path: Some(from.into()),
            ..Self::new(to, Op::RENAME)
        }
    }
}

/// Receiving ends of an open source
pub struct RawStreams {
    pub events: Receiver<RawEvent>,
    pub errors: Receiver<WatchError>,
}

/// An open OS-level notifier
pub trait RawSource: Send {
    /// Start receiving events for `path` (non-recursive)
    fn watch(&mut self, path: &Path) -> Result<()>;

    /// Stop receiving events for `path`
    fn unwatch(&mut self, path: &Path) -> Result<()>;

    /// Release the notifier; both streams disconnect afterwards
    fn close(&mut self) -> Result<()>;
}

/// Opens a fresh [`RawSource`] for each run of a watcher
pub trait SourceFactory: Send + Sync {
    /// Open a source whose channels hold up to `capacity` pending items
    fn open(&self, capacity: usize) -> Result<(Box<dyn RawSource>, RawStreams)>;
}
