//! File system change notification pipeline
//!
//! This crate watches a set of paths and delivers create/write/remove/
//! rename/chmod events after:
//! - Filtering (type, directory, hidden, size, extension, glob patterns)
//! - Debouncing (per-path coalescing, global sweep timer)
//! - Batching (size or time bounded)
//!
//! Events arrive from a pluggable raw source; the default wraps `notify`.
//! A single dispatch worker owns all coalescing state and hands events to a
//! handler callback, or to pull channels when no handler is set.
//!
//! ```no_run
//! let watcher = fswatch::watch("/tmp/x", |events| {
//!     for event in events {
//!         println!("{event}");
//!     }
//! }, None)?;
//! watcher.wait();
//! # Ok::<(), fswatch::WatchError>(())
//! ```

pub mod batch;
pub mod config;
pub mod debounce;
pub mod error;
pub mod event;
pub mod filter;
pub mod registry;
pub mod source;
pub mod state;
pub mod watcher;

mod dispatch;
mod stats;

// Re-exports
pub use batch::BatchConfig;
pub use config::{Config, ErrorHandler, Handler};
pub use debounce::{DebounceConfig, DebouncedEvent};
pub use error::{ErrorKind, Result, WatchError};
pub use event::{Event, EventType, Op};
pub use filter::Filter;
pub use source::{MemoryFactory, MemoryInjector, NativeFactory, RawEvent, SourceFactory};
pub use state::WatcherState;
pub use stats::Stats;
pub use watcher::Watcher;

use std::path::Path;

/// Watch one path and start delivering to `handler`
pub fn watch<P, F>(path: P, handler: F, error_handler: Option<ErrorHandler>) -> Result<Watcher>
where
    P: AsRef<Path>,
    F: Fn(Vec<Event>) + Send + Sync + 'static,
{
    let watcher = Watcher::with_config(helper_config(handler, error_handler))?;
    watcher.add(path)?;
    watcher.start()?;
    Ok(watcher)
}

/// Watch a directory tree and start delivering to `handler`
pub fn watch_recursive<P, F>(
    path: P,
    handler: F,
    error_handler: Option<ErrorHandler>,
) -> Result<Watcher>
where
    P: AsRef<Path>,
    F: Fn(Vec<Event>) + Send + Sync + 'static,
{
    let watcher = Watcher::with_config(helper_config(handler, error_handler))?;
    watcher.add_recursive(path)?;
    watcher.start()?;
    Ok(watcher)
}

/// Watch several paths and start delivering to `handler`
///
/// Fails on the first path that cannot be added; nothing is started then.
pub fn watch_files<I, P, F>(
    paths: I,
    handler: F,
    error_handler: Option<ErrorHandler>,
) -> Result<Watcher>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
    F: Fn(Vec<Event>) + Send + Sync + 'static,
{
    let watcher = Watcher::with_config(helper_config(handler, error_handler))?;
    for path in paths {
        watcher.add(path)?;
    }
    watcher.start()?;
    Ok(watcher)
}

fn helper_config<F>(handler: F, error_handler: Option<ErrorHandler>) -> Config
where
    F: Fn(Vec<Event>) + Send + Sync + 'static,
{
    Config {
        error_handler,
        ..Config::default().with_handler(handler)
    }
}
