//! Event source backed by `notify`'s recommended platform watcher

use super::{RawEvent, RawSource, RawStreams, SourceFactory};
use crate::error::{Result, WatchError};
use crate::event::Op;
use crossbeam_channel::{bounded, Sender};
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, trace};

/// Factory for the platform notifier (inotify, FSEvents, ReadDirectoryChangesW)
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeFactory;

impl SourceFactory for NativeFactory {
    fn open(&self, capacity: usize) -> Result<(Box<dyn RawSource>, RawStreams)> {
        let (event_tx, event_rx) = bounded(capacity.max(1));
        let (error_tx, error_rx) = bounded(capacity.max(1));

        let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            forward(res, &event_tx, &error_tx);
        })?;

        let source = NativeSource {
            watcher: Some(watcher),
        };
        let streams = RawStreams {
            events: event_rx,
            errors: error_rx,
        };
        Ok((Box::new(source), streams))
    }
}

struct NativeSource {
    watcher: Option<RecommendedWatcher>,
}

impl RawSource for NativeSource {
    fn watch(&mut self, path: &Path) -> Result<()> {
        let watcher = self.watcher.as_mut().ok_or(WatchError::WatcherStopped)?;
        watcher.watch(path, RecursiveMode::NonRecursive)?;
        debug!(path = %path.display(), "native source watching");
        Ok(())
    }

    fn unwatch(&mut self, path: &Path) -> Result<()> {
        let watcher = self.watcher.as_mut().ok_or(WatchError::WatcherStopped)?;
        watcher.unwatch(path)?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        // Dropping the notify watcher drops the callback and with it both senders
        self.watcher.take();
        Ok(())
    }
}

/// Push one notify callback result into the raw channels
fn forward(
    res: notify::Result<notify::Event>,
    events: &Sender<RawEvent>,
    errors: &Sender<WatchError>,
) {
    match res {
        Ok(event) => {
            let op = translate(&event.kind);
            if op.is_empty() {
                trace!(kind = ?event.kind, "ignoring notify event");
                return;
            }
            let received = Instant::now();
            for path in event.paths {
                let raw = RawEvent {
                    path,
                    op,
                    old_path: None,
                    received,
                };
                // Receiver gone means the run is over
                if events.send(raw).is_err() {
                    return;
                }
            }
        }
        Err(err) => {
            let _ = errors.send(WatchError::from(err));
        }
    }
}

/// Map a notify event kind onto the raw operation bitmask
///
/// Renames follow the classic notifier convention: the old name reports
/// RENAME and the new name reports CREATE. The combined "both" notification
/// repeats what the two halves already said and is not forwarded.
pub(crate) fn translate(kind: &EventKind) -> Op {
    match kind {
        EventKind::Create(_) => Op::CREATE,
        EventKind::Modify(ModifyKind::Data(_))
        | EventKind::Modify(ModifyKind::Any)
        | EventKind::Modify(ModifyKind::Other) => Op::WRITE,
        EventKind::Modify(ModifyKind::Metadata(_)) => Op::CHMOD,
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Op::CREATE,
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => Op::empty(),
        EventKind::Modify(ModifyKind::Name(_)) => Op::RENAME,
        EventKind::Remove(_) => Op::REMOVE,
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Op::empty(),
    }
}
