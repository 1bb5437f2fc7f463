//! The `Watcher` facade
//!
//! All operations take `&self`; a watcher can be shared behind an `Arc` and
//! stopped from another thread (or from inside its own handler).

use crate::batch::Batcher;
use crate::config::Config;
use crate::debounce::Debouncer;
use crate::dispatch::{Dispatcher, Outlets};
use crate::error::{Result, WatchError};
use crate::event::Event;
use crate::filter::CompiledFilter;
use crate::registry::PathRegistry;
use crate::source::{NativeFactory, RawSource, SourceFactory};
use crate::state::{Lifecycle, WatcherState};
use crate::stats::{Stats, StatsCollector};
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// A live run: the open source and the worker draining it
struct Run {
    source: Box<dyn RawSource>,
    stop: Sender<()>,
    worker: JoinHandle<()>,
    handoff: Sender<Box<dyn RawSource>>,
}

#[derive(Default)]
struct Control {
    run: Option<Run>,
    outlets: Option<Outlets>,
}

/// File system watcher
pub struct Watcher {
    registry: PathRegistry,
    config: RwLock<(Config, CompiledFilter)>,
    lifecycle: Arc<Lifecycle>,
    stats: Arc<StatsCollector>,
    factory: Arc<dyn SourceFactory>,
    control: Mutex<Control>,
    event_rx: Receiver<Event>,
    batch_rx: Receiver<Vec<Event>>,
}

impl Default for Watcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Watcher {
    /// Watcher with the default configuration and the platform notifier
    pub fn new() -> Self {
        Self::build(Config::default(), CompiledFilter::default(), Arc::new(NativeFactory))
    }

    /// Watcher with a custom configuration and the platform notifier
    pub fn with_config(config: Config) -> Result<Self> {
        Self::with_source(config, NativeFactory)
    }

    /// Watcher reading from a custom event source
    pub fn with_source(config: Config, factory: impl SourceFactory + 'static) -> Result<Self> {
        let filter = config.filter.compile()?;
        Ok(Self::build(config, filter, Arc::new(factory)))
    }

    fn build(config: Config, filter: CompiledFilter, factory: Arc<dyn SourceFactory>) -> Self {
        let capacity = config.buffer_size.max(1);
        let (events, event_rx) = bounded(capacity);
        let (batches, batch_rx) = bounded(capacity);

        Self {
            registry: PathRegistry::new(),
            config: RwLock::new((config, filter)),
            lifecycle: Arc::new(Lifecycle::default()),
            stats: Arc::new(StatsCollector::default()),
            factory,
            control: Mutex::new(Control {
                run: None,
                outlets: Some(Outlets {
                    events,
                    batches,
                    capacity,
                }),
            }),
            event_rx,
            batch_rx,
        }
    }

    /// Watch a single path
    pub fn add(&self, path: impl AsRef<Path>) -> Result<()> {
        let _control = self.control.lock();
        self.lifecycle.ensure_mutable()?;
        self.registry.add(path.as_ref())?;
        self.sync_counts();
        Ok(())
    }

    /// Watch a directory and every directory beneath it
    pub fn add_recursive(&self, path: impl AsRef<Path>) -> Result<()> {
        let _control = self.control.lock();
        self.lifecycle.ensure_mutable()?;
        let added = self.registry.add_recursive(path.as_ref());
        self.sync_counts();
        let added = added?;
        debug!(root = %path.as_ref().display(), added, "registered tree");
        Ok(())
    }

    /// Stop watching a path
    pub fn remove(&self, path: impl AsRef<Path>) -> Result<()> {
        let _control = self.control.lock();
        self.lifecycle.ensure_mutable()?;
        self.registry.remove(path.as_ref())?;
        self.sync_counts();
        Ok(())
    }

    /// Replace the configuration
    ///
    /// The pull outlets keep the capacity they were created with.
    pub fn set_config(&self, config: Config) -> Result<()> {
        let _control = self.control.lock();
        self.lifecycle.ensure_mutable()?;
        let filter = config.filter.compile()?;
        *self.config.write() = (config, filter);
        Ok(())
    }

    /// Open the source, register every watched path and spawn the worker
    pub fn start(&self) -> Result<()> {
        let mut control = self.control.lock();
        self.lifecycle.ensure_mutable()?;

        let (config, filter) = self.config.read().clone();
        if config.batch.enabled && config.handler.is_none() {
            return Err(WatchError::NoHandler);
        }
        let outlets = control.outlets.clone().ok_or(WatchError::WatcherStopped)?;

        let (mut source, streams) = self.factory.open(config.buffer_size.max(1))?;
        for path in self.registry.paths() {
            if let Err(e) = source.watch(&path) {
                let _ = source.close();
                return Err(e);
            }
        }

        let (handoff_tx, handoff_rx) = bounded(1);
        let dispatcher = Dispatcher {
            filter,
            debouncer: config
                .debounce
                .enabled
                .then(|| Debouncer::new(config.debounce.clone())),
            batcher: config
                .batch
                .enabled
                .then(|| Batcher::new(config.batch.clone())),
            handler: config.handler.clone(),
            error_handler: config.error_handler.clone(),
            outlets,
            lifecycle: self.lifecycle.clone(),
            stats: self.stats.clone(),
            handoff: handoff_rx,
        };

        self.stats.reset_run();
        self.lifecycle.mark_running();

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let spawned = thread::Builder::new()
            .name("fswatch-dispatch".into())
            .spawn(move || dispatcher.run(streams, stop_rx));

        let worker = match spawned {
            Ok(worker) => worker,
            Err(e) => {
                let _ = source.close();
                self.lifecycle.mark_stopped();
                return Err(WatchError::source_error(e));
            }
        };

        control.run = Some(Run {
            source,
            stop: stop_tx,
            worker,
            handoff: handoff_tx,
        });
        info!(paths = self.registry.len(), "watcher started");
        Ok(())
    }

    /// Stop the worker, flushing anything pending, and close the source
    ///
    /// Called from inside a handler this returns at once; the state turns
    /// Stopped only after the worker has drained and exited the callback.
    pub fn stop(&self) -> Result<()> {
        let run = self.control.lock().run.take();
        match run {
            Some(run) => {
                self.finish(run);
                Ok(())
            }
            None => Err(WatchError::WatcherStopped),
        }
    }

    /// Discard events until [`Watcher::resume`]
    pub fn pause(&self) -> Result<()> {
        self.lifecycle.pause()?;
        info!("watcher paused");
        Ok(())
    }

    /// Deliver events again; events from the paused period are not replayed
    pub fn resume(&self) {
        if self.lifecycle.resume() {
            info!("watcher resumed");
        }
    }

    /// Block until the current run has stopped
    ///
    /// Returns immediately if nothing is running.
    pub fn wait(&self) {
        self.lifecycle.wait();
    }

    /// Like [`Watcher::wait`] with a limit; true if the run stopped
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.lifecycle.wait_timeout(timeout)
    }

    /// Stop if running, close the pull outlets and refuse further use
    pub fn close(&self) -> Result<()> {
        let run = {
            let mut control = self.control.lock();
            if !self.lifecycle.close() {
                return Ok(());
            }
            control.outlets = None;
            control.run.take()
        };
        if let Some(run) = run {
            self.finish(run);
        }
        debug!("watcher closed");
        Ok(())
    }

    fn finish(&self, run: Run) {
        let Run {
            mut source,
            stop,
            worker,
            handoff,
        } = run;

        // Disconnecting the stop channel unwinds the select
        drop(stop);
        if worker.thread().id() == thread::current().id() {
            // Still inside a callback: the worker drains, closes the source
            // and settles the state on its way out
            match handoff.try_send(source) {
                Ok(()) => {
                    debug!("stop requested from the dispatch worker, deferring teardown");
                    return;
                }
                Err(e) => source = e.into_inner(),
            }
        } else if worker.join().is_err() {
            error!("dispatch worker panicked");
        }

        if let Err(e) = source.close() {
            warn!(error = %e, "failed to close event source");
        }
        self.lifecycle.mark_stopped();
        info!("watcher stopped");
    }

    pub fn state(&self) -> WatcherState {
        self.lifecycle.state()
    }

    pub fn stats(&self) -> Stats {
        self.stats.snapshot()
    }

    pub fn is_watching(&self, path: impl AsRef<Path>) -> bool {
        self.registry.contains(path.as_ref())
    }

    /// Watched paths in sorted order
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        self.registry.paths()
    }

    pub fn watched_count(&self) -> usize {
        self.registry.len()
    }

    /// Next event from the pull outlet; `None` once closed and drained
    ///
    /// Only fed when no handler is configured.
    pub fn event(&self) -> Option<Event> {
        self.event_rx.recv().ok()
    }

    pub fn try_event(&self) -> Option<Event> {
        self.event_rx.try_recv().ok()
    }

    pub fn event_timeout(&self, timeout: Duration) -> Option<Event> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    pub fn event_chan(&self) -> Receiver<Event> {
        self.event_rx.clone()
    }

    /// Next batch from the pull outlet
    ///
    /// Batching requires a handler, so in practice this outlet stays empty.
    /// It mirrors [`Watcher::event`].
    pub fn batch(&self) -> Option<Vec<Event>> {
        self.batch_rx.recv().ok()
    }

    pub fn try_batch(&self) -> Option<Vec<Event>> {
        self.batch_rx.try_recv().ok()
    }

    pub fn batch_chan(&self) -> Receiver<Vec<Event>> {
        self.batch_rx.clone()
    }

    fn sync_counts(&self) {
        let (files, dirs) = self.registry.counts();
        self.stats.set_watched(files, dirs);
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        if let Some(run) = self.control.get_mut().run.take() {
            self.finish(run);
        }
    }
}
