//! The dispatch loop
//!
//! One worker owns the debounce and batch engines outright. It multiplexes
//! raw events, raw errors, the stop signal and the next engine deadline in a
//! single `select!`, so no lock is held while a handler runs.

use crate::batch::Batcher;
use crate::config::{ErrorHandler, Handler};
use crate::debounce::Debouncer;
use crate::error::WatchError;
use crate::event::{Event, EventType};
use crate::filter::{CompiledFilter, FsMetadata};
use crate::source::{RawEvent, RawSource, RawStreams};
use crate::state::Lifecycle;
use crate::stats::StatsCollector;
use chrono::Utc;
use crossbeam_channel::{at, never, select, Receiver, Sender, TrySendError};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};

/// Where delivered events go when no handler is configured
#[derive(Clone)]
pub(crate) struct Outlets {
    pub events: Sender<Event>,
    pub batches: Sender<Vec<Event>>,
    pub capacity: usize,
}

enum Step {
    Stop,
    Raw(RawEvent),
    EventsClosed,
    Error(WatchError),
    ErrorsClosed,
    Tick,
}

pub(crate) struct Dispatcher {
    pub filter: CompiledFilter,
    pub debouncer: Option<Debouncer>,
    pub batcher: Option<Batcher>,
    pub handler: Option<Handler>,
    pub error_handler: Option<ErrorHandler>,
    pub outlets: Outlets,
    pub lifecycle: Arc<Lifecycle>,
    pub stats: Arc<StatsCollector>,
    /// Source handed back by a stop issued from inside a callback; the
    /// worker closes it and settles the lifecycle once drained
    pub handoff: Receiver<Box<dyn RawSource>>,
}

impl Dispatcher {
    /// Run until `stop` fires or disconnects, then flush everything pending
    pub fn run(mut self, streams: RawStreams, stop: Receiver<()>) {
        let RawStreams {
            mut events,
            mut errors,
        } = streams;
        debug!("dispatch loop started");

        loop {
            let timer = match self.next_deadline() {
                Some(deadline) => at(deadline),
                None => never(),
            };

            let step = select! {
                recv(stop) -> _ => Step::Stop,
                recv(events) -> msg => msg.map_or(Step::EventsClosed, Step::Raw),
                recv(errors) -> msg => msg.map_or(Step::ErrorsClosed, Step::Error),
                recv(timer) -> _ => Step::Tick,
            };

            match step {
                Step::Stop => break,
                Step::Raw(raw) => self.on_raw(raw),
                Step::Error(err) => self.on_error(err),
                Step::Tick => self.on_timer(Instant::now()),
                Step::EventsClosed => {
                    debug!("raw event stream closed");
                    events = never();
                }
                Step::ErrorsClosed => errors = never(),
            }
        }

        // Whatever the source already queued still counts
        for raw in events.try_iter() {
            self.on_raw(raw);
        }
        self.shutdown();

        if let Ok(mut source) = self.handoff.try_recv() {
            if let Err(e) = source.close() {
                warn!(error = %e, "failed to close event source");
            }
            self.lifecycle.mark_stopped();
            info!("watcher stopped");
        }
        debug!("dispatch loop exited");
    }

    fn next_deadline(&self) -> Option<Instant> {
        let debounce = self.debouncer.as_ref().and_then(Debouncer::deadline);
        let batch = self.batcher.as_ref().and_then(Batcher::deadline);
        match (debounce, batch) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn on_raw(&mut self, raw: RawEvent) {
        let Some(event_type) = EventType::from_op(raw.op) else {
            trace!(path = %raw.path.display(), op = %raw.op, "ignoring raw event without known op");
            return;
        };
        // Every accepted event counts; dropped is a subset of total
        self.stats.record_event();

        if self.lifecycle.should_discard(raw.received) {
            trace!(path = %raw.path.display(), "discarding event while paused");
            self.stats.record_dropped();
            return;
        }

        // Stamp with the receive time, not the dequeue time
        let age = chrono::Duration::from_std(raw.received.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        let event = Event::new(event_type, raw.path)
            .with_old_path(raw.old_path)
            .with_timestamp(Utc::now() - age);
        if !self.filter.matches(&event, &FsMetadata) {
            trace!(%event, "filtered");
            self.stats.record_dropped();
            return;
        }

        let now = Instant::now();
        if let Some(debouncer) = self.debouncer.as_mut() {
            trace!(%event, "debouncing");
            debouncer.push(event, now);
            self.stats.record_debounced();
        } else if let Some(batcher) = self.batcher.as_mut() {
            trace!(%event, "batching");
            self.stats.record_batched();
            if let Some(batch) = batcher.push(event, now) {
                self.deliver_batch(batch);
            }
        } else {
            self.deliver_event(event);
        }
    }

    pub fn on_timer(&mut self, now: Instant) {
        let debounced = self
            .debouncer
            .as_mut()
            .map(|d| d.flush_due(now))
            .unwrap_or_default();
        if !debounced.is_empty() {
            debug!(count = debounced.len(), "debounce sweep");
        }
        for event in debounced {
            self.deliver_event(event);
        }

        if let Some(batch) = self.batcher.as_mut().and_then(|b| b.flush_due(now)) {
            debug!(size = batch.len(), "timed batch flush");
            self.deliver_batch(batch);
        }
    }

    pub fn on_error(&mut self, err: WatchError) {
        self.stats.record_error();
        if self.lifecycle.fail() {
            warn!(code = err.code(), "watcher entered error state");
        }
        self.report(&err);
    }

    /// Flush pending debounce groups and the partial batch
    fn shutdown(&mut self) {
        let debounced = self
            .debouncer
            .as_mut()
            .map(Debouncer::drain)
            .unwrap_or_default();
        for event in debounced {
            self.deliver_event(event);
        }
        if let Some(batch) = self.batcher.as_mut().and_then(Batcher::drain) {
            self.deliver_batch(batch);
        }
        info!(stats = ?self.stats.snapshot(), "dispatch drained");
    }

    fn deliver_event(&mut self, event: Event) {
        if let Some(handler) = self.handler.clone() {
            self.invoke(&handler, vec![event]);
            return;
        }

        match self.outlets.events.try_send(event) {
            Ok(()) => self.stats.record_delivered(1),
            Err(TrySendError::Full(event)) => {
                self.stats.record_dropped();
                let err = WatchError::BufferOverflow {
                    capacity: self.outlets.capacity,
                    path: event.path().to_path_buf(),
                };
                self.report(&err);
            }
            Err(TrySendError::Disconnected(_)) => self.stats.record_dropped(),
        }
    }

    fn deliver_batch(&mut self, batch: Vec<Event>) {
        if let Some(handler) = self.handler.clone() {
            self.invoke(&handler, batch);
            return;
        }

        let size = batch.len();
        match self.outlets.batches.try_send(batch) {
            Ok(()) => self.stats.record_delivered(size),
            Err(TrySendError::Full(batch)) => {
                self.stats.record_dropped_many(size);
                let path = batch
                    .first()
                    .map(|e| e.path().to_path_buf())
                    .unwrap_or_default();
                let err = WatchError::BufferOverflow {
                    capacity: self.outlets.capacity,
                    path,
                };
                self.report(&err);
            }
            Err(TrySendError::Disconnected(_)) => {
                self.stats.record_dropped_many(size);
            }
        }
    }

    fn invoke(&self, handler: &Handler, events: Vec<Event>) {
        self.stats.record_delivered(events.len());
        if catch_unwind(AssertUnwindSafe(|| handler(events))).is_err() {
            error!("event handler panicked");
        }
    }

    fn report(&self, err: &WatchError) {
        match &self.error_handler {
            Some(handler) => {
                if catch_unwind(AssertUnwindSafe(|| handler(err))).is_err() {
                    error!("error handler panicked");
                }
            }
            None => warn!(code = err.code(), error = %err, "watcher error"),
        }
    }
}
