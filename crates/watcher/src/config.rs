//! Watcher configuration

use crate::batch::BatchConfig;
use crate::debounce::DebounceConfig;
use crate::error::WatchError;
use crate::event::Event;
use crate::filter::Filter;
use std::fmt;
use std::sync::Arc;

/// Callback receiving delivered events
pub type Handler = Arc<dyn Fn(Vec<Event>) + Send + Sync>;

/// Callback receiving runtime errors from the event source
pub type ErrorHandler = Arc<dyn Fn(&WatchError) + Send + Sync>;

/// Default capacity of the raw channels and the pull outlets
pub const DEFAULT_BUFFER_SIZE: usize = 100;

/// Everything a watcher run needs besides the path set
#[derive(Clone)]
pub struct Config {
    pub filter: Filter,
    pub debounce: DebounceConfig,
    pub batch: BatchConfig,
    pub handler: Option<Handler>,
    pub error_handler: Option<ErrorHandler>,
    pub buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            filter: Filter::default(),
            debounce: DebounceConfig::default(),
            batch: BatchConfig::default(),
            handler: None,
            error_handler: None,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl Config {
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_debounce(mut self, debounce: DebounceConfig) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_batch(mut self, batch: BatchConfig) -> Self {
        self.batch = batch;
        self
    }

    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(Vec<Event>) + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }

    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&WatchError) + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("filter", &self.filter)
            .field("debounce", &self.debounce)
            .field("batch", &self.batch)
            .field("handler", &self.handler.is_some())
            .field("error_handler", &self.error_handler.is_some())
            .field("buffer_size", &self.buffer_size)
            .finish()
    }
}

/// Serialize a `Duration` as whole milliseconds
pub(crate) mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
