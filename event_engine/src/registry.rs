//! Named collections, loggers and logger sources shared across a process

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::collection::{Collection, LoggerSource};
use crate::logger::{EventLogger, LoggerInstance};
use crate::record::Record;

/// Name used when callers don't pick one
pub const DEFAULT_NAME: &str = "DEFAULT";

/// Looks things up by name, creating them on first use.
///
/// The same name always yields the same shared object.
#[derive(Debug, Default)]
pub struct Registry {
    collections: Mutex<HashMap<String, Arc<Mutex<Collection>>>>,
    loggers: Mutex<HashMap<String, Arc<EventLogger>>>,
    logger_sources: Mutex<HashMap<String, Arc<Mutex<LoggerSource>>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collection(&self, name: &str) -> Arc<Mutex<Collection>> {
        self.collections
            .lock()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Collection::new(name))))
            .clone()
    }

    pub fn logger(&self, name: &str) -> Arc<EventLogger> {
        self.loggers
            .lock()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(EventLogger::new(name)))
            .clone()
    }

    /// The source that plugs the logger of the same name into a collection
    pub fn logger_source(&self, name: &str) -> Arc<Mutex<LoggerSource>> {
        let logger = self.logger(name);
        self.logger_sources
            .lock()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(LoggerSource::new(logger))))
            .clone()
    }

    /// Every logger created so far
    pub fn loggers(&self) -> Vec<Arc<EventLogger>> {
        self.loggers.lock().values().cloned().collect()
    }

    pub fn logger_instance(&self, name: &str, fields: Record) -> LoggerInstance {
        self.logger(name).prefill_with(fields)
    }
}
