//! Time-series event logging
//!
//! An [`EventLogger`] fans every event out, synchronously, to the writers
//! registered on it. A [`LoggerInstance`] is a cheap view on a logger with
//! some fields prefilled, so different parts of a test can each hold their
//! own scoped logger:
//!
//! ```
//! use std::sync::Arc;
//! use event_engine::{EventKind, EventLogger, MemorySink, Record, WireFormat, Writer};
//!
//! let logger = Arc::new(EventLogger::new("DEFAULT"));
//! let sink = MemorySink::new();
//! logger.add_writers([Writer::for_format(WireFormat::Log, sink.clone()).unwrap()]);
//!
//! let events = logger.prefill_with(Record::new().collection("upgrade").unit("test"));
//! let charm = events.prefill_with(Record::new().item("keystone"));
//! charm.log(EventKind::Start, Record::new());
//! charm.log(EventKind::Comment, Record::new().comment("set config"));
//! charm.log(EventKind::End, Record::new());
//!
//! assert_eq!(sink.lines().len(), 3);
//! ```

mod span;
mod writer;

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use crate::record::{EventKind, Record, Timestamp};

pub use span::{Span, SpanGuard};
pub use writer::{EventSink, MemorySink, StdoutSink, TracingSink, Writer, WriterFile};

/// Fans events out to named writers
#[derive(Debug)]
pub struct EventLogger {
    name: String,
    writers: Mutex<Vec<Writer>>,
}

impl EventLogger {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            writers: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register writers. A writer whose name is taken replaces the old one.
    pub fn add_writers(&self, writers: impl IntoIterator<Item = Writer>) {
        let mut current = self.writers.lock();
        for writer in writers {
            match current.iter_mut().find(|w| w.name() == writer.name()) {
                Some(existing) => {
                    warn!(logger = %self.name, writer = writer.name(), "replacing existing event writer");
                    if let Err(e) = existing.close() {
                        warn!(writer = existing.name(), error = %e, "failed to close replaced writer");
                    }
                    *existing = writer;
                }
                None => current.push(writer),
            }
        }
    }

    /// Unregister a writer and hand it back; unknown names only warn.
    pub fn remove_writer(&self, name: &str) -> Option<Writer> {
        let mut current = self.writers.lock();
        match current.iter().position(|w| w.name() == name) {
            Some(index) => Some(current.remove(index)),
            None => {
                warn!(logger = %self.name, writer = name, "writer doesn't exist, ignoring removal");
                None
            }
        }
    }

    pub fn writer_names(&self) -> Vec<String> {
        self.writers.lock().iter().map(|w| w.name().to_string()).collect()
    }

    /// Log one event to every writer.
    ///
    /// The timestamp defaults to now. Blocks until each writer has been
    /// given the line; a failing writer is reported and skipped.
    pub fn log(&self, event: EventKind, record: Record) {
        let mut record = record.event(event);
        if record.timestamp.is_none() {
            record.timestamp = Some(Timestamp::now());
        }
        let mut writers = self.writers.lock();
        for writer in writers.iter_mut() {
            if let Err(e) = writer.write(&record) {
                warn!(logger = %self.name, writer = writer.name(), error = %e, "failed to write event");
            }
        }
    }

    pub fn prefill_with(self: &Arc<Self>, fields: Record) -> LoggerInstance {
        LoggerInstance {
            logger: Arc::clone(self),
            prefilled: fields,
        }
    }

    pub fn span(self: &Arc<Self>, comment: Option<&str>, fields: Record) -> Span {
        self.prefill_with(Record::new()).span(comment, fields)
    }
}

/// A logger with prefilled fields
#[derive(Debug, Clone)]
pub struct LoggerInstance {
    logger: Arc<EventLogger>,
    prefilled: Record,
}

impl LoggerInstance {
    pub fn event_logger(&self) -> &Arc<EventLogger> {
        &self.logger
    }

    pub fn prefilled(&self) -> &Record {
        &self.prefilled
    }

    /// New instance with extra prefilled fields; this one is left alone.
    pub fn prefill_with(&self, fields: Record) -> LoggerInstance {
        LoggerInstance {
            logger: Arc::clone(&self.logger),
            prefilled: fields.merged_over(&self.prefilled),
        }
    }

    pub fn log(&self, event: EventKind, fields: Record) {
        self.logger.log(event, fields.merged_over(&self.prefilled));
    }

    pub fn span(&self, comment: Option<&str>, fields: Record) -> Span {
        Span::new(self.clone(), comment.map(str::to_string), fields)
    }
}
