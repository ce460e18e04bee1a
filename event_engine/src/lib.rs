//! Time-series event logging, collection and merge streaming
//!
//! Producers write timestamped events into their own log files in one of
//! three wire formats. A [`Collection`] gathers the sources of one run and
//! streams all their files as a single sequence ordered by timestamp, ready
//! to inspect or upload.

pub mod codec;
pub mod collection;
pub mod config;
pub mod error;
pub mod logger;
pub mod record;
pub mod registry;
pub mod streamer;
pub mod upload;

pub use codec::{Precision, WireFormat};
pub use collection::{
    shared, Collection, CollectionConfig, CollectionView, FileSource, LogFileSpec, LoggerSource,
    SharedSource, SourceAdapter,
};
pub use config::{auto_configure, expand_vars, run_context, Context, EventsConfig};
pub use error::{EventError, Result};
pub use logger::{
    EventLogger, EventSink, LoggerInstance, MemorySink, Span, SpanGuard, StdoutSink, TracingSink,
    Writer, WriterFile,
};
pub use record::{EventKind, Record, Timestamp};
pub use registry::{Registry, DEFAULT_NAME};
pub use streamer::{MergedEvents, StreamOptions, Streamer};
pub use upload::{
    upload, upload_all, BatchSink, HttpBatchSink, InfluxUploadSpec, UploadSpec, UploadSummary,
};
