use std::{fmt, io, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("unknown log format: {0} (expected one of CSV, LOG, InfluxDB)")]
    UnknownFormat(String),
    #[error("unknown precision: {0} (expected one of s, ms, us, ns)")]
    UnknownPrecision(String),
    #[error("unknown event kind: {0}")]
    UnknownEvent(String),
    #[error("log files in collection don't share one format: expected {expected}, found {found} in {source_name}")]
    MixedFormats {
        expected: String,
        found: String,
        source_name: String,
    },
    #[error("timestamp parse error: {0}")]
    Timestamp(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("source {name} failed: {details}")]
    Source { name: String, details: String },
    #[error("upload error: {0}")]
    Upload(String),
    #[error("io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("writer {name} failed: {source}")]
    Writer {
        name: String,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, EventError>;

impl EventError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn timestamp(details: impl fmt::Display) -> Self {
        Self::Timestamp(details.to_string())
    }

    pub fn config(details: impl fmt::Display) -> Self {
        Self::Config(details.to_string())
    }

    pub fn source(name: impl Into<String>, details: impl fmt::Display) -> Self {
        Self::Source {
            name: name.into(),
            details: details.to_string(),
        }
    }
}

impl From<serde_json::Error> for EventError {
    fn from(err: serde_json::Error) -> Self {
        EventError::Config(err.to_string())
    }
}
