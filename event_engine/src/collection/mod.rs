//! Collections: the sources of one run and the files they produce
//!
//! A [`Collection`] owns the lifecycle of its sources. Every source writes
//! in the collection's wire format, into the collection's logs dir, and is
//! configured once no matter how often it is added. Once the run is over
//! the collection finalises the sources and streams their files merged by
//! timestamp:
//!
//! ```no_run
//! use std::sync::Arc;
//! use event_engine::{shared, Collection, CollectionConfig, EventLogger, LoggerSource, StreamOptions};
//!
//! let mut collection = Collection::new("DEFAULT");
//! collection.configure(CollectionConfig::new().collection("upgrade"));
//! let source = shared(LoggerSource::new(Arc::new(EventLogger::new("DEFAULT"))));
//! collection.add_source(source).unwrap();
//!
//! // ... run the test ...
//!
//! collection.finalise().unwrap();
//! for (file, line) in collection.events(StreamOptions::default()).unwrap() {
//!     println!("{}: {line}", file.display());
//! }
//! ```

mod file_source;
mod logger_source;
mod source;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::codec::WireFormat;
use crate::error::{EventError, Result};
use crate::streamer::{StreamOptions, Streamer};

pub use file_source::FileSource;
pub use logger_source::LoggerSource;
pub use source::{shared, CollectionView, LogFileSpec, SharedSource, SourceAdapter};

/// Settings applied by [`Collection::configure`]; unset fields are left alone
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionConfig {
    pub collection: Option<String>,
    pub description: Option<String>,
    pub logs_dir: Option<PathBuf>,
    pub log_format: Option<WireFormat>,
}

impl CollectionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn logs_dir(mut self, logs_dir: impl Into<PathBuf>) -> Self {
        self.logs_dir = Some(logs_dir.into());
        self
    }

    pub fn log_format(mut self, log_format: WireFormat) -> Self {
        self.log_format = Some(log_format);
        self
    }
}

pub struct Collection {
    name: String,
    collection: Option<String>,
    description: Option<String>,
    logs_dir: Option<PathBuf>,
    temp_dir: Option<TempDir>,
    log_format: WireFormat,
    sources: Vec<SharedSource>,
    finalised: bool,
    cleaned_up: bool,
}

impl Collection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collection: None,
            description: None,
            logs_dir: None,
            temp_dir: None,
            log_format: WireFormat::default(),
            sources: Vec::new(),
            finalised: false,
            cleaned_up: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name the sources log under; falls back to the collection's own name
    pub fn collection(&self) -> &str {
        self.collection.as_deref().unwrap_or(&self.name)
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn log_format(&self) -> WireFormat {
        self.log_format
    }

    /// The logs dir, if one was configured or already created
    pub fn logs_dir(&self) -> Option<&Path> {
        self.logs_dir
            .as_deref()
            .or_else(|| self.temp_dir.as_ref().map(TempDir::path))
    }

    pub fn sources(&self) -> &[SharedSource] {
        &self.sources
    }

    pub fn configure(&mut self, config: CollectionConfig) {
        if let Some(collection) = config.collection {
            self.collection = Some(collection);
        }
        if let Some(description) = config.description {
            self.description = Some(description);
        }
        if let Some(logs_dir) = config.logs_dir {
            self.logs_dir = Some(logs_dir);
        }
        if let Some(log_format) = config.log_format {
            self.log_format = log_format;
        }
    }

    /// Configured logs dir, or a private temporary one made on first use.
    fn ensure_logs_dir(&mut self) -> Result<PathBuf> {
        if let Some(dir) = self.logs_dir() {
            return Ok(dir.to_path_buf());
        }
        let temp_dir = tempfile::Builder::new()
            .prefix("events-")
            .tempdir()
            .map_err(|e| EventError::io(std::env::temp_dir(), e))?;
        debug!(collection = %self.name, dir = %temp_dir.path().display(), "created temporary logs dir");
        let path = temp_dir.path().to_path_buf();
        self.temp_dir = Some(temp_dir);
        Ok(path)
    }

    fn view(&mut self) -> Result<CollectionView> {
        Ok(CollectionView {
            logs_dir: self.ensure_logs_dir()?,
            collection: self.collection().to_string(),
            log_format: self.log_format,
        })
    }

    /// Add a source. Returns false if this exact source was already added.
    ///
    /// A source that fails to configure is not kept.
    pub fn add_source(&mut self, source: SharedSource) -> Result<bool> {
        if self.sources.iter().any(|s| Arc::ptr_eq(s, &source)) {
            debug!(collection = %self.name, source = %source.lock().name(), "source added more than once, ignoring");
            return Ok(false);
        }
        let view = self.view()?;
        {
            let mut adapter = source.lock();
            adapter.configure(view);
            adapter.configure_plugin()?;
            info!(collection = %self.name, source = %adapter.name(), "source added");
        }
        self.sources.push(source);
        self.finalised = false;
        self.cleaned_up = false;
        Ok(true)
    }

    /// Tell every source to finish its files. Idempotent.
    ///
    /// Every source is visited even if one fails; the first error is returned.
    pub fn finalise(&mut self) -> Result<()> {
        if self.finalised {
            return Ok(());
        }
        let result = broadcast(&self.sources, "finalise", |s| s.finalise());
        self.finalised = true;
        result
    }

    /// Tell every source to release what it holds. Idempotent.
    pub fn clean_up(&mut self) -> Result<()> {
        if self.cleaned_up {
            return Ok(());
        }
        let result = broadcast(&self.sources, "clean up", |s| s.clean_up());
        self.cleaned_up = true;
        result
    }

    /// Every source's log files, in the order the sources were added.
    ///
    /// Finalises the collection first if needed.
    pub fn log_files(&mut self) -> Vec<LogFileSpec> {
        if let Err(e) = self.finalise() {
            warn!(collection = %self.name, error = %e, "collecting log files of a partially finalised collection");
        }
        self.sources
            .iter()
            .flat_map(|source| source.lock().log_files())
            .collect()
    }

    /// Stream the events of every log file.
    ///
    /// All files have to share one wire format.
    pub fn events(&mut self, options: StreamOptions) -> Result<Streamer> {
        let specs = self.log_files();
        let Some(first) = specs.first() else {
            return Ok(Streamer::new(Vec::new(), self.log_format, options));
        };
        let format = first.format;
        if let Some(odd) = specs.iter().find(|spec| spec.format != format) {
            return Err(EventError::MixedFormats {
                expected: format.to_string(),
                found: odd.format.to_string(),
                source_name: odd.name.clone(),
            });
        }
        let files = specs.into_iter().map(|spec| spec.path).collect();
        Ok(Streamer::new(files, format, options))
    }

    /// Reset every source, drop them and forget the configuration.
    ///
    /// A temporary logs dir is deleted along with its files.
    pub fn reset(&mut self) -> Result<()> {
        let result = broadcast(&self.sources, "reset", |s| s.reset());
        self.sources.clear();
        self.collection = None;
        self.description = None;
        self.logs_dir = None;
        self.log_format = WireFormat::default();
        self.finalised = false;
        self.cleaned_up = false;
        if let Some(temp_dir) = self.temp_dir.take() {
            let path = temp_dir.path().to_path_buf();
            if let Err(e) = temp_dir.close() {
                warn!(dir = %path.display(), error = %e, "couldn't remove temporary logs dir");
            }
        }
        result
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("collection", &self.collection)
            .field("log_format", &self.log_format)
            .field("logs_dir", &self.logs_dir())
            .field("sources", &self.sources.len())
            .finish()
    }
}

fn broadcast(
    sources: &[SharedSource],
    action: &str,
    mut f: impl FnMut(&mut dyn SourceAdapter) -> Result<()>,
) -> Result<()> {
    let mut first_error = None;
    for source in sources {
        let mut adapter = source.lock();
        if let Err(e) = f(&mut *adapter) {
            warn!(source = %adapter.name(), error = %e, "source failed to {action}");
            first_error.get_or_insert(e);
        }
    }
    first_error.map_or(Ok(()), Err)
}
