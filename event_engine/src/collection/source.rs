use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::codec::WireFormat;
use crate::error::Result;

/// What a collection tells its sources when they join
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionView {
    pub collection: String,
    pub logs_dir: PathBuf,
    pub log_format: WireFormat,
}

/// One log file handed over by a source
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogFileSpec {
    pub name: String,
    pub format: WireFormat,
    pub path: PathBuf,
}

/// A producer of log files that can be plugged into a collection.
///
/// The collection drives the lifecycle: `configure` then `configure_plugin`
/// once when the source is added, `finalise` before the files are read,
/// `clean_up` when the run is over. `finalise` and `clean_up` may be called
/// more than once.
pub trait SourceAdapter: Send {
    fn name(&self) -> &str;

    fn configure(&mut self, view: CollectionView);

    /// Open files, attach writers, start remote producers.
    fn configure_plugin(&mut self) -> Result<()>;

    /// Stop producing and make sure every file is complete and local.
    fn finalise(&mut self) -> Result<()>;

    fn log_files(&self) -> Vec<LogFileSpec>;

    fn clean_up(&mut self) -> Result<()>;

    /// Forget the collection so the source can be added to another one.
    fn reset(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Sources are shared between the collection and whoever created them.
pub type SharedSource = Arc<Mutex<dyn SourceAdapter>>;

pub fn shared<S: SourceAdapter + 'static>(source: S) -> Arc<Mutex<S>> {
    Arc::new(Mutex::new(source))
}
