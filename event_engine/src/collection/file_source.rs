use std::path::PathBuf;

use tracing::warn;

use super::source::{CollectionView, LogFileSpec, SourceAdapter};
use crate::codec::WireFormat;
use crate::error::Result;

/// Log files written by some other producer, joined into a collection as-is.
///
/// The files are assumed to be in the collection's format unless a format
/// is given explicitly.
#[derive(Debug, Clone)]
pub struct FileSource {
    name: String,
    files: Vec<PathBuf>,
    format: Option<WireFormat>,
    view: Option<CollectionView>,
}

impl FileSource {
    pub fn new(name: impl Into<String>, files: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            name: name.into(),
            files: files.into_iter().map(Into::into).collect(),
            format: None,
            view: None,
        }
    }

    pub fn with_format(mut self, format: WireFormat) -> Self {
        self.format = Some(format);
        self
    }

    fn format(&self) -> Option<WireFormat> {
        self.format.or_else(|| self.view.as_ref().map(|v| v.log_format))
    }
}

impl SourceAdapter for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn configure(&mut self, view: CollectionView) {
        self.view = Some(view);
    }

    fn configure_plugin(&mut self) -> Result<()> {
        for file in &self.files {
            if !file.is_file() {
                warn!(source = %self.name, file = %file.display(), "log file doesn't exist yet");
            }
        }
        Ok(())
    }

    fn finalise(&mut self) -> Result<()> {
        Ok(())
    }

    fn log_files(&self) -> Vec<LogFileSpec> {
        let format = self.format().unwrap_or_default();
        self.files
            .iter()
            .map(|path| LogFileSpec {
                name: self.name.clone(),
                format,
                path: path.clone(),
            })
            .collect()
    }

    fn clean_up(&mut self) -> Result<()> {
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.view = None;
        Ok(())
    }
}
