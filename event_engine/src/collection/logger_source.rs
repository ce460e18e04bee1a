use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use super::source::{CollectionView, LogFileSpec, SourceAdapter};
use crate::error::{EventError, Result};
use crate::logger::{EventLogger, LoggerInstance, Writer, WriterFile};
use crate::record::Record;

/// Plugs an [`EventLogger`] into a collection.
///
/// When configured it opens `<collection>_<format>_<id>.log` in the
/// collection's logs dir and attaches a writer for it to the logger; when
/// finalised it detaches and closes that writer.
#[derive(Debug)]
pub struct LoggerSource {
    name: String,
    logger: Arc<EventLogger>,
    view: Option<CollectionView>,
    path: Option<PathBuf>,
    writer: Option<String>,
}

impl LoggerSource {
    pub fn new(logger: Arc<EventLogger>) -> Self {
        Self {
            name: logger.name().to_string(),
            logger,
            view: None,
            path: None,
            writer: None,
        }
    }

    pub fn event_logger(&self) -> &Arc<EventLogger> {
        &self.logger
    }

    /// The file this source writes to, once configured
    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }

    /// A logger instance with the collection and unit prefilled.
    ///
    /// Before the source joins a collection nothing is prefilled.
    pub fn event_logger_instance(&self) -> LoggerInstance {
        match &self.view {
            Some(view) => self.logger.prefill_with(
                Record::new()
                    .collection(view.collection.clone())
                    .unit(self.name.clone()),
            ),
            None => self.logger.prefill_with(Record::new()),
        }
    }
}

impl SourceAdapter for LoggerSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn configure(&mut self, view: CollectionView) {
        self.view = Some(view);
    }

    fn configure_plugin(&mut self) -> Result<()> {
        let view = self
            .view
            .as_ref()
            .ok_or_else(|| EventError::source(&self.name, "not configured with a collection"))?;

        let path = match &self.path {
            Some(path) => path.clone(),
            None => {
                let id = Uuid::new_v4().to_string();
                let file_name = format!(
                    "{}_{}_{}.log",
                    view.collection,
                    view.log_format,
                    &id[id.len() - 8..]
                );
                view.logs_dir.join(file_name)
            }
        };

        let file = WriterFile::create(&path)?;
        let writer_name = format!("{}:{}", view.log_format, path.display());
        let writer = Writer::new(writer_name.clone(), view.log_format, file)?;
        self.logger.add_writers([writer]);
        debug!(source = %self.name, file = %path.display(), "event logger attached to log file");

        self.path = Some(path);
        self.writer = Some(writer_name);
        Ok(())
    }

    fn finalise(&mut self) -> Result<()> {
        let Some(writer_name) = self.writer.take() else {
            if self.path.is_none() {
                warn!(source = %self.name, "logger source has no writer to finalise");
            }
            return Ok(());
        };
        if let Some(mut writer) = self.logger.remove_writer(&writer_name) {
            writer
                .close()
                .map_err(|source| EventError::Writer { name: writer_name, source })?;
        }
        Ok(())
    }

    fn log_files(&self) -> Vec<LogFileSpec> {
        match (&self.view, &self.path) {
            (Some(view), Some(path)) => vec![LogFileSpec {
                name: self.name.clone(),
                format: view.log_format,
                path: path.clone(),
            }],
            _ => Vec::new(),
        }
    }

    // The file lives in the collection's logs dir; the collection owns it.
    fn clean_up(&mut self) -> Result<()> {
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        let result = self.finalise();
        self.view = None;
        self.path = None;
        result
    }
}
