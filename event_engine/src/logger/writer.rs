//! Writers: a wire format bound to a sink
//!
//! An [`EventLogger`](super::EventLogger) only knows writers. Writers don't
//! know file names; [`WriterFile`] owns a log file on a writer's behalf.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, trace, warn, Level};

use crate::codec::WireFormat;
use crate::error::{EventError, Result};
use crate::record::Record;

/// Destination for formatted event lines
pub trait EventSink: Send {
    fn write_line(&mut self, line: &str) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Release the sink. Must be safe to call more than once.
    fn close(&mut self) -> io::Result<()> {
        self.flush()
    }
}

/// A log file written on behalf of a writer
pub struct WriterFile {
    path: PathBuf,
    handle: Option<BufWriter<File>>,
}

impl WriterFile {
    /// Create (or truncate) the file at `path`
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(|e| EventError::io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            handle: Some(BufWriter::new(file)),
        })
    }

    /// Open the file at `path` for appending, creating it if needed
    pub fn append(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| EventError::io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            handle: Some(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_none()
    }
}

impl EventSink for WriterFile {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        let handle = self
            .handle
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "log file is closed"))?;
        handle.write_all(line.as_bytes())?;
        if !line.ends_with('\n') {
            handle.write_all(b"\n")?;
        }
        handle.flush()
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.handle.as_mut() {
            Some(handle) => handle.flush(),
            None => Ok(()),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        match self.handle.take() {
            Some(mut handle) => handle.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for WriterFile {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(file = %self.path.display(), error = %e, "failed to flush event log on drop");
        }
    }
}

/// Writes lines to the process stdout
pub struct StdoutSink;

impl EventSink for StdoutSink {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", line.trim_end_matches('\n'))?;
        stdout.flush()
    }
}

/// Forwards lines to the `tracing` log at a fixed level
pub struct TracingSink {
    level: Level,
}

impl TracingSink {
    pub fn new(level: Level) -> Self {
        Self { level }
    }
}

impl EventSink for TracingSink {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        let line = line.trim_end();
        if line.is_empty() {
            return Ok(());
        }
        if self.level == Level::ERROR {
            error!("(events): '{}'", line);
        } else if self.level == Level::WARN {
            warn!("(events): '{}'", line);
        } else if self.level == Level::INFO {
            info!("(events): '{}'", line);
        } else if self.level == Level::DEBUG {
            debug!("(events): '{}'", line);
        } else {
            trace!("(events): '{}'", line);
        }
        Ok(())
    }
}

/// Keeps lines in memory; clones share the same buffer
#[derive(Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

impl EventSink for MemorySink {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.lines.lock().push(line.trim_end_matches('\n').to_string());
        Ok(())
    }
}

/// A named wire format + sink pair registered on an event logger
pub struct Writer {
    name: String,
    format: WireFormat,
    sink: Box<dyn EventSink>,
}

impl Writer {
    /// Build a writer; CSV writers put their header line out immediately.
    pub fn new(
        name: impl Into<String>,
        format: WireFormat,
        sink: impl EventSink + 'static,
    ) -> Result<Self> {
        let name = name.into();
        let mut sink: Box<dyn EventSink> = Box::new(sink);
        if let Some(header) = format.header() {
            sink.write_line(&header).map_err(|source| EventError::Writer {
                name: name.clone(),
                source,
            })?;
        }
        Ok(Self { name, format, sink })
    }

    /// Writer named after its format
    pub fn for_format(format: WireFormat, sink: impl EventSink + 'static) -> Result<Self> {
        Self::new(format.as_str(), format, sink)
    }

    /// Writer for a sink that already carries its header, e.g. a log file
    /// being appended to.
    pub fn resume(name: impl Into<String>, format: WireFormat, sink: impl EventSink + 'static) -> Self {
        Self {
            name: name.into(),
            format,
            sink: Box::new(sink),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn format(&self) -> WireFormat {
        self.format
    }

    pub fn write(&mut self, record: &Record) -> io::Result<()> {
        let line = self.format.format(record);
        self.sink.write_line(&line)
    }

    pub fn close(&mut self) -> io::Result<()> {
        self.sink.close()
    }
}

impl fmt::Debug for Writer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Writer")
            .field("name", &self.name)
            .field("format", &self.format)
            .finish()
    }
}
