//! Merge streaming of per-source log files

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, VecDeque};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::codec::{rebase_precision, Precision, WireFormat};

/// How a merged stream is produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOptions {
    /// Merge by timestamp; otherwise files are streamed one after another.
    pub sort: bool,
    /// Precision InfluxDB timestamps are re-based to.
    pub precision: Precision,
    /// Leave the precision suffix off re-based timestamps.
    pub strip_precision: bool,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            sort: true,
            precision: Precision::Micros,
            strip_precision: true,
        }
    }
}

/// Streams events from a set of log files sharing one wire format
#[derive(Debug, Clone)]
pub struct Streamer {
    files: Vec<PathBuf>,
    format: WireFormat,
    options: StreamOptions,
}

impl Streamer {
    pub fn new(files: Vec<PathBuf>, format: WireFormat, options: StreamOptions) -> Self {
        Self {
            files,
            format,
            options,
        }
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn format(&self) -> WireFormat {
        self.format
    }

    pub fn options(&self) -> StreamOptions {
        self.options
    }

    /// Open every file and start merging.
    ///
    /// Files that can't be opened are reported and left out.
    pub fn open(&self) -> MergedEvents {
        MergedEvents::new(&self.files, self.format, self.options)
    }
}

impl IntoIterator for Streamer {
    type Item = (PathBuf, String);
    type IntoIter = MergedEvents;

    fn into_iter(self) -> MergedEvents {
        self.open()
    }
}

/// One line waiting to be yielded
#[derive(Debug)]
struct Candidate {
    at: DateTime<Utc>,
    seq: u64,
    file: usize,
    line: String,
}

// Equal timestamps keep the order they were read in.
impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.at, self.seq).cmp(&(other.at, other.seq))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

enum Pending {
    Sorted(BinaryHeap<Reverse<Candidate>>),
    InOrder(VecDeque<Candidate>),
}

impl Pending {
    fn pop(&mut self) -> Option<Candidate> {
        match self {
            Pending::Sorted(heap) => heap.pop().map(|Reverse(c)| c),
            Pending::InOrder(queue) => queue.pop_front(),
        }
    }

    /// Queue the next line of a file that was just yielded from.
    fn refill(&mut self, candidate: Candidate) {
        match self {
            Pending::Sorted(heap) => heap.push(Reverse(candidate)),
            Pending::InOrder(queue) => queue.push_front(candidate),
        }
    }
}

struct SourceFile {
    path: PathBuf,
    reader: Option<BufReader<File>>,
}

/// Iterator of `(file, line)` pairs over the merged files
///
/// Owns the open file handles; they are released when a file runs out, on
/// [`close`](MergedEvents::close), or when the iterator is dropped.
pub struct MergedEvents {
    format: WireFormat,
    options: StreamOptions,
    files: Vec<SourceFile>,
    pending: Pending,
    seq: u64,
}

impl MergedEvents {
    fn new(paths: &[PathBuf], format: WireFormat, options: StreamOptions) -> Self {
        let files = paths
            .iter()
            .filter_map(|path| match File::open(path) {
                Ok(file) => Some(SourceFile {
                    path: path.clone(),
                    reader: Some(BufReader::new(file)),
                }),
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "couldn't open log file");
                    None
                }
            })
            .collect::<Vec<_>>();

        let pending = if options.sort {
            Pending::Sorted(BinaryHeap::with_capacity(files.len()))
        } else {
            Pending::InOrder(VecDeque::with_capacity(files.len()))
        };
        let mut merged = Self {
            format,
            options,
            files,
            pending,
            seq: 0,
        };

        // Seed with the first line of every file.
        for idx in 0..merged.files.len() {
            if let Some(candidate) = merged.read_candidate(idx) {
                match &mut merged.pending {
                    Pending::Sorted(heap) => heap.push(Reverse(candidate)),
                    Pending::InOrder(queue) => queue.push_back(candidate),
                }
            }
        }
        merged
    }

    /// Number of files still open
    pub fn open_files(&self) -> usize {
        self.files.iter().filter(|f| f.reader.is_some()).count()
    }

    /// Release every handle and stop the stream. Safe to call repeatedly.
    pub fn close(&mut self) {
        for file in &mut self.files {
            if file.reader.take().is_some() {
                debug!(file = %file.path.display(), "closed log file");
            }
        }
        self.pending = match self.pending {
            Pending::Sorted(_) => Pending::Sorted(BinaryHeap::new()),
            Pending::InOrder(_) => Pending::InOrder(VecDeque::new()),
        };
    }

    /// Next usable line of file `idx`, or `None` once it is done.
    fn read_candidate(&mut self, idx: usize) -> Option<Candidate> {
        let format = self.format;
        let file = &mut self.files[idx];
        let mut buf = String::new();
        loop {
            let reader = file.reader.as_mut()?;
            buf.clear();
            match reader.read_line(&mut buf) {
                Ok(0) => {
                    file.reader = None;
                    debug!(file = %file.path.display(), "log file exhausted");
                    return None;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(file = %file.path.display(), error = %e, "couldn't read log file");
                    file.reader = None;
                    return None;
                }
            }

            let line = buf.trim_end();
            if line.is_empty() {
                continue;
            }
            if format.is_header(line) {
                debug!(file = %file.path.display(), "skipping header line");
                continue;
            }
            match format.parse_timestamp(line) {
                Ok(at) => {
                    self.seq += 1;
                    return Some(Candidate {
                        at,
                        seq: self.seq,
                        file: idx,
                        line: line.to_string(),
                    });
                }
                Err(e) => {
                    warn!(file = %file.path.display(), error = %e, "skipping line without a usable timestamp");
                }
            }
        }
    }

    fn render(&self, line: String) -> String {
        if self.format != WireFormat::InfluxDb {
            return line;
        }
        match rebase_precision(&line, self.options.precision, self.options.strip_precision) {
            Ok(rebased) => rebased,
            Err(e) => {
                warn!(error = %e, "couldn't re-base timestamp, passing line through");
                line
            }
        }
    }

    fn path(&self, idx: usize) -> &Path {
        &self.files[idx].path
    }
}

impl Iterator for MergedEvents {
    type Item = (PathBuf, String);

    fn next(&mut self) -> Option<Self::Item> {
        let Candidate { file, line, .. } = self.pending.pop()?;

        if let Some(next) = self.read_candidate(file) {
            self.pending.refill(next);
        }

        let path = self.path(file).to_path_buf();
        Some((path, self.render(line)))
    }
}

impl Drop for MergedEvents {
    fn drop(&mut self) {
        self.close();
    }
}
