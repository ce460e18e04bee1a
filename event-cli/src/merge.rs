use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use event_engine::{MergedEvents, Precision, StreamOptions, Streamer, WireFormat};
use tracing::info;

use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct MergeArgs {
    /// Wire format shared by every file (CSV, LOG or InfluxDB)
    #[arg(short, long, default_value = "InfluxDB")]
    pub format: WireFormat,

    /// Stream the files one after another instead of merging by timestamp
    #[arg(long)]
    pub no_sort: bool,

    /// Precision InfluxDB timestamps are re-based to (s, ms, us, ns)
    #[arg(short, long, default_value = "us")]
    pub precision: Precision,

    /// Keep the precision suffix on re-based InfluxDB timestamps
    #[arg(long)]
    pub keep_precision: bool,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text")]
    pub output: OutputFormat,

    /// Log files to merge
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

impl MergeArgs {
    pub fn stream_options(&self) -> StreamOptions {
        StreamOptions {
            sort: !self.no_sort,
            precision: self.precision,
            strip_precision: !self.keep_precision,
        }
    }
}

pub fn run(args: MergeArgs) -> Result<()> {
    let streamer = Streamer::new(args.files.clone(), args.format, args.stream_options());
    let count = write_events(streamer.open(), args.output, io::stdout().lock())?;
    info!(events = count, files = args.files.len(), "merge finished");
    Ok(())
}

/// Print every event; returns how many were printed.
pub fn write_events(events: MergedEvents, format: OutputFormat, out: impl Write) -> Result<usize> {
    let mut out = BufWriter::new(out);
    let mut count = 0;
    for (file, line) in events {
        writeln!(out, "{}", output::format_event(&file, &line, format)).context("failed to write event")?;
        count += 1;
    }
    out.flush().context("failed to flush output")?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn write_events__two_files__then_merged_text() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.log");
        let b = dir.path().join("b.log");
        fs::write(&a, "m v=1 1s\nm v=3 3s\n").unwrap();
        fs::write(&b, "m v=2 2s\n").unwrap();

        let args = MergeArgs {
            format: WireFormat::InfluxDb,
            no_sort: false,
            precision: Precision::Seconds,
            keep_precision: true,
            output: OutputFormat::Text,
            files: vec![a, b],
        };
        let streamer = Streamer::new(args.files.clone(), args.format, args.stream_options());

        let mut buf = Vec::new();
        let count = write_events(streamer.open(), args.output, &mut buf).unwrap();

        assert_eq!(count, 3);
        assert_eq!(String::from_utf8(buf).unwrap(), "m v=1 1s\nm v=2 2s\nm v=3 3s\n");
    }

    #[test]
    fn stream_options__flags__then_inverted() {
        let args = MergeArgs {
            format: WireFormat::Log,
            no_sort: true,
            precision: Precision::Nanos,
            keep_precision: false,
            output: OutputFormat::Json,
            files: Vec::new(),
        };
        let options = args.stream_options();
        assert!(!options.sort);
        assert!(options.strip_precision);
        assert_eq!(options.precision, Precision::Nanos);
    }
}
