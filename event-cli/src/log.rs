use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Args;
use event_engine::{EventKind, EventLogger, Record, WireFormat, Writer, WriterFile};
use tracing::debug;

#[derive(Args)]
pub struct LogArgs {
    /// Log file to append to; created (with a CSV header if needed) when missing
    #[arg(long)]
    pub file: PathBuf,

    /// Wire format of the log file (CSV, LOG or InfluxDB)
    #[arg(short, long, default_value = "InfluxDB")]
    pub format: WireFormat,

    /// Event kind, e.g. start, comment, span-begin, span-end, end, deploy-bundle, test-case
    #[arg(short, long)]
    pub event: EventKind,

    #[arg(long)]
    pub collection: Option<String>,

    #[arg(long)]
    pub unit: Option<String>,

    #[arg(long)]
    pub item: Option<String>,

    #[arg(long)]
    pub comment: Option<String>,

    /// Extra tag as key=value; may be repeated
    #[arg(long = "tag", value_parser = parse_tag)]
    pub tags: Vec<(String, String)>,
}

impl LogArgs {
    pub fn record(&self) -> Record {
        let mut record = Record::new();
        record.collection = self.collection.clone();
        record.unit = self.unit.clone();
        record.item = self.item.clone();
        record.comment = self.comment.clone();
        record.tags.extend(self.tags.iter().cloned());
        record
    }
}

fn parse_tag(value: &str) -> std::result::Result<(String, String), String> {
    match value.split_once('=') {
        Some((key, tag)) if !key.is_empty() => Ok((key.to_string(), tag.to_string())),
        _ => Err(format!("tag '{value}' is not key=value")),
    }
}

pub fn run(args: LogArgs) -> Result<()> {
    let fresh = std::fs::metadata(&args.file).map(|m| m.len() == 0).unwrap_or(true);
    let file = WriterFile::append(&args.file)
        .with_context(|| format!("failed to open {}", args.file.display()))?;
    let name = args.file.display().to_string();
    let writer = if fresh {
        Writer::new(name.clone(), args.format, file)?
    } else {
        Writer::resume(name.clone(), args.format, file)
    };

    let logger = EventLogger::new("evt");
    logger.add_writers([writer]);
    logger.log(args.event, args.record());
    debug!(file = %name, event = %args.event, "event appended");

    let mut writer = logger
        .remove_writer(&name)
        .ok_or_else(|| anyhow!("writer for {name} disappeared"))?;
    writer
        .close()
        .with_context(|| format!("failed to close {name}"))
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn args(file: PathBuf, format: WireFormat, event: EventKind) -> LogArgs {
        LogArgs {
            file,
            format,
            event,
            collection: Some("run".into()),
            unit: None,
            item: None,
            comment: None,
            tags: vec![("app".into(), "nova".into())],
        }
    }

    #[test]
    fn parse_tag__key_value__then_split_on_first_equals() {
        assert_eq!(parse_tag("a=b=c").unwrap(), ("a".to_string(), "b=c".to_string()));
        assert!(parse_tag("novalue").is_err());
        assert!(parse_tag("=x").is_err());
    }

    #[test]
    fn run__csv_twice__then_single_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.csv");

        run(args(path.clone(), WireFormat::Csv, EventKind::Start)).unwrap();
        run(args(path.clone(), WireFormat::Csv, EventKind::End)).unwrap();

        let body = fs::read_to_string(&path).unwrap();
        let lines = body.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 3);
        assert!(WireFormat::Csv.is_header(lines[0]));
        assert!(lines[1].contains("\"start\""));
        assert!(lines[2].contains("\"end\""));
    }

    #[test]
    fn run__influx__then_line_with_tag_and_timestamp() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.log");

        run(args(path.clone(), WireFormat::InfluxDb, EventKind::Comment)).unwrap();

        let body = fs::read_to_string(&path).unwrap();
        assert!(body.starts_with("run,app=nova event=\"comment\" "));
        assert!(body.trim_end().ends_with("us"));
        assert!(WireFormat::InfluxDb.parse_timestamp(body.trim_end()).is_ok());
    }

    #[test]
    fn run__lifecycle_event__then_stage_name_written() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.log");

        run(args(path.clone(), WireFormat::Log, "deploy-bundle".parse().unwrap())).unwrap();

        let body = fs::read_to_string(&path).unwrap();
        assert!(body.contains(" run deploy-bundle "));
    }
}
