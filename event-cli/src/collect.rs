use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use event_engine::{
    auto_configure, run_context, shared, upload_all, EventsConfig, FileSource, HttpBatchSink, Precision,
    Registry, StreamOptions, WireFormat,
};
use tracing::{info, warn};

use crate::merge::write_events;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct CollectArgs {
    /// JSON run configuration; defaults apply when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Wire format of the collection, overriding the configuration
    #[arg(short, long)]
    pub format: Option<WireFormat>,

    /// Value of `{bundle}` in configuration values
    #[arg(long, default_value = "evt")]
    pub bundle: String,

    /// Precision InfluxDB timestamps are re-based to (s, ms, us, ns)
    #[arg(short, long, default_value = "us")]
    pub precision: Precision,

    /// Print the gathered log files instead of their events
    #[arg(long)]
    pub list: bool,

    /// Do not run the uploads the configuration names
    #[arg(long)]
    pub skip_upload: bool,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text")]
    pub output: OutputFormat,

    /// Log files to add to the collection
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

pub fn run(args: CollectArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => EventsConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => EventsConfig::default(),
    };
    if let Some(format) = args.format {
        config.log_format = format;
    }

    let registry = Registry::new();
    let context = run_context(&args.bundle);
    let shared_collection = auto_configure(&registry, &config, &context)?;
    let mut collection = shared_collection.lock();
    collection.add_source(shared(FileSource::new("files", args.files.iter().cloned())))?;

    if args.list {
        let specs = collection.log_files();
        println!("{}", output::format_log_files(&specs, args.output));
    } else {
        let options = StreamOptions {
            precision: args.precision,
            ..StreamOptions::default()
        };
        let streamer = collection.events(options)?;
        let count = write_events(streamer.open(), args.output, io::stdout().lock())?;
        info!(collection = %collection.collection(), events = count, "collection streamed");
    }

    if !config.upload.is_empty() {
        if args.skip_upload {
            warn!(targets = config.upload.len(), "skipping configured uploads");
        } else {
            let mut sink = HttpBatchSink::new()?;
            let summaries = upload_all(&config.upload, &mut collection, &context, &mut sink)
                .context("upload failed")?;
            for summary in summaries {
                info!(
                    batches = summary.batches,
                    lines = summary.lines,
                    completed = summary.completed,
                    "upload finished"
                );
            }
        }
    }
    collection.clean_up()?;
    Ok(())
}
