//! Uploading a collection's merged events to InfluxDB
//!
//! Events are read in timestamp order, re-based to the upload's timestamp
//! resolution with the suffix stripped, joined into batches of lines and
//! posted to the InfluxDB 1.x `/write` endpoint through a [`BatchSink`].
//! [`HttpBatchSink`] is the sink that talks to a real server.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::codec::{Precision, WireFormat};
use crate::collection::Collection;
use crate::config::{expand_vars, Context};
use crate::error::{EventError, Result};
use crate::streamer::StreamOptions;

/// HTTP statuses InfluxDB answers a successful write with
pub const ACCEPTED_STATUSES: [u16; 3] = [200, 204, 202];

pub const DEFAULT_BATCH_SIZE: usize = 1000;

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Where to upload a collection, selected by its `type` key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum UploadSpec {
    #[serde(rename = "InfluxDB", alias = "influxdb", alias = "INFLUXDB")]
    InfluxDb(InfluxUploadSpec),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct InfluxUploadSpec {
    pub url: Option<String>,
    pub database: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub timestamp_resolution: Precision,
    pub batch_size: usize,
    pub raise_exceptions: bool,
}

impl Default for InfluxUploadSpec {
    fn default() -> Self {
        Self {
            url: None,
            database: None,
            user: None,
            password: None,
            timestamp_resolution: Precision::Micros,
            batch_size: DEFAULT_BATCH_SIZE,
            raise_exceptions: false,
        }
    }
}

impl InfluxUploadSpec {
    /// `<url>/write?db=<db>&precision=<p>[&u=<user>][&p=<password>]`
    pub fn write_url(&self, context: &Context) -> Result<String> {
        let url = self
            .url
            .as_deref()
            .ok_or_else(|| EventError::config("no url supplied to upload to InfluxDB"))?;
        let database = self
            .database
            .as_deref()
            .ok_or_else(|| EventError::config("no database supplied to upload to InfluxDB"))?;

        let url = expand_vars(context, url);
        let mut write_url = format!(
            "{}/write?db={}&precision={}",
            url.trim_end_matches('/'),
            expand_vars(context, database),
            self.timestamp_resolution.api_name()
        );
        if let Some(user) = self.user.as_deref().filter(|u| !u.is_empty()) {
            write_url.push_str(&format!("&u={}", expand_vars(context, user)));
        }
        if let Some(password) = self.password.as_deref().filter(|p| !p.is_empty()) {
            write_url.push_str(&format!("&p={}", expand_vars(context, password)));
        }
        Ok(write_url)
    }
}

/// Posts one batch of line protocol and reports the HTTP status
pub trait BatchSink {
    fn post(&mut self, url: &str, body: &str) -> Result<u16>;
}

/// [`BatchSink`] that POSTs each batch with a blocking HTTP client
#[derive(Debug, Clone)]
pub struct HttpBatchSink {
    client: reqwest::blocking::Client,
}

impl HttpBatchSink {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_HTTP_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EventError::Upload(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl BatchSink for HttpBatchSink {
    fn post(&mut self, url: &str, body: &str) -> Result<u16> {
        // The url may carry credentials; keep it out of errors and logs.
        let response = self
            .client
            .post(url)
            .body(body.to_string())
            .send()
            .map_err(|e| EventError::Upload(format!("failed to post batch: {}", e.without_url())))?;
        let status = response.status().as_u16();
        if ACCEPTED_STATUSES.contains(&status) {
            debug!(status, bytes = body.len(), "batch posted");
        } else {
            let reason = response.text().unwrap_or_default();
            warn!(status, reason = %reason.trim(), "InfluxDB rejected batch");
        }
        Ok(status)
    }
}

/// What an upload got through
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadSummary {
    pub batches: usize,
    pub lines: usize,
    /// False when the upload was abandoned part way
    pub completed: bool,
}

/// Upload the collection's events as `spec` says.
///
/// Failures abandon the upload. They are returned as errors only when the
/// spec sets `raise-exceptions`; otherwise they are logged and the summary
/// says how far the upload got.
pub fn upload(
    spec: &UploadSpec,
    collection: &mut Collection,
    context: &Context,
    sink: &mut dyn BatchSink,
) -> Result<UploadSummary> {
    match spec {
        UploadSpec::InfluxDb(spec) => upload_influxdb(spec, collection, context, sink),
    }
}

/// Run every configured upload in turn.
pub fn upload_all(
    specs: &[UploadSpec],
    collection: &mut Collection,
    context: &Context,
    sink: &mut dyn BatchSink,
) -> Result<Vec<UploadSummary>> {
    let mut summaries = Vec::with_capacity(specs.len());
    for spec in specs {
        summaries.push(upload(spec, collection, context, sink)?);
    }
    Ok(summaries)
}

fn upload_influxdb(
    spec: &InfluxUploadSpec,
    collection: &mut Collection,
    context: &Context,
    sink: &mut dyn BatchSink,
) -> Result<UploadSummary> {
    let mut summary = UploadSummary::default();
    let abandon = |e: EventError, summary: UploadSummary| {
        error!(error = %e, "abandoning upload to InfluxDB");
        if spec.raise_exceptions {
            Err(e)
        } else {
            Ok(summary)
        }
    };

    let url = match spec.write_url(context) {
        Ok(url) => url,
        Err(e) => return abandon(e, summary),
    };
    if spec.batch_size == 0 {
        return abandon(EventError::config("batch-size must be at least 1"), summary);
    }

    let options = StreamOptions {
        sort: true,
        precision: spec.timestamp_resolution,
        strip_precision: true,
    };
    let streamer = match collection.events(options) {
        Ok(streamer) => streamer,
        Err(e) => return abandon(e, summary),
    };
    if streamer.format() != WireFormat::InfluxDb {
        let e = EventError::config(format!(
            "only InfluxDB line protocol can be uploaded, collection is {}",
            streamer.format()
        ));
        return abandon(e, summary);
    }

    info!(
        database = spec.database.as_deref().unwrap_or_default(),
        user = spec.user.as_deref().unwrap_or_default(),
        precision = %spec.timestamp_resolution,
        batch_size = spec.batch_size,
        "starting upload to InfluxDB"
    );

    let mut events = streamer.open();
    loop {
        let batch = events
            .by_ref()
            .take(spec.batch_size)
            .map(|(_, line)| line)
            .collect::<Vec<_>>();
        if batch.is_empty() {
            break;
        }
        match sink.post(&url, &batch.join("\n")) {
            Ok(status) if ACCEPTED_STATUSES.contains(&status) => {
                summary.batches += 1;
                summary.lines += batch.len();
            }
            Ok(status) => {
                let e = EventError::Upload(format!("batch upload failed with status {status}"));
                return abandon(e, summary);
            }
            Err(e) => return abandon(e, summary),
        }
    }
    events.close();

    summary.completed = true;
    info!(batches = summary.batches, lines = summary.lines, "finished upload to InfluxDB");
    Ok(summary)
}
