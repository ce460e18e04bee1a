//! Run configuration
//!
//! Loaded from JSON with kebab-case keys, for example:
//!
//! ```json
//! {
//!   "collection-name": "DEFAULT",
//!   "log-collection-name": "charm-upgrade-{bundle}-{date}",
//!   "log-format": "InfluxDB",
//!   "modules": {
//!     "logging": { "logger-name": "DEFAULT", "log-to-tracing": true, "tracing-level": "debug" }
//!   },
//!   "upload": [
//!     { "type": "InfluxDB", "url": "${INFLUXDB_URL}", "database": "charm_upgrade", "timestamp-resolution": "us" }
//!   ]
//! }
//! ```
//!
//! Values may refer to environment variables as `${NAME}` and to run context
//! variables as `{name}`; see [`expand_vars`].

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn, Level};

use crate::codec::WireFormat;
use crate::collection::{Collection, CollectionConfig};
use crate::error::{EventError, Result};
use crate::logger::{StdoutSink, TracingSink, Writer};
use crate::registry::{Registry, DEFAULT_NAME};
use crate::upload::UploadSpec;

/// Variables available to `{name}` expansion
pub type Context = HashMap<String, String>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct EventsConfig {
    /// Registry name of the collection to configure
    pub collection_name: String,
    /// Collection name written into the events; defaults to `collection_name`
    pub log_collection_name: Option<String>,
    pub collection_description: Option<String>,
    pub log_format: WireFormat,
    pub logs_dir: Option<PathBuf>,
    pub modules: ModulesConfig,
    pub upload: Vec<UploadSpec>,
    /// Fail instead of logging when a module can't be set up
    pub raise_exceptions: bool,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            collection_name: DEFAULT_NAME.to_string(),
            log_collection_name: None,
            collection_description: None,
            log_format: WireFormat::default(),
            logs_dir: None,
            modules: ModulesConfig::default(),
            upload: Vec::new(),
            raise_exceptions: false,
        }
    }
}

impl EventsConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| EventError::io(path, e))?;
        Self::from_json(&json)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ModulesConfig {
    pub logging: Option<LoggingConfig>,
}

/// Attaches an event logger to the collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct LoggingConfig {
    pub logger_name: String,
    /// Also echo events to stdout in LOG format
    pub log_to_stdout: bool,
    /// Also echo events to the process log
    pub log_to_tracing: bool,
    pub tracing_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            logger_name: DEFAULT_NAME.to_string(),
            log_to_stdout: false,
            log_to_tracing: false,
            tracing_level: "debug".to_string(),
        }
    }
}

/// Expand `${NAME}` from the environment, then `{key}` from `context`.
///
/// Unknown variables are left as they are.
pub fn expand_vars(context: &Context, value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match std::env::var(name) {
                    Ok(var) => out.push_str(&var),
                    Err(_) => out.push_str(&rest[start..start + 2 + end + 1]),
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);

    for (key, var) in context {
        out = out.replace(&format!("{{{}}}", key.trim()), var);
    }
    out
}

/// Context for one run: `bundle` and a `date` in InfluxDB microseconds.
pub fn run_context(bundle: &str) -> Context {
    HashMap::from([
        ("bundle".to_string(), bundle.to_string()),
        ("date".to_string(), format!("{}us", Utc::now().timestamp_micros())),
    ])
}

/// Reset and configure the collection named by `config`, then set up the
/// configured modules on it.
///
/// A module that fails is logged and skipped unless `raise-exceptions` is
/// set.
pub fn auto_configure(
    registry: &Registry,
    config: &EventsConfig,
    context: &Context,
) -> Result<Arc<Mutex<Collection>>> {
    let shared = registry.collection(&config.collection_name);
    {
        let mut collection = shared.lock();
        if let Err(e) = collection.reset() {
            error!(collection = %config.collection_name, error = %e, "couldn't reset collection");
        }

        let name = config
            .log_collection_name
            .as_deref()
            .unwrap_or(&config.collection_name);
        let mut settings = CollectionConfig::new()
            .collection(expand_vars(context, name))
            .log_format(config.log_format);
        if let Some(description) = &config.collection_description {
            settings = settings.description(expand_vars(context, description));
        }
        if let Some(logs_dir) = &config.logs_dir {
            let logs_dir = PathBuf::from(expand_vars(context, &logs_dir.to_string_lossy()));
            fs::create_dir_all(&logs_dir).map_err(|e| EventError::io(&logs_dir, e))?;
            settings = settings.logs_dir(logs_dir);
        }
        collection.configure(settings);

        detach_echo_writers(registry);
        if let Some(logging) = &config.modules.logging {
            if let Err(e) = configure_logging(registry, &mut collection, logging) {
                error!(module = "logging", error = %e, "couldn't auto-configure events module");
                if config.raise_exceptions {
                    return Err(e);
                }
            }
        }
        info!(collection = %collection.collection(), format = %collection.log_format(), "event collection configured");
    }
    Ok(shared)
}

/// Writers the logging module attaches to echo events
const ECHO_WRITERS: [&str; 2] = ["stdout", "tracing"];

/// Drop echo writers a previous configuration attached.
fn detach_echo_writers(registry: &Registry) {
    for logger in registry.loggers() {
        let attached = logger.writer_names();
        for name in ECHO_WRITERS.iter().filter(|name| attached.iter().any(|a| a == *name)) {
            if let Some(mut writer) = logger.remove_writer(name) {
                debug!(logger = logger.name(), writer = *name, "detached echo writer");
                if let Err(e) = writer.close() {
                    warn!(logger = logger.name(), writer = *name, error = %e, "couldn't close echo writer");
                }
            }
        }
    }
}

fn configure_logging(registry: &Registry, collection: &mut Collection, config: &LoggingConfig) -> Result<()> {
    let source = registry.logger_source(&config.logger_name);
    collection.add_source(source)?;
    let logger = registry.logger(&config.logger_name);

    if config.log_to_stdout {
        info!("echoing events to stdout");
        logger.add_writers([Writer::new(ECHO_WRITERS[0], WireFormat::Log, StdoutSink)?]);
    }
    if config.log_to_tracing {
        let level = config
            .tracing_level
            .parse::<Level>()
            .map_err(|_| EventError::config(format!("invalid log level: {:?}", config.tracing_level)))?;
        info!(%level, "echoing events to the process log");
        logger.add_writers([Writer::new(ECHO_WRITERS[1], WireFormat::Log, TracingSink::new(level))?]);
    }
    Ok(())
}
