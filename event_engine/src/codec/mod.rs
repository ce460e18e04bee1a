//! Wire formats for event log lines
//!
//! Every format renders a [`Record`] to exactly one line of text and can pull
//! a comparable timestamp back out of a line it (or a compatible producer)
//! wrote. Tags are always rendered sorted by key.

mod csv;
mod line_protocol;
mod log;
pub mod timestamp;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EventError, Result};
use crate::record::Record;

pub use self::csv::CsvCodec;
pub use self::line_protocol::LineProtocolCodec;
pub use self::log::LogCodec;
pub use self::timestamp::{parse_timestamp, rebase_precision};

/// Renders records for one wire format
pub trait Codec: Send + Sync {
    fn format(&self, record: &Record) -> String;

    /// Line written once when a new log file is created
    fn header(&self) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WireFormat {
    #[serde(rename = "CSV", alias = "csv")]
    Csv,
    #[serde(rename = "LOG", alias = "log")]
    Log,
    #[default]
    #[serde(rename = "InfluxDB", alias = "influxdb")]
    InfluxDb,
}

impl WireFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            WireFormat::Csv => "CSV",
            WireFormat::Log => "LOG",
            WireFormat::InfluxDb => "InfluxDB",
        }
    }

    pub fn codec(&self) -> &'static dyn Codec {
        match self {
            WireFormat::Csv => &CsvCodec,
            WireFormat::Log => &LogCodec,
            WireFormat::InfluxDb => &LineProtocolCodec,
        }
    }

    pub fn format(&self, record: &Record) -> String {
        self.codec().format(record)
    }

    pub fn header(&self) -> Option<String> {
        self.codec().header()
    }

    /// True when `line` is this format's file header
    pub fn is_header(&self, line: &str) -> bool {
        self.header().is_some_and(|header| header == line)
    }

    pub fn parse_timestamp(&self, line: &str) -> Result<DateTime<Utc>> {
        parse_timestamp(*self, line)
    }
}

impl fmt::Display for WireFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WireFormat {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(WireFormat::Csv),
            "log" => Ok(WireFormat::Log),
            "influxdb" | "influx" => Ok(WireFormat::InfluxDb),
            _ => Err(EventError::UnknownFormat(s.to_string())),
        }
    }
}

/// Timestamp precision of an InfluxDB line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Precision {
    #[serde(rename = "s")]
    Seconds,
    #[serde(rename = "ms")]
    Millis,
    #[default]
    #[serde(rename = "us")]
    Micros,
    #[serde(rename = "ns")]
    Nanos,
}

impl Precision {
    pub fn suffix(&self) -> &'static str {
        match self {
            Precision::Seconds => "s",
            Precision::Millis => "ms",
            Precision::Micros => "us",
            Precision::Nanos => "ns",
        }
    }

    /// Ticks per second
    pub fn multiplier(&self) -> i128 {
        match self {
            Precision::Seconds => 1,
            Precision::Millis => 1_000,
            Precision::Micros => 1_000_000,
            Precision::Nanos => 1_000_000_000,
        }
    }

    /// Name the InfluxDB 1.x `/write` API uses for this precision
    pub fn api_name(&self) -> &'static str {
        match self {
            Precision::Seconds => "s",
            Precision::Millis => "ms",
            Precision::Micros => "u",
            Precision::Nanos => "n",
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

impl FromStr for Precision {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "s" => Ok(Precision::Seconds),
            "ms" => Ok(Precision::Millis),
            "us" => Ok(Precision::Micros),
            "ns" => Ok(Precision::Nanos),
            other => Err(EventError::UnknownPrecision(other.to_string())),
        }
    }
}

/// Wrap a value in double quotes, backslash-escaping `\` and `"`.
///
/// A value that is already quoted with every inner quote escaped is kept
/// as it is.
pub(crate) fn quote(value: &str) -> String {
    if is_backslash_quoted(value) {
        value.to_string()
    } else {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    }
}

fn quoted_inner(value: &str) -> Option<&str> {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        Some(&value[1..value.len() - 1])
    } else {
        None
    }
}

/// `"..."` with every inner quote doubled, the CSV way.
pub(crate) fn is_csv_quoted(value: &str) -> bool {
    quoted_inner(value).is_some_and(|inner| !inner.replace("\"\"", "").contains('"'))
}

/// `"..."` with every inner quote backslash-escaped and no dangling `\`.
pub(crate) fn is_backslash_quoted(value: &str) -> bool {
    let Some(inner) = quoted_inner(value) else {
        return false;
    };
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.next().is_none() => return false,
            '"' => return false,
            _ => {}
        }
    }
    true
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;

    #[test]
    fn wire_format__from_str__then_case_insensitive() {
        assert_eq!("InfluxDB".parse::<WireFormat>().unwrap(), WireFormat::InfluxDb);
        assert_eq!("csv".parse::<WireFormat>().unwrap(), WireFormat::Csv);
        assert_eq!("LOG".parse::<WireFormat>().unwrap(), WireFormat::Log);
    }

    #[test]
    fn wire_format__unknown_name__then_configuration_error() {
        let err = "parquet".parse::<WireFormat>().unwrap_err();
        assert!(matches!(err, EventError::UnknownFormat(ref name) if name == "parquet"));
    }

    #[test]
    fn wire_format__serde_names__then_match_display() {
        let json = serde_json::to_string(&WireFormat::InfluxDb).unwrap();
        assert_eq!(json, "\"InfluxDB\"");
        let parsed: WireFormat = serde_json::from_str("\"csv\"").unwrap();
        assert_eq!(parsed, WireFormat::Csv);
    }

    #[test]
    fn precision__from_str__then_rejects_unknown() {
        assert_eq!("ms".parse::<Precision>().unwrap(), Precision::Millis);
        assert!(matches!(
            "m".parse::<Precision>(),
            Err(EventError::UnknownPrecision(_))
        ));
    }

    #[test]
    fn precision__api_name__then_influx_v1_spelling() {
        assert_eq!(Precision::Nanos.api_name(), "n");
        assert_eq!(Precision::Micros.api_name(), "u");
        assert_eq!(Precision::Millis.api_name(), "ms");
        assert_eq!(Precision::Seconds.api_name(), "s");
    }

    #[test]
    fn quote__already_quoted__then_unchanged() {
        assert_eq!(quote("\"done\""), "\"done\"");
        assert_eq!(quote("\"say \\\"hi\\\"\""), "\"say \\\"hi\\\"\"");
        assert_eq!(quote("done"), "\"done\"");
    }

    #[test]
    fn quote__inner_quotes_unescaped__then_escaped_and_wrapped() {
        assert_eq!(quote("\""), "\"\\\"\"");
        assert_eq!(quote("\"a\" and \"b\""), "\"\\\"a\\\" and \\\"b\\\"\"");
        assert_eq!(quote("C:\\temp"), "\"C:\\\\temp\"");
    }

    #[test]
    fn is_csv_quoted__doubled_inner_quotes__then_only_fully_escaped_accepted() {
        assert!(is_csv_quoted("\"Hello \"\"Jim\"\".\""));
        assert!(is_csv_quoted("\"\""));
        assert!(!is_csv_quoted("\"a\" and \"b\""));
        assert!(!is_csv_quoted("plain"));
    }

    #[test]
    fn is_backslash_quoted__escaped_closing_quote__then_rejected() {
        assert!(is_backslash_quoted("\"a\\\"b\""));
        assert!(!is_backslash_quoted("\"a\\\""));
        assert!(!is_backslash_quoted("\"a\" and \"b\""));
    }

    #[test]
    fn is_header__csv_header_line__then_true() {
        let header = WireFormat::Csv.header().unwrap();
        assert!(WireFormat::Csv.is_header(&header));
        assert!(!WireFormat::Log.is_header(&header));
    }
}
