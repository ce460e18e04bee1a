//! Timestamp rendering, parsing and InfluxDB precision re-basing

use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};

use super::{Precision, WireFormat};
use crate::error::{EventError, Result};
use crate::record::Timestamp;

const NANOS_PER_SECOND: i128 = 1_000_000_000;

/// Precision assumed for an InfluxDB timestamp without a suffix
pub const NO_SUFFIX_PRECISION: Precision = Precision::Nanos;

pub(crate) fn render_iso(ts: &Timestamp) -> String {
    match ts {
        Timestamp::At(at) => at.to_rfc3339_opts(SecondsFormat::Micros, true),
        Timestamp::Raw(raw) => raw.clone(),
    }
}

pub(crate) fn render_line_protocol(ts: &Timestamp) -> String {
    match ts {
        Timestamp::At(at) => format!("{}{}", at.timestamp_micros(), Precision::Micros.suffix()),
        Timestamp::Raw(raw) => raw.clone(),
    }
}

/// Pull a comparable instant out of one already written line.
///
/// InfluxDB lines carry `<int><suffix>` as their last token; CSV and LOG
/// lines start with an ISO-8601 instant (quoted for CSV).
pub fn parse_timestamp(format: WireFormat, line: &str) -> Result<DateTime<Utc>> {
    match format {
        WireFormat::InfluxDb => {
            let token = last_token(line);
            let (digits, precision) = split_precision(token);
            let value = parse_ticks(digits, token)?;
            let nanos = value
                .checked_mul(NANOS_PER_SECOND / precision.unwrap_or(NO_SUFFIX_PRECISION).multiplier())
                .ok_or_else(|| EventError::timestamp(format!("timestamp overflows: {token}")))?;
            instant_from_nanos(nanos)
        }
        WireFormat::Csv => {
            let first = line.split(',').next().unwrap_or_default();
            let first = first.strip_prefix('"').unwrap_or(first);
            let first = first.strip_suffix('"').unwrap_or(first);
            parse_iso(first)
        }
        WireFormat::Log => parse_iso(line.split(' ').next().unwrap_or_default()),
    }
}

/// Rewrite the trailing timestamp of an InfluxDB line to `precision`.
///
/// A token without a suffix is read as nanoseconds. Going to a finer
/// precision pads with zeros; going to a coarser one truncates toward zero
/// and the dropped digits are lost. With `strip_precision` the suffix is
/// left off so the line suits a batch upload that names one precision for
/// the whole request. A token already at `precision` is returned untouched
/// unless it has to be stripped.
pub fn rebase_precision(line: &str, precision: Precision, strip_precision: bool) -> Result<String> {
    let (head, token) = match line.rsplit_once(' ') {
        Some((head, token)) => (Some(head), token),
        None => (None, line),
    };
    let (digits, source) = split_precision(token);
    let source = source.unwrap_or(NO_SUFFIX_PRECISION);

    if source == precision && !strip_precision {
        return Ok(line.to_string());
    }

    let value = parse_ticks(digits, token)?;
    let converted = convert(value, source, precision)
        .ok_or_else(|| EventError::timestamp(format!("timestamp overflows: {token}")))?;
    let token = if strip_precision {
        converted.to_string()
    } else {
        format!("{converted}{}", precision.suffix())
    };

    Ok(match head {
        Some(head) => format!("{head} {token}"),
        None => token,
    })
}

fn convert(value: i128, from: Precision, to: Precision) -> Option<i128> {
    let (from, to) = (from.multiplier(), to.multiplier());
    if to >= from {
        value.checked_mul(to / from)
    } else {
        Some(value / (from / to))
    }
}

fn last_token(line: &str) -> &str {
    line.rsplit(' ').next().unwrap_or(line)
}

fn split_precision(token: &str) -> (&str, Option<Precision>) {
    for precision in [Precision::Millis, Precision::Micros, Precision::Nanos, Precision::Seconds] {
        if let Some(digits) = token.strip_suffix(precision.suffix()) {
            return (digits, Some(precision));
        }
    }
    (token, None)
}

fn parse_ticks(digits: &str, token: &str) -> Result<i128> {
    digits
        .parse::<i128>()
        .map_err(|_| EventError::timestamp(format!("not an InfluxDB timestamp: {token:?}")))
}

fn instant_from_nanos(nanos: i128) -> Result<DateTime<Utc>> {
    let secs = i64::try_from(nanos.div_euclid(NANOS_PER_SECOND))
        .map_err(|_| EventError::timestamp(format!("timestamp out of range: {nanos}ns")))?;
    let subsec = nanos.rem_euclid(NANOS_PER_SECOND) as u32;
    Utc.timestamp_opt(secs, subsec)
        .single()
        .ok_or_else(|| EventError::timestamp(format!("timestamp out of range: {nanos}ns")))
}

/// Naive instants are taken as UTC.
fn parse_iso(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Ok(at.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|_| EventError::timestamp(format!("not an ISO-8601 timestamp: {value:?}")))
}
