use super::timestamp::render_iso;
use super::{is_csv_quoted, Codec};
use crate::record::Record;

const COLUMNS: [&str; 8] = [
    "timestamp",
    "collection",
    "unit",
    "item",
    "event",
    "uuid",
    "comment",
    "tags",
];

/// `"timestamp","collection","unit","item","event","uuid","comment","tags"`
pub struct CsvCodec;

impl CsvCodec {
    /// Quote a CSV value, doubling embedded quotes.
    ///
    /// `Hello "Jim".` becomes `"Hello ""Jim""."`. A value that is already
    /// quoted, with its inner quotes doubled, is left as it is.
    pub fn quote(value: &str) -> String {
        if is_csv_quoted(value) {
            return value.to_string();
        }
        format!("\"{}\"", value.replace('"', "\"\""))
    }

    fn column(value: Option<&str>) -> String {
        value.map(Self::quote).unwrap_or_else(|| "\"\"".to_string())
    }
}

impl Codec for CsvCodec {
    fn format(&self, record: &Record) -> String {
        let timestamp = record.timestamp.as_ref().map(render_iso);
        let event = record.event.map(|e| e.as_str());
        let tags = record
            .tags
            .iter()
            .map(|(k, v)| format!("{}={}", k, Self::quote(v)))
            .collect::<Vec<_>>()
            .join(",");

        let columns = [
            Self::column(timestamp.as_deref()),
            Self::column(record.collection.as_deref()),
            Self::column(record.unit.as_deref()),
            Self::column(record.item.as_deref()),
            Self::column(event),
            Self::column(record.uuid.as_deref()),
            Self::column(record.comment.as_deref()),
            Self::quote(&tags),
        ];
        columns.join(",")
    }

    fn header(&self) -> Option<String> {
        Some(
            COLUMNS
                .iter()
                .map(|c| Self::quote(c))
                .collect::<Vec<_>>()
                .join(","),
        )
    }
}
