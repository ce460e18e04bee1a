use super::timestamp::render_line_protocol;
use super::{quote, Codec};
use crate::record::Record;

/// InfluxDB line protocol:
/// `collection[,tag=value,...] field="value",... timestamp`
///
/// The collection is the measurement. `unit`, `item`, `event`, `comment`
/// and `uuid` are string fields; everything else is a tag.
pub struct LineProtocolCodec;

impl LineProtocolCodec {
    fn measurement(value: &str) -> String {
        value.replace(',', "\\,").replace(' ', "\\ ")
    }

    /// Tags are unquoted, so spaces become `-` and separators are escaped.
    fn tag(value: &str) -> String {
        value
            .replace(' ', "-")
            .replace(',', "\\,")
            .replace('=', "\\=")
    }

    fn field(value: &str) -> String {
        quote(value)
    }
}

impl Codec for LineProtocolCodec {
    fn format(&self, record: &Record) -> String {
        let mut line = Self::measurement(record.collection.as_deref().unwrap_or("collection?"));

        for (k, v) in &record.tags {
            line.push(',');
            line.push_str(&Self::tag(k));
            line.push('=');
            line.push_str(&Self::tag(v));
        }

        // Sorted by key, like the tags.
        let fields = [
            ("comment", record.comment.as_deref()),
            ("event", record.event.map(|e| e.as_str())),
            ("item", record.item.as_deref()),
            ("unit", record.unit.as_deref()),
            ("uuid", record.uuid.as_deref()),
        ];
        let fields = fields
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| format!("{}={}", k, Self::field(v))))
            .collect::<Vec<_>>();
        if !fields.is_empty() {
            line.push(' ');
            line.push_str(&fields.join(","));
        }

        if let Some(ts) = &record.timestamp {
            line.push(' ');
            line.push_str(&render_line_protocol(ts));
        }
        line
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::record::{EventKind, Timestamp};

    #[test]
    fn format__instant_timestamp__then_microseconds_with_suffix() {
        let ts = Utc.timestamp_opt(1_614_592_800, 123_456_000).unwrap();
        let record = Record::new()
            .timestamp(ts)
            .collection("upgrade")
            .unit("test")
            .event(EventKind::Start);

        assert_eq!(
            LineProtocolCodec.format(&record),
            "upgrade event=\"start\",unit=\"test\" 1614592800123456us"
        );
    }

    #[test]
    fn format__tags_with_spaces__then_dashed_and_sorted() {
        let record = Record::new()
            .timestamp(Timestamp::Raw("10s".into()))
            .collection("run")
            .event(EventKind::Comment)
            .comment("a b")
            .tag("zone", "az 1")
            .tag("app", "nova");

        assert_eq!(
            LineProtocolCodec.format(&record),
            "run,app=nova,zone=az-1 comment=\"a b\",event=\"comment\" 10s"
        );
    }

    #[test]
    fn format__quote_in_field__then_backslash_escaped() {
        let record = Record::new()
            .collection("run")
            .comment("say \"hi\"");

        assert_eq!(
            LineProtocolCodec.format(&record),
            "run comment=\"say \\\"hi\\\"\""
        );
    }

    #[test]
    fn format__quoted_ends_with_bare_inner_quotes__then_escaped() {
        let record = Record::new().collection("run").comment("\"a\" and \"b\"");

        assert_eq!(
            LineProtocolCodec.format(&record),
            "run comment=\"\\\"a\\\" and \\\"b\\\"\""
        );
    }

    #[test]
    fn format__no_collection__then_placeholder_measurement() {
        let record = Record::new().event(EventKind::End);
        assert_eq!(LineProtocolCodec.format(&record), "collection? event=\"end\"");
    }
}
