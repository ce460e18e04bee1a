use super::timestamp::render_iso;
use super::{quote, Codec};
use crate::record::Record;

/// Human readable lines:
/// `timestamp collection unit item event uuid "comment" tags=k="v",...`
///
/// Missing fields are skipped rather than padded. Quotes and backslashes
/// inside the comment and tag values are backslash-escaped.
pub struct LogCodec;

impl Codec for LogCodec {
    fn format(&self, record: &Record) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(8);
        if let Some(ts) = &record.timestamp {
            parts.push(render_iso(ts));
        }
        let columns = [
            record.collection.as_deref(),
            record.unit.as_deref(),
            record.item.as_deref(),
            record.event.map(|e| e.as_str()),
            record.uuid.as_deref(),
        ];
        parts.extend(columns.into_iter().flatten().map(str::to_string));
        if let Some(comment) = &record.comment {
            parts.push(quote(comment));
        }
        if !record.tags.is_empty() {
            let tags = record
                .tags
                .iter()
                .map(|(k, v)| format!("{}={}", k, quote(v)))
                .collect::<Vec<_>>()
                .join(",");
            parts.push(format!("tags={tags}"));
        }
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::record::{EventKind, Timestamp};

    #[test]
    fn format__all_fields__then_space_separated_with_quoted_comment() {
        let ts = Utc.with_ymd_and_hms(2021, 3, 1, 10, 0, 0).unwrap();
        let record = Record::new()
            .timestamp(ts)
            .collection("upgrade")
            .unit("test")
            .item("keystone")
            .event(EventKind::End)
            .uuid("abcd")
            .comment("all done")
            .tag("b", "2")
            .tag("a", "one two");

        assert_eq!(
            LogCodec.format(&record),
            "2021-03-01T10:00:00.000000Z upgrade test keystone end abcd \"all done\" tags=a=\"one two\",b=\"2\""
        );
    }

    #[test]
    fn format__missing_fields__then_skipped_without_placeholder() {
        let record = Record::new()
            .timestamp(Timestamp::Raw("2021-03-01T10:00:00".into()))
            .event(EventKind::Comment);

        assert_eq!(LogCodec.format(&record), "2021-03-01T10:00:00 comment");
    }

    #[test]
    fn format__comment_with_quotes__then_backslash_escaped() {
        let record = Record::new()
            .timestamp(Timestamp::Raw("t".into()))
            .event(EventKind::Comment)
            .comment("set \"debug\" on")
            .tag("path", "C:\\logs");

        assert_eq!(
            LogCodec.format(&record),
            "t comment \"set \\\"debug\\\" on\" tags=path=\"C:\\\\logs\""
        );
    }
}
