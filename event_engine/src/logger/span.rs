//! Spans: BEGIN and END (or EXCEPTION) events sharing one uuid

use std::fmt;

use uuid::Uuid;

use super::LoggerInstance;
use crate::record::{EventKind, Record};

#[derive(Debug, Clone)]
pub struct Span {
    uuid: String,
    comment: Option<String>,
    fields: Record,
    logger: LoggerInstance,
}

impl Span {
    pub(super) fn new(logger: LoggerInstance, comment: Option<String>, fields: Record) -> Self {
        Self {
            uuid: Uuid::new_v4().to_string(),
            comment,
            fields,
            logger,
        }
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// The fields every event of this span carries.
    pub fn record(&self) -> Record {
        let mut record = self.fields.clone().in_span(self);
        if let Some(comment) = &self.comment {
            record.comment = Some(comment.clone());
        }
        record
    }

    pub fn begin(&self) {
        self.logger.log(EventKind::SpanBegin, self.record());
    }

    pub fn end(&self) {
        self.logger.log(EventKind::SpanEnd, self.record());
    }

    pub fn exception(&self, error: &dyn fmt::Display) {
        self.logger
            .log(EventKind::ExceptionInSpan, self.record().tag("exception", error.to_string()));
    }

    /// Bracket `f` with BEGIN and END; an error logs EXCEPTION and is
    /// handed back unchanged.
    pub fn run<T, E: fmt::Display>(&self, f: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
        self.begin();
        match f() {
            Ok(value) => {
                self.end();
                Ok(value)
            }
            Err(e) => {
                self.exception(&e);
                Err(e)
            }
        }
    }

    /// Log BEGIN now; the guard logs END from [`SpanGuard::finish`].
    pub fn enter(&self) -> SpanGuard<'_> {
        self.begin();
        SpanGuard { span: self, closed: false }
    }
}

/// Scope guard returned by [`Span::enter`].
///
/// Only [`finish`](SpanGuard::finish) logs END. A guard dropped without being
/// finished or failed, e.g. when `?` returns early or a panic unwinds through
/// it, logs EXCEPTION tagged `exception=abandoned` (or `panicked`).
#[must_use = "dropping the guard immediately logs the span as abandoned"]
pub struct SpanGuard<'a> {
    span: &'a Span,
    closed: bool,
}

impl SpanGuard<'_> {
    pub fn span(&self) -> &Span {
        self.span
    }

    /// Close the span with EXCEPTION.
    pub fn fail(mut self, error: &dyn fmt::Display) {
        self.closed = true;
        self.span.exception(error);
    }

    pub fn finish(mut self) {
        self.closed = true;
        self.span.end();
    }
}

impl Drop for SpanGuard<'_> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let reason = if std::thread::panicking() { "panicked" } else { "abandoned" };
        self.span.exception(&reason);
    }
}

impl Record {
    /// Tag this record with the span's uuid.
    pub fn in_span(self, span: &Span) -> Record {
        self.uuid(span.uuid())
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use std::panic::{self, AssertUnwindSafe};
    use std::sync::Arc;

    use super::*;
    use crate::codec::WireFormat;
    use crate::logger::{EventLogger, MemorySink, Writer};
    use crate::record::Timestamp;

    fn instance() -> (LoggerInstance, MemorySink) {
        let logger = Arc::new(EventLogger::new("DEFAULT"));
        let sink = MemorySink::new();
        logger.add_writers([Writer::for_format(WireFormat::Log, sink.clone()).unwrap()]);
        let events = logger.prefill_with(
            Record::new()
                .collection("run")
                .timestamp(Timestamp::Raw("t".into())),
        );
        (events, sink)
    }

    #[test]
    fn run__ok__then_begin_and_end_share_uuid() {
        let (events, sink) = instance();
        let span = events.span(Some("upgrade"), Record::new().item("keystone"));

        let value = span.run(|| Ok::<_, String>(7)).unwrap();

        assert_eq!(value, 7);
        let id = span.uuid();
        assert_eq!(
            sink.lines(),
            vec![
                format!("t run keystone span-begin {id} \"upgrade\""),
                format!("t run keystone span-end {id} \"upgrade\""),
            ]
        );
    }

    #[test]
    fn run__error__then_exception_logged_and_error_returned() {
        let (events, sink) = instance();
        let span = events.span(Some("upgrade"), Record::new());

        let err = span.run(|| Err::<(), _>("boom".to_string())).unwrap_err();

        assert_eq!(err, "boom");
        let lines = sink.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(&format!("span-begin {}", span.uuid())));
        assert!(lines[1].contains(&format!("exception-in-span {}", span.uuid())));
        assert!(lines[1].ends_with("tags=exception=\"boom\""));
    }

    #[test]
    fn enter__guard_finished__then_end_logged() {
        let (events, sink) = instance();
        let span = events.span(None, Record::new());
        {
            let guard = span.enter();
            events.log(EventKind::Comment, Record::new().in_span(&span));
            guard.finish();
        }

        let lines = sink.lines();
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().all(|line| line.contains(span.uuid())));
        assert!(lines[2].contains("span-end"));
    }

    #[test]
    fn enter__error_returned_with_question_mark__then_exception_logged() {
        let (events, sink) = instance();
        let span = events.span(Some("risky"), Record::new());

        fn step(span: &Span) -> Result<(), String> {
            let guard = span.enter();
            Err::<(), _>("boom".to_string())?;
            guard.finish();
            Ok(())
        }

        assert_eq!(step(&span).unwrap_err(), "boom");
        let lines = sink.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(&format!("span-begin {}", span.uuid())));
        assert!(lines[1].contains(&format!("exception-in-span {}", span.uuid())));
        assert!(lines[1].ends_with("tags=exception=\"abandoned\""));
        assert!(!lines.iter().any(|line| line.contains("span-end")));
    }

    #[test]
    fn enter__panic_unwinds__then_exception_logged() {
        let (events, sink) = instance();
        let span = events.span(Some("risky"), Record::new());

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let _guard = span.enter();
            panic!("nope");
        }));

        assert!(result.is_err());
        let lines = sink.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("exception-in-span"));
        assert!(lines[1].contains("panicked"));
    }

    #[test]
    fn guard_fail__then_exception_not_followed_by_end() {
        let (events, sink) = instance();
        let span = events.span(None, Record::new());

        let guard = span.enter();
        guard.fail(&"bad state");

        let lines = sink.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("exception-in-span"));
        assert!(lines[1].contains("bad state"));
    }
}
