//! Event records
//!
//! A record is a typed set of well-known fields plus an open, sorted tag map.
//! Keys that are not well-known end up as tags; setting them through
//! [`Record::field`] logs a lint warning because the wire formats are
//! schemaless and will still write them.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{EventError, Result};

/// Field names that loggers know about. Anything else is linted.
pub const FIELDS: &[&str] = &[
    "collection",
    "timestamp",
    "event",
    "span",
    "unit",
    "item",
    "comment",
    "tags",
    "uuid",
];

/// Recognised event kinds
///
/// The first six are the core test events; the rest name deployment and
/// test lifecycle stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "start")]
    Start,
    #[serde(rename = "comment")]
    Comment,
    #[serde(rename = "span-begin")]
    SpanBegin,
    #[serde(rename = "span-end")]
    SpanEnd,
    #[serde(rename = "exception-in-span")]
    ExceptionInSpan,
    #[serde(rename = "end")]
    End,
    // Lifecycle stages
    #[serde(rename = "bundle")]
    Bundle,
    #[serde(rename = "env-deployment")]
    EnvDeployment,
    #[serde(rename = "prepare-env")]
    PrepareEnv,
    #[serde(rename = "before-deploy")]
    BeforeDeploy,
    #[serde(rename = "before-deploy-function")]
    BeforeDeployFunction,
    #[serde(rename = "configure")]
    Configure,
    #[serde(rename = "configure-function")]
    ConfigureFunction,
    #[serde(rename = "deploy-bundle")]
    DeployBundle,
    #[serde(rename = "wait-model-settle")]
    WaitModelSettle,
    #[serde(rename = "configure-model")]
    ConfigureModel,
    #[serde(rename = "tests")]
    Tests,
    #[serde(rename = "test-case")]
    TestCase,
    #[serde(rename = "destroy-model")]
    DestroyModel,
}

impl EventKind {
    pub const ALL: [EventKind; 19] = [
        EventKind::Start,
        EventKind::Comment,
        EventKind::SpanBegin,
        EventKind::SpanEnd,
        EventKind::ExceptionInSpan,
        EventKind::End,
        EventKind::Bundle,
        EventKind::EnvDeployment,
        EventKind::PrepareEnv,
        EventKind::BeforeDeploy,
        EventKind::BeforeDeployFunction,
        EventKind::Configure,
        EventKind::ConfigureFunction,
        EventKind::DeployBundle,
        EventKind::WaitModelSettle,
        EventKind::ConfigureModel,
        EventKind::Tests,
        EventKind::TestCase,
        EventKind::DestroyModel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Start => "start",
            EventKind::Comment => "comment",
            EventKind::SpanBegin => "span-begin",
            EventKind::SpanEnd => "span-end",
            EventKind::ExceptionInSpan => "exception-in-span",
            EventKind::End => "end",
            EventKind::Bundle => "bundle",
            EventKind::EnvDeployment => "env-deployment",
            EventKind::PrepareEnv => "prepare-env",
            EventKind::BeforeDeploy => "before-deploy",
            EventKind::BeforeDeployFunction => "before-deploy-function",
            EventKind::Configure => "configure",
            EventKind::ConfigureFunction => "configure-function",
            EventKind::DeployBundle => "deploy-bundle",
            EventKind::WaitModelSettle => "wait-model-settle",
            EventKind::ConfigureModel => "configure-model",
            EventKind::Tests => "tests",
            EventKind::TestCase => "test-case",
            EventKind::DestroyModel => "destroy-model",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self> {
        EventKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| EventError::UnknownEvent(s.to_string()))
    }
}

/// Record timestamp: an instant, or a token already rendered by a producer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Timestamp {
    At(DateTime<Utc>),
    Raw(String),
}

impl Timestamp {
    pub fn now() -> Self {
        Timestamp::At(Utc::now())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Timestamp::At(value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    pub timestamp: Option<Timestamp>,
    pub collection: Option<String>,
    pub unit: Option<String>,
    pub item: Option<String>,
    pub event: Option<EventKind>,
    pub uuid: Option<String>,
    pub comment: Option<String>,
    pub tags: BTreeMap<String, String>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timestamp(mut self, timestamp: impl Into<Timestamp>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn item(mut self, item: impl Into<String>) -> Self {
        self.item = Some(item.into());
        self
    }

    pub fn event(mut self, event: EventKind) -> Self {
        self.event = Some(event);
        self
    }

    pub fn uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = Some(uuid.into());
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Set a field by name.
    ///
    /// Well-known names go to their typed slot (`span` is kept as a tag).
    /// Unknown names are stored as tags after a lint warning. Only an
    /// unrecognised `event` value is an error.
    pub fn field(mut self, key: &str, value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        match key {
            "timestamp" => self.timestamp = Some(Timestamp::Raw(value)),
            "collection" => self.collection = Some(value),
            "unit" => self.unit = Some(value),
            "item" => self.item = Some(value),
            "event" => self.event = Some(value.parse()?),
            "uuid" => self.uuid = Some(value),
            "comment" => self.comment = Some(value),
            "span" => {
                self.tags.insert(key.to_string(), value);
            }
            other => {
                if !FIELDS.contains(&other) {
                    warn!(field = other, "event field is not a known field; writing it as a tag");
                }
                self.tags.insert(other.to_string(), value);
            }
        }
        Ok(self)
    }

    /// Fill every unset field of `self` from `base`; tags set on `self` win.
    pub fn merged_over(self, base: &Record) -> Record {
        let mut tags = base.tags.clone();
        tags.extend(self.tags);
        Record {
            timestamp: self.timestamp.or_else(|| base.timestamp.clone()),
            collection: self.collection.or_else(|| base.collection.clone()),
            unit: self.unit.or_else(|| base.unit.clone()),
            item: self.item.or_else(|| base.item.clone()),
            event: self.event.or(base.event),
            uuid: self.uuid.or_else(|| base.uuid.clone()),
            comment: self.comment.or_else(|| base.comment.clone()),
            tags,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;

    #[test]
    fn event_kind__round_trips_through_str__then_matches_wire_names() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
        assert_eq!(EventKind::ExceptionInSpan.to_string(), "exception-in-span");
    }

    #[test]
    fn event_kind__lifecycle_stage_names__then_parsed() {
        assert_eq!("bundle".parse::<EventKind>().unwrap(), EventKind::Bundle);
        assert_eq!("deploy-bundle".parse::<EventKind>().unwrap(), EventKind::DeployBundle);
        assert_eq!("test-case".parse::<EventKind>().unwrap(), EventKind::TestCase);
        assert_eq!(EventKind::WaitModelSettle.to_string(), "wait-model-settle");
        assert_eq!(EventKind::ALL.len(), 19);
        assert_eq!(
            serde_json::to_string(&EventKind::BeforeDeployFunction).unwrap(),
            "\"before-deploy-function\""
        );
    }

    #[test]
    fn event_kind__unknown_name__then_error() {
        let err = "stage".parse::<EventKind>().unwrap_err();
        assert!(matches!(err, EventError::UnknownEvent(ref name) if name == "stage"));
    }

    #[test]
    fn record_field__known_names__then_typed_slots() {
        let record = Record::new()
            .field("unit", "keystone/0")
            .unwrap()
            .field("event", "comment")
            .unwrap()
            .field("span", "before")
            .unwrap();

        assert_eq!(record.unit.as_deref(), Some("keystone/0"));
        assert_eq!(record.event, Some(EventKind::Comment));
        assert_eq!(record.tags.get("span").map(String::as_str), Some("before"));
    }

    #[test]
    fn record_field__unknown_name__then_kept_as_tag() {
        let record = Record::new().field("colour", "blue").unwrap();
        assert_eq!(record.tags.get("colour").map(String::as_str), Some("blue"));
    }

    #[test]
    fn record_field__unknown_event__then_error() {
        assert!(Record::new().field("event", "bogus").is_err());
    }

    #[test]
    fn merged_over__call_fields_win__then_prefill_fills_gaps() {
        let base = Record::new()
            .collection("upgrade")
            .unit("test")
            .tag("bundle", "focal")
            .tag("zone", "a");
        let call = Record::new().unit("other").tag("zone", "b");

        let merged = call.merged_over(&base);

        assert_eq!(merged.collection.as_deref(), Some("upgrade"));
        assert_eq!(merged.unit.as_deref(), Some("other"));
        assert_eq!(merged.tags.get("bundle").map(String::as_str), Some("focal"));
        assert_eq!(merged.tags.get("zone").map(String::as_str), Some("b"));
    }
}
