// src/recording/event.rs
//! Telemetry event record
//!
//! Events serialize to a compact flat JSON object:
//!
//! ```json
//! {"e": "ButtonClicked", "t": 1700000000, "c": "HomePage", "extraData": "123"}
//! ```
//!
//! `e` is the event name, `t` the timestamp in whole seconds since epoch,
//! `c` an optional context label. Any other keys are caller-supplied fields.
//!
//! Decoding never rejects an object. A reserved key holding an unexpected
//! type (`"c": 5`, `"t": 2.5`) is kept verbatim among the extra fields and
//! written back unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form fields attached to an event
pub type Fields = Map<String, Value>;

/// Key of the event name
pub const NAME_KEY: &str = "e";

/// Key of the timestamp
pub const TIMESTAMP_KEY: &str = "t";

/// Key of the context label
pub const CONTEXT_KEY: &str = "c";

/// A single recorded event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Fields", into = "Fields")]
pub struct Event {
    /// Event name
    pub name: String,

    /// Timestamp (whole seconds since epoch)
    pub timestamp: i64,

    /// Optional context (screen, component, ...)
    pub context: Option<String>,

    /// Additional fields, including reserved keys decoded with a foreign type
    extra: Fields,
}

impl Event {
    pub fn new(name: impl Into<String>, timestamp: i64) -> Self {
        Self {
            name: name.into(),
            timestamp,
            context: None,
            extra: Fields::new(),
        }
    }

    /// Set the context label. Empty labels are ignored.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        let context = context.into();
        if !context.is_empty() {
            self.extra.remove(CONTEXT_KEY);
            self.context = Some(context);
        }
        self
    }

    /// Attach an extra field.
    ///
    /// `e` and `t` are owned by the recorder and are dropped. `c` is kept only
    /// when no context is set yet: a string becomes the context, any other
    /// value is stored as is.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        let key = key.into();
        match key.as_str() {
            NAME_KEY | TIMESTAMP_KEY => {}
            CONTEXT_KEY => {
                if self.context.is_none() {
                    match value {
                        Value::String(context) => self = self.with_context(context),
                        other => {
                            self.extra.insert(key, other);
                        }
                    }
                }
            }
            _ => {
                self.extra.insert(key, value);
            }
        }
        self
    }

    /// Attach several extra fields, see [`Event::with_field`]
    pub fn with_fields(self, fields: Fields) -> Self {
        fields
            .into_iter()
            .fold(self, |event, (key, value)| event.with_field(key, value))
    }

    /// Look up an extra field
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// All extra fields
    pub fn fields(&self) -> &Fields {
        &self.extra
    }

    /// Whether this event is one of the session markers
    pub fn marker(&self) -> Option<SessionMarker> {
        SessionMarker::from_name(&self.name)
    }
}

impl From<Fields> for Event {
    fn from(mut fields: Fields) -> Self {
        let mut event = Event::new(String::new(), 0);

        match fields.remove(NAME_KEY) {
            Some(Value::String(name)) => event.name = name,
            Some(other) => {
                event.extra.insert(NAME_KEY.to_string(), other);
            }
            None => {}
        }

        match fields.remove(TIMESTAMP_KEY) {
            Some(Value::Number(t)) => match t.as_i64() {
                Some(secs) => event.timestamp = secs,
                None => {
                    event.timestamp = t.as_f64().map_or(0, |secs| secs as i64);
                    event.extra.insert(TIMESTAMP_KEY.to_string(), Value::Number(t));
                }
            },
            Some(other) => {
                event.extra.insert(TIMESTAMP_KEY.to_string(), other);
            }
            None => {}
        }

        match fields.remove(CONTEXT_KEY) {
            Some(Value::String(context)) if !context.is_empty() => event.context = Some(context),
            Some(other) => {
                event.extra.insert(CONTEXT_KEY.to_string(), other);
            }
            None => {}
        }

        event.extra.extend(fields);
        event
    }
}

impl From<Event> for Fields {
    fn from(event: Event) -> Self {
        let mut fields = Fields::new();
        fields.insert(NAME_KEY.to_string(), Value::String(event.name));
        fields.insert(TIMESTAMP_KEY.to_string(), Value::from(event.timestamp));
        if let Some(context) = event.context {
            fields.insert(CONTEXT_KEY.to_string(), Value::String(context));
        }
        // Foreign reserved values override the typed defaults
        fields.extend(event.extra);
        fields
    }
}

/// Event names the tracker records on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionMarker {
    StartSession,
    EndSession,
    Hidden,
    Visible,
}

impl SessionMarker {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionMarker::StartSession => "StartSession",
            SessionMarker::EndSession => "EndSession",
            SessionMarker::Hidden => "Hidden",
            SessionMarker::Visible => "Visible",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "StartSession" => Some(SessionMarker::StartSession),
            "EndSession" => Some(SessionMarker::EndSession),
            "Hidden" => Some(SessionMarker::Hidden),
            "Visible" => Some(SessionMarker::Visible),
            _ => None,
        }
    }
}

impl std::fmt::Display for SessionMarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serialize_flat() {
        let event = Event::new("ButtonClicked", 1_700_000_000)
            .with_context("HomePage")
            .with_field("extraData", json!("123"));

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({"e": "ButtonClicked", "t": 1_700_000_000, "c": "HomePage", "extraData": "123"})
        );
    }

    #[test]
    fn test_context_omitted_when_absent() {
        let event = Event::new("EndSession", 5);
        let encoded = serde_json::to_string(&event).unwrap();
        assert!(!encoded.contains("\"c\""));
    }

    #[test]
    fn test_deserialize_collects_extra_fields() {
        let event: Event =
            serde_json::from_str(r#"{"e":"Event1","t":10,"userId":"42","count":3}"#).unwrap();
        assert_eq!(event.name, "Event1");
        assert_eq!(event.timestamp, 10);
        assert_eq!(event.context, None);
        assert_eq!(event.field("userId"), Some(&json!("42")));
        assert_eq!(event.field("count"), Some(&json!(3)));
        assert_eq!(event.fields().len(), 2);
    }

    #[test]
    fn test_reserved_fields_ignored() {
        let event = Event::new("Real", 1)
            .with_field("e", json!("Fake"))
            .with_field("t", json!(999));

        assert_eq!(event.name, "Real");
        assert_eq!(event.timestamp, 1);
        assert!(event.fields().is_empty());
    }

    #[test]
    fn test_context_field_fills_missing_context() {
        let event = Event::new("Click", 1).with_field("c", json!("Settings"));
        assert_eq!(event.context.as_deref(), Some("Settings"));

        let explicit = Event::new("Click", 1)
            .with_context("Home")
            .with_field("c", json!("Settings"));
        assert_eq!(explicit.context.as_deref(), Some("Home"));
    }

    #[test]
    fn test_non_string_context_field_kept() {
        let event = Event::new("Click", 1).with_field("c", json!(5));
        assert_eq!(event.context, None);
        assert_eq!(event.field("c"), Some(&json!(5)));
        assert_eq!(serde_json::to_value(&event).unwrap()["c"], json!(5));

        let explicit = Event::new("Click", 1)
            .with_context("Home")
            .with_field("c", json!(5));
        assert_eq!(explicit.field("c"), None);
        assert_eq!(serde_json::to_value(&explicit).unwrap()["c"], json!("Home"));
    }

    #[test]
    fn test_foreign_reserved_types_round_trip() {
        for raw in [
            json!({"e": "B", "t": 2, "c": 5}),
            json!({"e": "C", "t": 2.5}),
            json!({"e": 42, "t": "yesterday", "c": "", "x": [1, 2]}),
        ] {
            let event: Event = serde_json::from_value(raw.clone()).unwrap();
            assert_eq!(serde_json::to_value(&event).unwrap(), raw);
        }

        let event: Event = serde_json::from_value(json!({"e": "C", "t": 2.5})).unwrap();
        assert_eq!(event.name, "C");
        assert_eq!(event.timestamp, 2);
        assert_eq!(event.context, None);
    }

    #[test]
    fn test_missing_timestamp_decodes() {
        let event: Event = serde_json::from_value(json!({"e": "D"})).unwrap();
        assert_eq!(event.name, "D");
        assert_eq!(event.timestamp, 0);
        assert!(event.fields().is_empty());
    }

    #[test]
    fn test_empty_context_ignored() {
        let event = Event::new("Click", 1).with_context("");
        assert_eq!(event.context, None);
    }

    #[test]
    fn test_marker_names() {
        for marker in [
            SessionMarker::StartSession,
            SessionMarker::EndSession,
            SessionMarker::Hidden,
            SessionMarker::Visible,
        ] {
            assert_eq!(SessionMarker::from_name(marker.as_str()), Some(marker));
        }
        assert_eq!(Event::new("Other", 0).marker(), None);
    }
}
