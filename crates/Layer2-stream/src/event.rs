//! Decoded SSE events

use std::fmt;

/// Event type carried by the `event:` field
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum EventKind {
    /// No `event:` field (or an explicit `message`)
    #[default]
    Message,
    /// Any other named type
    Named(String),
}

impl EventKind {
    /// Interpret a raw `event:` field value. Surrounding whitespace is ignored.
    pub fn from_field(value: &str) -> Self {
        match value.trim() {
            "" | "message" => EventKind::Message,
            name => EventKind::Named(name.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Message => "message",
            EventKind::Named(name) => name,
        }
    }

    pub fn is_message(&self) -> bool {
        matches!(self, EventKind::Message)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One complete event
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseEvent {
    pub kind: EventKind,

    /// Concatenated `data:` payloads
    pub data: String,

    /// Last `id:` field, if any
    pub id: Option<String>,
}

impl SseEvent {
    pub fn message(data: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Message,
            data: data.into(),
            id: None,
        }
    }

    pub fn named(name: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            kind: EventKind::from_field(&name.into()),
            data: data.into(),
            id: None,
        }
    }

    pub fn event_type(&self) -> &str {
        self.kind.as_str()
    }

    /// Parse the payload as JSON
    pub fn json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_str(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_from_field() {
        assert_eq!(EventKind::from_field(""), EventKind::Message);
        assert_eq!(EventKind::from_field(" message "), EventKind::Message);
        assert_eq!(
            EventKind::from_field("  done "),
            EventKind::Named("done".into())
        );
    }

    #[test]
    fn test_named_message_is_message() {
        let event = SseEvent::named("message", "hi");
        assert!(event.kind.is_message());
        assert_eq!(event.event_type(), "message");
    }

    #[test]
    fn test_json_payload() {
        let event = SseEvent::named("done", r#"{"score": 0.92}"#);
        assert_eq!(event.json().unwrap()["score"], 0.92);
        assert!(SseEvent::message("not json").json().is_err());
    }
}
