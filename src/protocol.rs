//! Protocol — wire vocabulary for the collaboration coordinator.
//!
//! ARCHITECTURE
//! ============
//! Every client message is an Envelope: an event name plus a flat key-value
//! payload. The WS handler routes on the event name and hands the payload to
//! the session controller, which extracts fields with the tolerant accessors
//! below. Unrecognized enum values parse to `None` and the triggering message
//! (or field) is dropped silently — this is best-effort realtime signaling,
//! not a transactional API.
//!
//! DESIGN
//! ======
//! - Flat data: payloads are always `Map<String, Value>`, never nested.
//! - Outbound messages are `{event, data}` with camelCase data keys, matching
//!   what the Angular client consumes.
//! - `ScopeKey` is the single index key everywhere: two connections are "in
//!   the same scope" iff their keys are equal. Only equality is ever used;
//!   the key is never decoded.

use std::collections::HashMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// =============================================================================
// TYPES
// =============================================================================

/// Flat key-value payload. Alias to reduce noise in signatures.
pub type Data = HashMap<String, serde_json::Value>;

/// Inbound client message: event name + flat payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientEnvelope {
    pub event: String,
    #[serde(default)]
    pub data: Data,
}

/// Outbound server message. Serialized once per recipient channel.
#[derive(Debug, Clone, Serialize)]
pub struct ServerMessage {
    pub event: String,
    pub data: serde_json::Value,
}

impl ServerMessage {
    pub fn new(event: impl Into<String>, data: impl Serialize) -> Self {
        Self {
            event: event.into(),
            data: serde_json::to_value(data).unwrap_or(serde_json::Value::Null),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(#[from] serde_json::Error),
    #[error("invalid envelope: expected a JSON object")]
    NotAnObject,
}

impl ClientEnvelope {
    /// Parse one inbound text frame.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the text is not a JSON object with an
    /// `event` string. The object check is explicit: serde would otherwise
    /// accept a sequence like `["x"]` as positional struct fields.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        if !value.is_object() {
            return Err(ProtocolError::NotAnObject);
        }
        Ok(serde_json::from_value(value)?)
    }
}

// =============================================================================
// EVENT NAMES
// =============================================================================

pub mod events {
    // Inbound.
    pub const SESSION_HELLO: &str = "session.hello";
    pub const PRESENCE_UPDATE: &str = "presence.update";
    pub const SELECTION_UPDATE: &str = "selection.update";
    pub const EDIT_UPDATE: &str = "edit.update";
    pub const CURSOR_UPDATE: &str = "cursor.update";

    // Outbound only.
    pub const SESSION_CONNECTED: &str = "session.connected";
    pub const PRESENCE_SNAPSHOT: &str = "presence.snapshot";
    pub const SELECTION_SNAPSHOT: &str = "selection.snapshot";
    pub const EDIT_SNAPSHOT: &str = "edit.snapshot";
    pub const REALTIME_EVENT: &str = "realtime.event";
}

// =============================================================================
// SCOPE
// =============================================================================

/// Logical editing scope. One Gantt board / list view per scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    Orders,
    Business,
    Customers,
    Templates,
}

impl Scope {
    /// Parse a client-supplied scope. Unknown values yield `None`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "orders" => Some(Self::Orders),
            "business" => Some(Self::Business),
            "customers" => Some(Self::Customers),
            "templates" => Some(Self::Templates),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Orders => "orders",
            Self::Business => "business",
            Self::Customers => "customers",
            Self::Templates => "templates",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque index key derived from `(scope, boardId)`.
///
/// Total, pure, deterministic. Scope names are a fixed enum and contain no
/// `#`, so `orders` and `orders#x` can never collide across distinct inputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeKey(String);

impl ScopeKey {
    #[must_use]
    pub fn new(scope: Scope, board_id: Option<&str>) -> Self {
        match board_id {
            Some(board) => Self(format!("{scope}#{board}")),
            None => Self(scope.as_str().to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// ENTITY TYPES
// =============================================================================

/// Domain entities a client can select or edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityType {
    Order,
    OrderItem,
    Business,
    Customer,
    ScheduleTemplate,
    BusinessTemplate,
}

impl EntityType {
    /// Parse a client-supplied entity type. Unknown values yield `None`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "order" => Some(Self::Order),
            "orderItem" => Some(Self::OrderItem),
            "business" => Some(Self::Business),
            "customer" => Some(Self::Customer),
            "scheduleTemplate" => Some(Self::ScheduleTemplate),
            "businessTemplate" => Some(Self::BusinessTemplate),
            _ => None,
        }
    }
}

// =============================================================================
// SELECTION MODE / EDIT STATE
// =============================================================================

/// How a selection is being used: plain selection or an open edit form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    #[default]
    Select,
    Edit,
}

impl SelectionMode {
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "select" => Some(Self::Select),
            "edit" => Some(Self::Edit),
            _ => None,
        }
    }
}

/// Field-level edit transition carried by `edit.update`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditState {
    Start,
    Focus,
    Change,
    Blur,
    End,
}

impl EditState {
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "start" => Some(Self::Start),
            "focus" => Some(Self::Focus),
            "change" => Some(Self::Change),
            "blur" => Some(Self::Blur),
            "end" => Some(Self::End),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Focus => "focus",
            Self::Change => "change",
            Self::Blur => "blur",
            Self::End => "end",
        }
    }
}

// =============================================================================
// PAYLOAD ACCESSORS
// =============================================================================

/// Read a non-empty string field from a payload.
#[must_use]
pub fn data_str<'a>(data: &'a Data, key: &str) -> Option<&'a str> {
    data.get(key).and_then(|v| v.as_str()).filter(|s| !s.is_empty())
}

/// Read a string-array field from a payload, skipping non-string elements.
#[must_use]
pub fn data_str_list(data: &Data, key: &str) -> Vec<String> {
    data.get(key)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str())
                .map(ToString::to_string)
                .collect()
        })
        .unwrap_or_default()
}

// =============================================================================
// TIME
// =============================================================================

/// Current time as milliseconds since Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

#[cfg(test)]
#[path = "protocol_test.rs"]
mod tests;
