//! Event model for roomsync.
//!
//! Events arrive already parsed from the transport. The core never validates
//! `content`; it only reads the handful of fields its merge policies need.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Well-known event type strings.
pub mod types {
    pub const ROOM_CREATE: &str = "m.room.create";
    pub const ROOM_ALIASES: &str = "m.room.aliases";
    pub const ROOM_MESSAGE: &str = "m.room.message";
    pub const ROOM_MEMBER: &str = "m.room.member";
    pub const PRESENCE: &str = "m.presence";
    pub const ROOM_NAME: &str = "m.room.name";
    pub const ROOM_TOPIC: &str = "m.room.topic";

    pub const POWER_LEVELS: &str = "m.room.power_levels";
    pub const OPS_LEVELS: &str = "m.room.ops_levels";
    pub const SEND_EVENT_LEVEL: &str = "m.room.send_event_level";
    pub const ADD_STATE_LEVEL: &str = "m.room.add_state_level";
    pub const JOIN_RULES: &str = "m.room.join_rules";

    /// Prefix shared by every call signalling event.
    pub const CALL_PREFIX: &str = "m.call.";
    pub const CALL_INVITE: &str = "m.call.invite";

    /// Message kinds a client may echo locally before the server confirms them.
    pub const TEXT_LIKE_MSGTYPES: [&str; 2] = ["m.text", "m.emote"];

    /// Membership value of a joined member.
    pub const MEMBERSHIP_JOIN: &str = "join";
}

/// Classification of an event type string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Any `m.call.*` event. `invite` is set for `m.call.invite`.
    Call {
        /// Whether this is a call invitation.
        invite: bool,
    },
    /// `m.room.create`.
    RoomCreate,
    /// `m.room.aliases`.
    RoomAliases,
    /// `m.room.message`.
    Message,
    /// `m.room.member`.
    Membership,
    /// `m.presence`.
    Presence,
    /// One of the power-level family types.
    PowerLevels,
    /// `m.room.name`.
    Name,
    /// `m.room.topic`.
    Topic,
    /// Anything else.
    Unknown,
}

impl EventKind {
    /// Classify an event type string.
    #[must_use]
    pub fn classify(event_type: &str) -> Self {
        if event_type.starts_with(types::CALL_PREFIX) {
            return EventKind::Call {
                invite: event_type == types::CALL_INVITE,
            };
        }

        match event_type {
            types::ROOM_CREATE => EventKind::RoomCreate,
            types::ROOM_ALIASES => EventKind::RoomAliases,
            types::ROOM_MESSAGE => EventKind::Message,
            types::ROOM_MEMBER => EventKind::Membership,
            types::PRESENCE => EventKind::Presence,
            types::POWER_LEVELS
            | types::OPS_LEVELS
            | types::SEND_EVENT_LEVEL
            | types::ADD_STATE_LEVEL
            | types::JOIN_RULES => EventKind::PowerLevels,
            types::ROOM_NAME => EventKind::Name,
            types::ROOM_TOPIC => EventKind::Topic,
            _ => EventKind::Unknown,
        }
    }
}

/// A single event as received from any source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Server-assigned identifier. Absent on some legacy payloads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,

    /// Event type string, e.g. `m.room.message`.
    #[serde(rename = "type")]
    pub event_type: String,

    /// Room this event belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,

    /// Sender.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// State key for state events (the target user for memberships).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_key: Option<String>,

    /// Type-dependent payload.
    #[serde(default)]
    pub content: Value,

    /// Content this state event replaced, if the server supplied it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_content: Option<Value>,

    /// Origin timestamp in milliseconds.
    #[serde(
        default,
        alias = "origin_server_ts",
        skip_serializing_if = "Option::is_none"
    )]
    pub ts: Option<u64>,
}

impl Event {
    /// Create an event of the given type with empty content.
    #[must_use]
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_id: None,
            event_type: event_type.into(),
            room_id: None,
            user_id: None,
            state_key: None,
            content: Value::Null,
            prev_content: None,
            ts: None,
        }
    }

    /// Set the event id.
    #[must_use]
    pub fn with_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = Some(event_id.into());
        self
    }

    /// Set the room id.
    #[must_use]
    pub fn in_room(mut self, room_id: impl Into<String>) -> Self {
        self.room_id = Some(room_id.into());
        self
    }

    /// Set the sender.
    #[must_use]
    pub fn from_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set the state key.
    #[must_use]
    pub fn with_state_key(mut self, state_key: impl Into<String>) -> Self {
        self.state_key = Some(state_key.into());
        self
    }

    /// Set the content.
    #[must_use]
    pub fn with_content(mut self, content: Value) -> Self {
        self.content = content;
        self
    }

    /// Set the previous content.
    #[must_use]
    pub fn with_prev_content(mut self, prev_content: Value) -> Self {
        self.prev_content = Some(prev_content);
        self
    }

    /// Set the timestamp.
    #[must_use]
    pub fn at(mut self, ts: u64) -> Self {
        self.ts = Some(ts);
        self
    }

    /// Classify this event's type.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        EventKind::classify(&self.event_type)
    }

    /// `content.membership`.
    #[must_use]
    pub fn membership(&self) -> Option<&str> {
        self.content.get("membership").and_then(Value::as_str)
    }

    /// Membership before this event.
    ///
    /// Reads `prev_content.membership`, falling back to the legacy
    /// `content.prev` field older servers emitted.
    #[must_use]
    pub fn prev_membership(&self) -> Option<&str> {
        self.prev_content
            .as_ref()
            .and_then(|prev| prev.get("membership"))
            .and_then(Value::as_str)
            .or_else(|| self.content.get("prev").and_then(Value::as_str))
    }

    /// `content.msgtype`.
    #[must_use]
    pub fn msgtype(&self) -> Option<&str> {
        self.content.get("msgtype").and_then(Value::as_str)
    }

    /// Whether this is a text or emote message.
    #[must_use]
    pub fn is_text_like(&self) -> bool {
        self.msgtype()
            .is_some_and(|t| types::TEXT_LIKE_MSGTYPES.contains(&t))
    }

    /// User a presence event is about: `content.user_id`, else the sender.
    #[must_use]
    pub fn presence_user_id(&self) -> Option<&str> {
        self.content
            .get("user_id")
            .and_then(Value::as_str)
            .or(self.user_id.as_deref())
    }

    /// First entry of `content.aliases`.
    #[must_use]
    pub fn first_alias(&self) -> Option<&str> {
        self.content
            .get("aliases")
            .and_then(Value::as_array)
            .and_then(|aliases| aliases.first())
            .and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify() {
        assert_eq!(EventKind::classify("m.room.message"), EventKind::Message);
        assert_eq!(
            EventKind::classify("m.call.invite"),
            EventKind::Call { invite: true }
        );
        assert_eq!(
            EventKind::classify("m.call.hangup"),
            EventKind::Call { invite: false }
        );
        assert_eq!(EventKind::classify("m.room.join_rules"), EventKind::PowerLevels);
        assert_eq!(EventKind::classify("m.room.ops_levels"), EventKind::PowerLevels);
        assert_eq!(EventKind::classify("org.example.custom"), EventKind::Unknown);
    }

    #[test]
    fn test_parse_event_json() {
        let event: Event = serde_json::from_str(
            r#"{
                "event_id": "$1",
                "type": "m.room.member",
                "room_id": "!room:hs",
                "user_id": "@alice:hs",
                "state_key": "@alice:hs",
                "content": {"membership": "join"},
                "prev_content": {"membership": "invite"},
                "origin_server_ts": 42
            }"#,
        )
        .unwrap();

        assert_eq!(event.kind(), EventKind::Membership);
        assert_eq!(event.membership(), Some("join"));
        assert_eq!(event.prev_membership(), Some("invite"));
        assert_eq!(event.ts, Some(42));
    }

    #[test]
    fn test_legacy_prev_membership() {
        let event = Event::new(types::ROOM_MEMBER)
            .with_content(json!({"membership": "leave", "prev": "join"}));
        assert_eq!(event.prev_membership(), Some("join"));
    }

    #[test]
    fn test_content_accessors() {
        let msg = Event::new(types::ROOM_MESSAGE).with_content(json!({"msgtype": "m.emote"}));
        assert!(msg.is_text_like());

        let image = Event::new(types::ROOM_MESSAGE).with_content(json!({"msgtype": "m.image"}));
        assert!(!image.is_text_like());

        let presence = Event::new(types::PRESENCE).from_user("@bob:hs");
        assert_eq!(presence.presence_user_id(), Some("@bob:hs"));

        let aliases = Event::new(types::ROOM_ALIASES)
            .with_content(json!({"aliases": ["#a:hs", "#b:hs"]}));
        assert_eq!(aliases.first_alias(), Some("#a:hs"));
    }
}
