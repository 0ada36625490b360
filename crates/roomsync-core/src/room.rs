//! Per-room state.
//!
//! A room's message sequence grows in two directions: live events are
//! appended at the tail, backfilled history is prepended at the head. The
//! store never re-sorts; the transport is expected to page strictly
//! backwards and stream strictly forwards.

use roomsync_protocol::Event;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::debug;

/// A room identifier.
pub type RoomId = String;

/// Pagination cursor value before any history has been fetched.
pub const INITIAL_PAGINATION_TOKEN: &str = "END";

/// How far back a room's history has been fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    /// Opaque cursor of the oldest fetched page.
    pub earliest_token: String,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            earliest_token: INITIAL_PAGINATION_TOKEN.to_string(),
        }
    }
}

/// Reconciled view of a single room.
#[derive(Debug, Clone)]
pub struct RoomState {
    room_id: RoomId,
    messages: VecDeque<Arc<Event>>,
    members: HashMap<String, Arc<Event>>,
    metadata: HashMap<String, Arc<Event>>,
    pagination: Pagination,
}

impl RoomState {
    /// Create an empty room.
    #[must_use]
    pub fn new(room_id: impl Into<RoomId>) -> Self {
        Self {
            room_id: room_id.into(),
            messages: VecDeque::new(),
            members: HashMap::new(),
            metadata: HashMap::new(),
            pagination: Pagination::default(),
        }
    }

    /// Get the room id.
    #[must_use]
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Message stream, oldest first once fully backfilled.
    #[must_use]
    pub fn messages(&self) -> &VecDeque<Arc<Event>> {
        &self.messages
    }

    /// Latest membership event per member (keyed by state key).
    #[must_use]
    pub fn members(&self) -> &HashMap<String, Arc<Event>> {
        &self.members
    }

    /// Latest membership event for one member.
    #[must_use]
    pub fn member(&self, state_key: &str) -> Option<&Arc<Event>> {
        self.members.get(state_key)
    }

    /// Latest stored event of a metadata type (name, topic, power levels).
    #[must_use]
    pub fn metadata(&self, event_type: &str) -> Option<&Arc<Event>> {
        self.metadata.get(event_type)
    }

    /// Pagination state.
    #[must_use]
    pub fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    /// Add an event at the tail.
    pub fn append(&mut self, event: Arc<Event>) {
        self.messages.push_back(event);
    }

    /// Add an event at the head.
    pub fn prepend(&mut self, event: Arc<Event>) {
        self.messages.push_front(event);
    }

    /// Append when `is_live`, prepend otherwise.
    pub fn insert_directional(&mut self, event: Arc<Event>, is_live: bool) {
        if is_live {
            self.append(event);
        } else {
            self.prepend(event);
        }
    }

    /// Replace the entry with the same event id, searching from the tail, or
    /// append if there is none.
    ///
    /// Returns `true` if an existing entry was replaced.
    pub fn replace_or_append(&mut self, event: Arc<Event>) -> bool {
        let position = event.event_id.as_deref().and_then(|id| {
            self.messages
                .iter()
                .rposition(|m| m.event_id.as_deref() == Some(id))
        });

        match position {
            Some(index) => {
                self.messages[index] = event;
                true
            }
            None => {
                self.messages.push_back(event);
                false
            }
        }
    }

    /// Record the latest membership event for `state_key`.
    pub fn set_member(&mut self, state_key: impl Into<String>, event: Arc<Event>) {
        self.members.insert(state_key.into(), event);
    }

    /// Store `event` as the latest of its type.
    pub fn set_metadata(&mut self, event: Arc<Event>) {
        self.metadata.insert(event.event_type.clone(), event);
    }

    /// Set the pagination cursor.
    pub fn set_earliest_token(&mut self, token: impl Into<String>) {
        self.pagination.earliest_token = token.into();
    }

    /// Drop all messages, keeping members, metadata, and pagination.
    pub fn clear_messages(&mut self) {
        self.messages.clear();
    }
}

/// All rooms known to the core, created on first reference.
#[derive(Debug, Default)]
pub struct RoomStore {
    rooms: HashMap<RoomId, RoomState>,
}

impl RoomStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a room, creating it if it does not exist.
    pub fn ensure(&mut self, room_id: &str) -> &mut RoomState {
        self.rooms.entry(room_id.to_string()).or_insert_with(|| {
            debug!(room = %room_id, "Creating room state");
            RoomState::new(room_id)
        })
    }

    /// Get a room.
    #[must_use]
    pub fn get(&self, room_id: &str) -> Option<&RoomState> {
        self.rooms.get(room_id)
    }

    /// Check if a room exists.
    #[must_use]
    pub fn contains(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// Clear a room's messages. Unknown rooms are left alone.
    ///
    /// Returns `true` if the room existed.
    pub fn reset_messages(&mut self, room_id: &str) -> bool {
        match self.rooms.get_mut(room_id) {
            Some(room) => {
                room.clear_messages();
                debug!(room = %room_id, "Reset room messages");
                true
            }
            None => false,
        }
    }

    /// All room ids.
    #[must_use]
    pub fn room_ids(&self) -> Vec<&str> {
        self.rooms.keys().map(String::as_str).collect()
    }

    /// Number of rooms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Check if no room has been seen.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Store statistics.
    #[must_use]
    pub fn stats(&self) -> RoomStats {
        RoomStats {
            room_count: self.rooms.len(),
            message_count: self.rooms.values().map(|r| r.messages.len()).sum(),
            member_count: self.rooms.values().map(|r| r.members.len()).sum(),
        }
    }
}

/// Room store statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomStats {
    /// Number of rooms.
    pub room_count: usize,
    /// Messages across all rooms.
    pub message_count: usize,
    /// Members across all rooms.
    pub member_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomsync_protocol::types;

    fn msg(id: &str) -> Arc<Event> {
        Arc::new(Event::new(types::ROOM_MESSAGE).with_id(id).in_room("!r:hs"))
    }

    fn ids(room: &RoomState) -> Vec<&str> {
        room.messages()
            .iter()
            .filter_map(|m| m.event_id.as_deref())
            .collect()
    }

    #[test]
    fn test_room_creation() {
        let room = RoomState::new("!r:hs");
        assert_eq!(room.room_id(), "!r:hs");
        assert!(room.messages().is_empty());
        assert_eq!(room.pagination().earliest_token, INITIAL_PAGINATION_TOKEN);
    }

    #[test]
    fn test_directional_insert() {
        let mut room = RoomState::new("!r:hs");
        room.insert_directional(msg("$m"), true);
        room.insert_directional(msg("$b"), false);
        room.insert_directional(msg("$a"), false);
        room.insert_directional(msg("$n"), true);

        assert_eq!(ids(&room), vec!["$a", "$b", "$m", "$n"]);
    }

    #[test]
    fn test_replace_or_append() {
        let mut room = RoomState::new("!r:hs");
        room.append(msg("$1"));
        room.append(msg("$2"));

        let echo = Arc::new(
            Event::new(types::ROOM_MESSAGE)
                .with_id("$1")
                .with_content(serde_json::json!({"body": "confirmed"})),
        );
        assert!(room.replace_or_append(echo));
        assert_eq!(ids(&room), vec!["$1", "$2"]);
        assert_eq!(room.messages()[0].content["body"], "confirmed");

        assert!(!room.replace_or_append(msg("$3")));
        assert_eq!(ids(&room), vec!["$1", "$2", "$3"]);
    }

    #[test]
    fn test_store_ensure_and_reset() {
        let mut store = RoomStore::new();
        assert!(!store.contains("!r:hs"));

        store.ensure("!r:hs").append(msg("$1"));
        store.ensure("!r:hs").set_member(
            "@a:hs",
            Arc::new(Event::new(types::ROOM_MEMBER).with_state_key("@a:hs")),
        );
        store.ensure("!r:hs").set_earliest_token("t5");
        assert_eq!(store.len(), 1);

        assert!(store.reset_messages("!r:hs"));
        assert!(!store.reset_messages("!missing:hs"));

        let room = store.get("!r:hs").unwrap();
        assert!(room.messages().is_empty());
        assert_eq!(room.members().len(), 1);
        assert_eq!(room.pagination().earliest_token, "t5");
    }

    #[test]
    fn test_store_stats() {
        let mut store = RoomStore::new();
        store.ensure("!a:hs").append(msg("$1"));
        store.ensure("!a:hs").append(msg("$2"));
        store.ensure("!b:hs").append(msg("$3"));

        let stats = store.stats();
        assert_eq!(stats.room_count, 2);
        assert_eq!(stats.message_count, 3);
        assert_eq!(stats.member_count, 0);
    }
}
