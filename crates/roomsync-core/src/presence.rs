//! Presence tracking for roomsync.
//!
//! Presence has no history semantics: the most recently routed event for a
//! user is their presence, whatever its origin.

use roomsync_protocol::Event;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// Latest presence event per user.
#[derive(Debug, Default)]
pub struct PresenceStore {
    users: HashMap<String, Arc<Event>>,
}

impl PresenceStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the presence of `user_id`.
    ///
    /// Returns the previous event, if any.
    pub fn update(&mut self, user_id: impl Into<String>, event: Arc<Event>) -> Option<Arc<Event>> {
        let user_id = user_id.into();
        trace!(user = %user_id, "Presence updated");
        self.users.insert(user_id, event)
    }

    /// Get the presence of a user.
    #[must_use]
    pub fn get(&self, user_id: &str) -> Option<&Arc<Event>> {
        self.users.get(user_id)
    }

    /// `content.presence` of a user's latest event, e.g. `online`.
    #[must_use]
    pub fn status(&self, user_id: &str) -> Option<&str> {
        self.users
            .get(user_id)
            .and_then(|event| event.content.get("presence"))
            .and_then(serde_json::Value::as_str)
    }

    /// Number of tracked users.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Check if no presence has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Copy of all entries.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(String, Arc<Event>)> {
        self.users
            .iter()
            .map(|(user, event)| (user.clone(), Arc::clone(event)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomsync_protocol::types;
    use serde_json::json;

    fn presence(user: &str, status: &str) -> Arc<Event> {
        Arc::new(
            Event::new(types::PRESENCE)
                .with_content(json!({"user_id": user, "presence": status})),
        )
    }

    #[test]
    fn test_last_write_wins() {
        let mut store = PresenceStore::new();

        assert!(store.update("@a:hs", presence("@a:hs", "online")).is_none());
        assert!(store.update("@a:hs", presence("@a:hs", "offline")).is_some());

        assert_eq!(store.len(), 1);
        assert_eq!(store.status("@a:hs"), Some("offline"));
    }

    #[test]
    fn test_snapshot() {
        let mut store = PresenceStore::new();
        store.update("@a:hs", presence("@a:hs", "online"));
        store.update("@b:hs", presence("@b:hs", "unavailable"));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert!(store.get("@c:hs").is_none());
    }
}
