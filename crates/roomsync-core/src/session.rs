//! Collaborators the router consults but does not own the logic of.

use std::collections::HashMap;
use tracing::debug;

/// Identity of the local user, used to recognise echoes of our own sends.
pub trait LocalIdentity: Send + Sync {
    /// The logged-in user id, if a session exists.
    fn user_id(&self) -> Option<&str>;
}

/// A fixed identity.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(Option<String>);

impl StaticIdentity {
    /// Identity for `user_id`.
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self(Some(user_id.into()))
    }

    /// No logged-in user.
    #[must_use]
    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl LocalIdentity for StaticIdentity {
    fn user_id(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

/// Receives room alias announcements.
pub trait AliasRegistry: Send {
    /// Record that `alias` names `room_id`.
    fn register_alias(&mut self, room_id: &str, alias: &str);
}

/// In-memory alias table with lookups in both directions.
#[derive(Debug, Default)]
pub struct AliasTable {
    by_room: HashMap<String, String>,
    by_alias: HashMap<String, String>,
}

impl AliasTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Alias registered for a room.
    #[must_use]
    pub fn alias_for(&self, room_id: &str) -> Option<&str> {
        self.by_room.get(room_id).map(String::as_str)
    }

    /// Room an alias points at.
    #[must_use]
    pub fn room_for(&self, alias: &str) -> Option<&str> {
        self.by_alias.get(alias).map(String::as_str)
    }

    /// Number of rooms with an alias.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_room.len()
    }

    /// Check if the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_room.is_empty()
    }
}

impl AliasRegistry for AliasTable {
    fn register_alias(&mut self, room_id: &str, alias: &str) {
        debug!(room = %room_id, alias = %alias, "Registering room alias");
        if let Some(old) = self.by_room.insert(room_id.to_string(), alias.to_string()) {
            self.by_alias.remove(&old);
        }
        self.by_alias.insert(alias.to_string(), room_id.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_identity() {
        assert_eq!(StaticIdentity::new("@me:hs").user_id(), Some("@me:hs"));
        assert_eq!(StaticIdentity::anonymous().user_id(), None);
    }

    #[test]
    fn test_alias_table() {
        let mut table = AliasTable::new();
        table.register_alias("!r:hs", "#old:hs");
        table.register_alias("!r:hs", "#new:hs");

        assert_eq!(table.alias_for("!r:hs"), Some("#new:hs"));
        assert_eq!(table.room_for("#new:hs"), Some("!r:hs"));
        assert_eq!(table.room_for("#old:hs"), None);
        assert_eq!(table.len(), 1);
    }
}
