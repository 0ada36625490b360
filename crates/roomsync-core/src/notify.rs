//! Typed notifications for downstream consumers.
//!
//! Each category has its own broadcast channel, plus one channel carrying
//! every notification. Publishing is synchronous and never fails; a
//! notification with no receivers is simply dropped.

use roomsync_protocol::Event;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::trace;

/// Default broadcast capacity per category.
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 1024;

/// What kind of state change a notification reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationCategory {
    /// A room was created.
    RoomCreated,
    /// A message was added or replaced.
    Message,
    /// A member joined, left, or changed membership.
    MembershipChanged,
    /// A user's presence changed.
    PresenceChanged,
    /// Power levels or join rules changed.
    PowerLevelsChanged,
    /// Call signalling.
    Call,
    /// Room name changed.
    NameChanged,
    /// Room topic changed.
    TopicChanged,
}

impl NotificationCategory {
    /// All categories.
    pub const ALL: [NotificationCategory; 8] = [
        NotificationCategory::RoomCreated,
        NotificationCategory::Message,
        NotificationCategory::MembershipChanged,
        NotificationCategory::PresenceChanged,
        NotificationCategory::PowerLevelsChanged,
        NotificationCategory::Call,
        NotificationCategory::NameChanged,
        NotificationCategory::TopicChanged,
    ];

    /// Stable snake_case name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationCategory::RoomCreated => "room_created",
            NotificationCategory::Message => "message",
            NotificationCategory::MembershipChanged => "membership_changed",
            NotificationCategory::PresenceChanged => "presence_changed",
            NotificationCategory::PowerLevelsChanged => "power_levels_changed",
            NotificationCategory::Call => "call",
            NotificationCategory::NameChanged => "name_changed",
            NotificationCategory::TopicChanged => "topic_changed",
        }
    }
}

impl fmt::Display for NotificationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A committed state change.
#[derive(Debug, Clone)]
pub struct Notification {
    /// Category.
    pub category: NotificationCategory,
    /// The routed event, shared with the stores.
    pub event: Arc<Event>,
    /// Delivered by the live stream.
    pub is_live: bool,
    /// Delivered as a state snapshot.
    pub is_state: bool,
}

/// Per-category publish/subscribe hub.
#[derive(Debug)]
pub struct NotificationHub {
    senders: HashMap<NotificationCategory, broadcast::Sender<Arc<Notification>>>,
    all: broadcast::Sender<Arc<Notification>>,
}

impl NotificationHub {
    /// Create a hub with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_NOTIFICATION_CAPACITY)
    }

    /// Create a hub whose channels buffer `capacity` notifications.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let senders = NotificationCategory::ALL
            .iter()
            .map(|&category| (category, broadcast::channel(capacity).0))
            .collect();
        let (all, _) = broadcast::channel(capacity);
        Self { senders, all }
    }

    /// Subscribe to one category.
    #[must_use]
    pub fn subscribe(&self, category: NotificationCategory) -> broadcast::Receiver<Arc<Notification>> {
        self.senders[&category].subscribe()
    }

    /// Subscribe to every category.
    #[must_use]
    pub fn subscribe_all(&self) -> broadcast::Receiver<Arc<Notification>> {
        self.all.subscribe()
    }

    /// Number of receivers for a category, not counting catch-all receivers.
    #[must_use]
    pub fn subscriber_count(&self, category: NotificationCategory) -> usize {
        self.senders[&category].receiver_count()
    }

    /// Publish a notification.
    ///
    /// Returns the number of receivers that got it.
    pub fn publish(&self, notification: Notification) -> usize {
        let category = notification.category;
        let notification = Arc::new(notification);

        let direct = self.senders[&category]
            .send(Arc::clone(&notification))
            .unwrap_or_default();
        let catch_all = self.all.send(notification).unwrap_or_default();

        trace!(category = %category, recipients = direct + catch_all, "Published notification");
        direct + catch_all
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomsync_protocol::types;

    fn notification(category: NotificationCategory) -> Notification {
        Notification {
            category,
            event: Arc::new(Event::new(types::ROOM_MESSAGE).with_id("$1")),
            is_live: true,
            is_state: false,
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        let hub = NotificationHub::new();
        assert_eq!(hub.publish(notification(NotificationCategory::Message)), 0);
    }

    #[test]
    fn test_category_isolation() {
        let hub = NotificationHub::new();
        let mut messages = hub.subscribe(NotificationCategory::Message);
        let mut topics = hub.subscribe(NotificationCategory::TopicChanged);
        let mut all = hub.subscribe_all();

        assert_eq!(hub.publish(notification(NotificationCategory::Message)), 2);

        let received = messages.try_recv().unwrap();
        assert_eq!(received.category, NotificationCategory::Message);
        assert!(received.is_live);
        assert!(topics.try_recv().is_err());
        assert!(all.try_recv().is_ok());
    }

    #[test]
    fn test_subscriber_count() {
        let hub = NotificationHub::new();
        let _rx1 = hub.subscribe(NotificationCategory::Call);
        let _rx2 = hub.subscribe(NotificationCategory::Call);

        assert_eq!(hub.subscriber_count(NotificationCategory::Call), 2);
        assert_eq!(hub.subscriber_count(NotificationCategory::NameChanged), 0);
    }

    #[tokio::test]
    async fn test_receive_async() {
        let hub = NotificationHub::new();
        let mut rx = hub.subscribe(NotificationCategory::PresenceChanged);

        hub.publish(notification(NotificationCategory::PresenceChanged));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event.event_id.as_deref(), Some("$1"));
    }
}
