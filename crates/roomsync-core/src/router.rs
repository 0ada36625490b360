//! Event router for roomsync.
//!
//! The router is the only writer of room, presence, and dedup state. Every
//! event goes through the same pipeline: duplicate check (non-state events
//! only), classification, the per-type merge policy, then a notification
//! once the mutation is committed. Anomalies never escape as errors; they
//! come back as a [`RouteOutcome`] and a log line.

use crate::dedup::{DedupGuard, DEFAULT_DEDUP_CAPACITY};
use crate::notify::{
    Notification, NotificationCategory, NotificationHub, DEFAULT_NOTIFICATION_CAPACITY,
};
use crate::presence::PresenceStore;
use crate::room::{RoomState, RoomStats, RoomStore};
use crate::session::{AliasRegistry, AliasTable, LocalIdentity, StaticIdentity};
use crate::sync_gate::{InitialSyncGate, SyncWaiter};
use roomsync_protocol::{types, Delivery, Event, EventKind, RoomPage};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

/// Router errors.
#[derive(Debug, Error)]
pub enum RouterError {
    /// Configuration rejected at build time.
    #[error("Invalid router configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Router configuration.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Remembered event ids for duplicate suppression (`0` = unbounded).
    pub dedup_capacity: usize,
    /// Buffered notifications per category before slow receivers lag.
    pub notification_capacity: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            dedup_capacity: DEFAULT_DEDUP_CAPACITY,
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
        }
    }
}

/// Why a recognised event left state untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// A join whose previous membership was already join.
    NoOpRejoin,
    /// A backfilled power-level event for a type that already has a value.
    StalePowerLevels,
    /// An alias event without any alias.
    NoAlias,
}

/// Result of routing one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// State updated and a notification published.
    Applied(NotificationCategory),
    /// Alias handed to the alias registry.
    AliasRegistered,
    /// Non-state event already seen.
    Duplicate,
    /// Event type not handled.
    Unrecognized,
    /// Recognised but deliberately not applied.
    Ignored(IgnoreReason),
    /// A field the policy needs is missing.
    Malformed(&'static str),
}

/// Per-outcome counts for a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Applied events, alias registrations included.
    pub applied: usize,
    /// Duplicates discarded.
    pub duplicates: usize,
    /// Unrecognised types dropped.
    pub unrecognized: usize,
    /// Recognised events left unapplied.
    pub ignored: usize,
    /// Malformed events dropped.
    pub malformed: usize,
}

impl BatchReport {
    /// Count one outcome.
    pub fn record(&mut self, outcome: RouteOutcome) {
        match outcome {
            RouteOutcome::Applied(_) | RouteOutcome::AliasRegistered => self.applied += 1,
            RouteOutcome::Duplicate => self.duplicates += 1,
            RouteOutcome::Unrecognized => self.unrecognized += 1,
            RouteOutcome::Ignored(_) => self.ignored += 1,
            RouteOutcome::Malformed(_) => self.malformed += 1,
        }
    }

    /// Total events counted.
    #[must_use]
    pub fn total(&self) -> usize {
        self.applied + self.duplicates + self.unrecognized + self.ignored + self.malformed
    }
}

impl std::ops::AddAssign for BatchReport {
    fn add_assign(&mut self, other: Self) {
        self.applied += other.applied;
        self.duplicates += other.duplicates;
        self.unrecognized += other.unrecognized;
        self.ignored += other.ignored;
        self.malformed += other.malformed;
    }
}

/// Builder for [`EventRouter`].
pub struct RouterBuilder {
    config: RouterConfig,
    identity: Box<dyn LocalIdentity>,
    aliases: Box<dyn AliasRegistry>,
}

impl RouterBuilder {
    /// Set the configuration.
    #[must_use]
    pub fn config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the local identity accessor.
    #[must_use]
    pub fn identity(mut self, identity: impl LocalIdentity + 'static) -> Self {
        self.identity = Box::new(identity);
        self
    }

    /// Set the alias registry.
    #[must_use]
    pub fn alias_registry(mut self, aliases: impl AliasRegistry + 'static) -> Self {
        self.aliases = Box::new(aliases);
        self
    }

    /// Build the router.
    ///
    /// # Errors
    ///
    /// Returns an error if the notification capacity is zero.
    pub fn build(self) -> Result<EventRouter, RouterError> {
        if self.config.notification_capacity == 0 {
            return Err(RouterError::InvalidConfig(
                "notification capacity must be greater than zero",
            ));
        }

        info!("Creating event router with config: {:?}", self.config);
        Ok(EventRouter {
            rooms: RoomStore::new(),
            presence: PresenceStore::new(),
            dedup: DedupGuard::with_capacity(self.config.dedup_capacity),
            hub: NotificationHub::with_capacity(self.config.notification_capacity),
            initial_sync: InitialSyncGate::new(),
            identity: self.identity,
            aliases: self.aliases,
        })
    }
}

/// The event merge core.
///
/// Owns all reconciled state. Mutation only happens through `&mut self`,
/// so events are always merged one at a time.
pub struct EventRouter {
    rooms: RoomStore,
    presence: PresenceStore,
    dedup: DedupGuard,
    hub: NotificationHub,
    initial_sync: InitialSyncGate<Value>,
    identity: Box<dyn LocalIdentity>,
    aliases: Box<dyn AliasRegistry>,
}

impl EventRouter {
    /// Create a router with default configuration, no local user, and an
    /// in-memory alias table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rooms: RoomStore::new(),
            presence: PresenceStore::new(),
            dedup: DedupGuard::new(),
            hub: NotificationHub::new(),
            initial_sync: InitialSyncGate::new(),
            identity: Box::new(StaticIdentity::anonymous()),
            aliases: Box::new(AliasTable::new()),
        }
    }

    /// Start building a router.
    #[must_use]
    pub fn builder() -> RouterBuilder {
        RouterBuilder {
            config: RouterConfig::default(),
            identity: Box::new(StaticIdentity::anonymous()),
            aliases: Box::new(AliasTable::new()),
        }
    }

    /// Merge one event.
    pub fn route(&mut self, event: Event, is_live: bool, is_state: bool) -> RouteOutcome {
        // State events legitimately recur across overlapping windows; their
        // policies settle which copy wins.
        if !is_state {
            if let Some(event_id) = event.event_id.as_deref() {
                if !self.dedup.check_and_insert(event_id) {
                    debug!(event_id = %event_id, "Discarding duplicate event");
                    return RouteOutcome::Duplicate;
                }
            }
        }

        let kind = event.kind();
        if kind == EventKind::Unknown {
            warn!(
                event_type = %event.event_type,
                event_id = ?event.event_id,
                "Unable to handle event type"
            );
            return RouteOutcome::Unrecognized;
        }

        let event = Arc::new(event);
        trace!(event_type = %event.event_type, event_id = ?event.event_id, is_live, is_state, "Routing event");

        if kind == EventKind::Presence {
            return self.handle_presence(event, is_live, is_state);
        }

        let Some(room_id) = event.room_id.clone() else {
            warn!(event_type = %event.event_type, event_id = ?event.event_id, "Room event without room_id");
            return RouteOutcome::Malformed("missing room_id");
        };

        match kind {
            EventKind::Call { invite } => self.handle_call(&room_id, event, invite, is_live, is_state),
            EventKind::RoomCreate => self.handle_room_create(&room_id, event, is_live, is_state),
            EventKind::RoomAliases => self.handle_room_aliases(&room_id, &event),
            EventKind::Message => self.handle_message(&room_id, event, is_live, is_state),
            EventKind::Membership => self.handle_membership(&room_id, event, is_live, is_state),
            EventKind::PowerLevels => self.handle_power_levels(&room_id, event, is_live, is_state),
            EventKind::Name => self.handle_name(&room_id, event, is_live, is_state),
            EventKind::Topic => self.handle_topic(&room_id, event, is_live, is_state),
            EventKind::Presence | EventKind::Unknown => RouteOutcome::Unrecognized,
        }
    }

    /// Merge events in order with uniform flags.
    pub fn route_batch<I>(&mut self, events: I, is_live: bool, is_state: bool) -> BatchReport
    where
        I: IntoIterator<Item = Event>,
    {
        let mut report = BatchReport::default();
        for event in events {
            report.record(self.route(event, is_live, is_state));
        }
        report
    }

    /// Merge a page of room history and advance the room's pagination cursor.
    ///
    /// Pages are assumed contiguous and strictly older than anything
    /// previously merged for the room.
    pub fn route_room_page(&mut self, room_id: &str, page: RoomPage, is_live: bool) -> BatchReport {
        let report = self.route_batch(page.chunk, is_live, false);
        self.rooms.ensure(room_id).set_earliest_token(page.end.as_str());
        debug!(room = %room_id, earliest_token = %page.end, events = report.total(), "Merged room page");
        report
    }

    /// Handle one delivery from the transport queue.
    pub fn apply(&mut self, delivery: Delivery) -> BatchReport {
        match delivery {
            Delivery::Batch {
                events,
                live,
                state,
            } => self.route_batch(events, live, state),
            Delivery::Page {
                room_id,
                page,
                live,
            } => self.route_room_page(&room_id, page, live),
            Delivery::InitialSyncDone { payload } => {
                self.signal_initial_sync(payload);
                BatchReport::default()
            }
            Delivery::ResetMessages { room_id } => {
                self.reset_messages(&room_id);
                BatchReport::default()
            }
        }
    }

    /// Place a locally sent message in its room ahead of the server echo.
    ///
    /// Bypasses duplicate suppression so that the live echo carrying the
    /// same event id still replaces this entry. Returns `false` if the event
    /// has no room.
    pub fn insert_local_echo(&mut self, event: Event) -> bool {
        let Some(room_id) = event.room_id.clone() else {
            return false;
        };
        self.rooms.ensure(&room_id).append(Arc::new(event));
        true
    }

    /// Resolve the initial-sync gate. Only the first call has an effect.
    pub fn signal_initial_sync(&self, payload: Value) -> bool {
        self.initial_sync.signal_complete(payload)
    }

    /// Handle on the initial-sync gate.
    #[must_use]
    pub fn initial_sync(&self) -> SyncWaiter<Value> {
        self.initial_sync.waiter()
    }

    /// Drop a room's messages before a history reload.
    pub fn reset_messages(&mut self, room_id: &str) -> bool {
        self.rooms.reset_messages(room_id)
    }

    /// Subscribe to one notification category.
    #[must_use]
    pub fn subscribe(&self, category: NotificationCategory) -> broadcast::Receiver<Arc<Notification>> {
        self.hub.subscribe(category)
    }

    /// Notification hub.
    #[must_use]
    pub fn notifications(&self) -> &NotificationHub {
        &self.hub
    }

    /// All rooms.
    #[must_use]
    pub fn rooms(&self) -> &RoomStore {
        &self.rooms
    }

    /// One room.
    #[must_use]
    pub fn room(&self, room_id: &str) -> Option<&RoomState> {
        self.rooms.get(room_id)
    }

    /// Presence of all users.
    #[must_use]
    pub fn presence(&self) -> &PresenceStore {
        &self.presence
    }

    /// Duplicate guard.
    #[must_use]
    pub fn dedup(&self) -> &DedupGuard {
        &self.dedup
    }

    /// Get router statistics.
    #[must_use]
    pub fn stats(&self) -> RouterStats {
        RouterStats {
            rooms: self.rooms.stats(),
            presence_count: self.presence.len(),
            dedup_entries: self.dedup.len(),
        }
    }

    fn notify(
        &self,
        category: NotificationCategory,
        event: Arc<Event>,
        is_live: bool,
        is_state: bool,
    ) -> RouteOutcome {
        self.hub.publish(Notification {
            category,
            event,
            is_live,
            is_state,
        });
        RouteOutcome::Applied(category)
    }

    fn handle_room_create(
        &mut self,
        room_id: &str,
        event: Arc<Event>,
        is_live: bool,
        is_state: bool,
    ) -> RouteOutcome {
        self.rooms.ensure(room_id);
        self.notify(NotificationCategory::RoomCreated, event, is_live, is_state)
    }

    fn handle_room_aliases(&mut self, room_id: &str, event: &Event) -> RouteOutcome {
        match event.first_alias() {
            Some(alias) => {
                self.aliases.register_alias(room_id, alias);
                RouteOutcome::AliasRegistered
            }
            None => {
                debug!(room = %room_id, "Alias event without aliases");
                RouteOutcome::Ignored(IgnoreReason::NoAlias)
            }
        }
    }

    fn handle_message(
        &mut self,
        room_id: &str,
        event: Arc<Event>,
        is_live: bool,
        is_state: bool,
    ) -> RouteOutcome {
        let is_own_echo = is_live
            && event.is_text_like()
            && self
                .identity
                .user_id()
                .is_some_and(|me| event.user_id.as_deref() == Some(me));

        let room = self.rooms.ensure(room_id);
        if is_own_echo {
            if room.replace_or_append(Arc::clone(&event)) {
                trace!(room = %room_id, event_id = ?event.event_id, "Replaced local echo");
            }
        } else {
            room.insert_directional(Arc::clone(&event), is_live);
        }

        self.notify(NotificationCategory::Message, event, is_live, is_state)
    }

    fn handle_membership(
        &mut self,
        room_id: &str,
        event: Arc<Event>,
        is_live: bool,
        is_state: bool,
    ) -> RouteOutcome {
        let room = self.rooms.ensure(room_id);

        let membership = event.membership();
        let previous = event.prev_membership();
        if membership == Some(types::MEMBERSHIP_JOIN) && previous == Some(types::MEMBERSHIP_JOIN) {
            debug!(room = %room_id, state_key = ?event.state_key, "Discarding no-op rejoin");
            return RouteOutcome::Ignored(IgnoreReason::NoOpRejoin);
        }

        // Snapshot deliveries describe current state, not a change that just
        // happened, so they stay out of the message stream.
        if membership != previous && !is_state {
            room.insert_directional(Arc::clone(&event), is_live);
        }

        // Backfilled memberships are history and never overwrite the roster.
        if is_state || is_live {
            match event.state_key.as_deref() {
                Some(state_key) => room.set_member(state_key, Arc::clone(&event)),
                None => warn!(room = %room_id, event_id = ?event.event_id, "Membership event without state_key"),
            }
        }

        self.notify(NotificationCategory::MembershipChanged, event, is_live, is_state)
    }

    fn handle_presence(&mut self, event: Arc<Event>, is_live: bool, is_state: bool) -> RouteOutcome {
        let Some(user_id) = event.presence_user_id().map(str::to_string) else {
            warn!(event_id = ?event.event_id, "Presence event without user_id");
            return RouteOutcome::Malformed("missing presence user_id");
        };

        self.presence.update(user_id, Arc::clone(&event));
        self.notify(NotificationCategory::PresenceChanged, event, is_live, is_state)
    }

    fn handle_power_levels(
        &mut self,
        room_id: &str,
        event: Arc<Event>,
        is_live: bool,
        is_state: bool,
    ) -> RouteOutcome {
        let room = self.rooms.ensure(room_id);

        if room.metadata(&event.event_type).is_some() && !is_live {
            trace!(room = %room_id, event_type = %event.event_type, "Keeping established power levels");
            return RouteOutcome::Ignored(IgnoreReason::StalePowerLevels);
        }

        room.set_metadata(Arc::clone(&event));
        self.notify(NotificationCategory::PowerLevelsChanged, event, is_live, is_state)
    }

    fn handle_name(
        &mut self,
        room_id: &str,
        event: Arc<Event>,
        is_live: bool,
        is_state: bool,
    ) -> RouteOutcome {
        debug!(room = %room_id, is_live, "Room name");
        self.rooms.ensure(room_id).set_metadata(Arc::clone(&event));
        self.notify(NotificationCategory::NameChanged, event, is_live, is_state)
    }

    fn handle_topic(
        &mut self,
        room_id: &str,
        event: Arc<Event>,
        is_live: bool,
        is_state: bool,
    ) -> RouteOutcome {
        debug!(room = %room_id, is_live, "Room topic");
        let room = self.rooms.ensure(room_id);

        if !is_state {
            room.insert_directional(Arc::clone(&event), is_live);
        }

        let stored_is_newer = !is_live
            && room.metadata(&event.event_type).is_some_and(|stored| {
                matches!((stored.ts, event.ts), (Some(stored_ts), Some(ts)) if stored_ts > ts)
            });

        if stored_is_newer {
            trace!(room = %room_id, event_id = ?event.event_id, "Stored topic is newer, keeping it");
        } else {
            room.set_metadata(Arc::clone(&event));
        }

        self.notify(NotificationCategory::TopicChanged, event, is_live, is_state)
    }

    fn handle_call(
        &mut self,
        room_id: &str,
        event: Arc<Event>,
        invite: bool,
        is_live: bool,
        is_state: bool,
    ) -> RouteOutcome {
        let outcome = self.notify(NotificationCategory::Call, Arc::clone(&event), is_live, is_state);

        // Call events only ever arrive live, so invites always go at the tail.
        if invite {
            self.rooms.ensure(room_id).append(event);
        }

        outcome
    }
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new()
    }
}

/// Router statistics.
#[derive(Debug, Clone, Copy)]
pub struct RouterStats {
    /// Room store statistics.
    pub rooms: RoomStats,
    /// Users with a presence entry.
    pub presence_count: usize,
    /// Remembered event ids.
    pub dedup_entries: usize,
}
