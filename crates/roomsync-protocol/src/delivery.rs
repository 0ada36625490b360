//! Delivery envelopes handed from the transport to the core.
//!
//! A delivery is one unit of the strictly ordered queue between the network
//! side and the merge core: a batch of events with uniform flags, a history
//! page, the initial-sync completion marker, or a history reset request.

use serde::{Deserialize, Serialize};

use crate::event::Event;

/// Delivery kind identifiers, used for logging and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryKind {
    /// [`Delivery::Batch`].
    Batch,
    /// [`Delivery::Page`].
    Page,
    /// [`Delivery::InitialSyncDone`].
    InitialSyncDone,
    /// [`Delivery::ResetMessages`].
    ResetMessages,
}

impl DeliveryKind {
    /// Stable lowercase name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryKind::Batch => "batch",
            DeliveryKind::Page => "page",
            DeliveryKind::InitialSyncDone => "initial_sync_done",
            DeliveryKind::ResetMessages => "reset_messages",
        }
    }
}

/// A page of room history, as returned by a `/messages`-style fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomPage {
    /// Events in the page, in the order the server returned them.
    #[serde(default)]
    pub chunk: Vec<Event>,
    /// Opaque cursor marking the oldest point this page reached.
    pub end: String,
}

impl RoomPage {
    /// Create a page.
    #[must_use]
    pub fn new(chunk: Vec<Event>, end: impl Into<String>) -> Self {
        Self {
            chunk,
            end: end.into(),
        }
    }
}

/// A unit of work for the merge core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Delivery {
    /// Events sharing the same liveness and state flags.
    #[serde(rename = "batch")]
    Batch {
        /// Events, processed strictly in order.
        events: Vec<Event>,
        /// Delivered by the real-time stream.
        #[serde(default)]
        live: bool,
        /// Snapshot-style state events.
        #[serde(default)]
        state: bool,
    },

    /// A page of history for one room.
    #[serde(rename = "page")]
    Page {
        /// Room the page belongs to.
        room_id: String,
        /// The page itself.
        page: RoomPage,
        /// Whether the page carries live events.
        #[serde(default)]
        live: bool,
    },

    /// The bulk initial snapshot finished loading.
    #[serde(rename = "initial_sync_done")]
    InitialSyncDone {
        /// Opaque payload handed to gate waiters.
        #[serde(default)]
        payload: serde_json::Value,
    },

    /// Drop a room's message history ahead of a reload.
    #[serde(rename = "reset_messages")]
    ResetMessages {
        /// Room to reset.
        room_id: String,
    },
}

impl Delivery {
    /// Get the delivery kind.
    #[must_use]
    pub fn kind(&self) -> DeliveryKind {
        match self {
            Delivery::Batch { .. } => DeliveryKind::Batch,
            Delivery::Page { .. } => DeliveryKind::Page,
            Delivery::InitialSyncDone { .. } => DeliveryKind::InitialSyncDone,
            Delivery::ResetMessages { .. } => DeliveryKind::ResetMessages,
        }
    }

    /// Create a batch of live events.
    #[must_use]
    pub fn live(events: Vec<Event>) -> Self {
        Delivery::Batch {
            events,
            live: true,
            state: false,
        }
    }

    /// Create a batch of state snapshot events.
    #[must_use]
    pub fn state(events: Vec<Event>) -> Self {
        Delivery::Batch {
            events,
            live: false,
            state: true,
        }
    }

    /// Create a history page delivery.
    #[must_use]
    pub fn page(room_id: impl Into<String>, page: RoomPage) -> Self {
        Delivery::Page {
            room_id: room_id.into(),
            page,
            live: false,
        }
    }

    /// Number of events carried.
    #[must_use]
    pub fn event_count(&self) -> usize {
        match self {
            Delivery::Batch { events, .. } => events.len(),
            Delivery::Page { page, .. } => page.chunk.len(),
            Delivery::InitialSyncDone { .. } | Delivery::ResetMessages { .. } => 0,
        }
    }
}
