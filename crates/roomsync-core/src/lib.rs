//! # roomsync-core
//!
//! Event routing and room state reconciliation for roomsync.
//!
//! Events reach a chat client from a live stream, from initial snapshots and
//! from paginated history. This crate merges them into one consistent view
//! per room, whatever order or how many times they arrive:
//!
//! - **Router** - Dedup, classify, apply per-type merge policy, notify
//! - **Room** - Message stream, membership, metadata, pagination cursor
//! - **Presence** - Latest presence per user
//! - **Dedup** - Bounded memory of processed event ids
//! - **Notify** - Typed per-category publish/subscribe
//! - **Sync gate** - One-shot "initial sync complete" signal
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Transport  │────▶│   Router    │────▶│  RoomStore  │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                        │       │
//!                        ▼       ▼
//!              ┌──────────┐   ┌─────────────────┐
//!              │ Presence │   │ NotificationHub │
//!              └──────────┘   └─────────────────┘
//! ```

pub mod dedup;
pub mod notify;
pub mod presence;
pub mod room;
pub mod router;
pub mod session;
pub mod sync_gate;

pub use dedup::DedupGuard;
pub use notify::{Notification, NotificationCategory, NotificationHub};
pub use presence::PresenceStore;
pub use room::{Pagination, RoomId, RoomState, RoomStats, RoomStore};
pub use router::{
    BatchReport, EventRouter, IgnoreReason, RouteOutcome, RouterBuilder, RouterConfig,
    RouterError, RouterStats,
};
pub use session::{AliasRegistry, AliasTable, LocalIdentity, StaticIdentity};
pub use sync_gate::{GateError, InitialSyncGate, SyncWaiter};
