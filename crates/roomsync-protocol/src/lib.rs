//! # roomsync-protocol
//!
//! Event model and delivery codec for roomsync.
//!
//! This crate defines the shape of the events the merge core consumes, how
//! event types are classified, and the envelopes a transport uses to hand
//! ordered work to the core.
//!
//! ## Deliveries
//!
//! - `Batch` - Events sharing one `(live, state)` flag pair
//! - `Page` - A page of room history plus its pagination cursor
//! - `InitialSyncDone` - The bulk snapshot finished loading
//! - `ResetMessages` - Drop a room's history before a reload
//!
//! ## Example
//!
//! ```rust
//! use roomsync_protocol::{codec, Delivery, Event};
//!
//! let event = Event::new("m.room.message").with_id("$1").in_room("!room:hs");
//! let delivery = Delivery::live(vec![event]);
//!
//! let encoded = codec::encode(&delivery).unwrap();
//! let decoded = codec::decode(&encoded).unwrap();
//! assert_eq!(delivery, decoded);
//! ```

pub mod codec;
pub mod delivery;
pub mod event;

pub use codec::{decode, decode_json_line, encode, ProtocolError};
pub use delivery::{Delivery, DeliveryKind, RoomPage};
pub use event::{types, Event, EventKind};
