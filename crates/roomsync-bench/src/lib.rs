//! Event fixtures shared by the roomsync benchmarks.

use roomsync_protocol::{types, Event, RoomPage};
use serde_json::json;

/// Room every fixture event belongs to.
pub const BENCH_ROOM: &str = "!bench:example.org";

/// Local user of the benchmark router.
pub const BENCH_USER: &str = "@bench:example.org";

/// A text message from `sender` with id `$<prefix><n>`.
#[must_use]
pub fn text_message(prefix: &str, n: usize, sender: &str) -> Event {
    Event::new(types::ROOM_MESSAGE)
        .with_id(format!("${prefix}{n}"))
        .in_room(BENCH_ROOM)
        .from_user(sender)
        .with_content(json!({"msgtype": "m.text", "body": "benchmark message body"}))
        .at(1_700_000_000_000 + n as u64)
}

/// `count` live messages from another user.
#[must_use]
pub fn live_messages(prefix: &str, count: usize) -> Vec<Event> {
    (0..count)
        .map(|n| text_message(prefix, n, "@peer:example.org"))
        .collect()
}

/// `pages` history pages of `page_size` events each, newest page first and
/// newest event first within each page.
#[must_use]
pub fn history_pages(pages: usize, page_size: usize) -> Vec<RoomPage> {
    let total = pages * page_size;
    (0..pages)
        .map(|p| {
            let chunk = (0..page_size)
                .map(|i| total - (p * page_size + i))
                .map(|n| text_message("h", n, "@peer:example.org"))
                .collect();
            RoomPage::new(chunk, format!("t{}", p))
        })
        .collect()
}

/// A mixed state snapshot: create, name, topic, power levels and `members` joins.
#[must_use]
pub fn state_snapshot(members: usize) -> Vec<Event> {
    let mut events = vec![
        Event::new(types::ROOM_CREATE).in_room(BENCH_ROOM),
        Event::new(types::ROOM_NAME)
            .in_room(BENCH_ROOM)
            .with_content(json!({"name": "bench"})),
        Event::new(types::ROOM_TOPIC)
            .in_room(BENCH_ROOM)
            .with_content(json!({"topic": "throughput"}))
            .at(1),
        Event::new(types::POWER_LEVELS)
            .in_room(BENCH_ROOM)
            .with_content(json!({"ban": 50})),
    ];
    events.extend((0..members).map(|n| {
        let user = format!("@user{n}:example.org");
        Event::new(types::ROOM_MEMBER)
            .in_room(BENCH_ROOM)
            .from_user(user.clone())
            .with_state_key(user)
            .with_content(json!({"membership": "join"}))
    }));
    events
}
