//! Codec benchmarks for roomsync-protocol.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use roomsync_protocol::{codec, Delivery, Event};
use serde_json::json;

fn live_batch(size: usize) -> Delivery {
    let events = (0..size)
        .map(|i| {
            Event::new("m.room.message")
                .with_id(format!("$event{i}"))
                .in_room("!bench:hs")
                .from_user("@bench:hs")
                .with_content(json!({"msgtype": "m.text", "body": "x".repeat(48)}))
                .at(1_700_000_000_000 + i as u64)
        })
        .collect();
    Delivery::live(events)
}

fn bench_encode(c: &mut Criterion) {
    let delivery = live_batch(32);

    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Elements(32));
    group.bench_function("batch_32", |b| b.iter(|| codec::encode(black_box(&delivery))));
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let encoded = codec::encode(&live_batch(32)).unwrap();

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(encoded.len() as u64));
    group.bench_function("batch_32", |b| b.iter(|| codec::decode(black_box(&encoded))));
    group.finish();
}

fn bench_json_line(c: &mut Criterion) {
    let line = serde_json::to_string(&live_batch(32)).unwrap();

    c.bench_function("json_line_batch_32", |b| {
        b.iter(|| codec::decode_json_line(black_box(&line)).unwrap())
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_json_line);
criterion_main!(benches);
