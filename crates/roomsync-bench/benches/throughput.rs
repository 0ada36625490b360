//! Throughput benchmarks for roomsync.
//!
//! These benchmarks measure how fast the router merges events on its
//! main paths: live appends, backfill, duplicates, echoes and snapshots.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use roomsync_bench::{
    history_pages, live_messages, state_snapshot, text_message, BENCH_ROOM, BENCH_USER,
};
use roomsync_core::{EventRouter, NotificationCategory, RouterConfig, StaticIdentity};

fn bench_router(dedup_capacity: usize) -> EventRouter {
    EventRouter::builder()
        .config(RouterConfig {
            dedup_capacity,
            ..RouterConfig::default()
        })
        .identity(StaticIdentity::new(BENCH_USER))
        .build()
        .unwrap()
}

/// Benchmark live batch routing.
fn bench_live_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("live_batch");

    for size in [10, 100, 1000] {
        let events = live_messages("l", size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &events, |b, events| {
            b.iter_batched(
                || (bench_router(0), events.clone()),
                |(mut router, events)| black_box(router.route_batch(events, true, false)),
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

/// Benchmark backfilling history pages in front of live messages.
fn bench_backfill(c: &mut Criterion) {
    let mut group = c.benchmark_group("backfill");
    let pages = history_pages(10, 50);
    group.throughput(Throughput::Elements(500));

    group.bench_function("10x50", |b| {
        b.iter_batched(
            || {
                let mut router = bench_router(0);
                router.route_batch(live_messages("l", 20), true, false);
                (router, pages.clone())
            },
            |(mut router, pages)| {
                for page in pages {
                    black_box(router.route_room_page(BENCH_ROOM, page, false));
                }
                router
            },
            criterion::BatchSize::SmallInput,
        );
    });

    group.finish();
}

/// Benchmark duplicate suppression with a bounded dedup window.
fn bench_duplicates(c: &mut Criterion) {
    let mut group = c.benchmark_group("duplicates");
    let events = live_messages("d", 1000);
    group.throughput(Throughput::Elements(1000));

    for capacity in [0, 256] {
        group.bench_with_input(
            BenchmarkId::new("redelivered", capacity),
            &events,
            |b, events| {
                b.iter_batched(
                    || {
                        let mut router = bench_router(capacity);
                        router.route_batch(events.clone(), true, false);
                        (router, events.clone())
                    },
                    |(mut router, events)| black_box(router.route_batch(events, true, false)),
                    criterion::BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

/// Benchmark local echo replacement at the tail of a long history.
fn bench_echo_replacement(c: &mut Criterion) {
    c.bench_function("echo_replacement_1000", |b| {
        b.iter_batched(
            || {
                let mut router = bench_router(0);
                router.route_batch(live_messages("l", 1000), true, false);
                router.insert_local_echo(text_message("mine", 0, BENCH_USER));
                router
            },
            |mut router| {
                black_box(router.route(text_message("mine", 0, BENCH_USER), true, false));
                router
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

/// Benchmark a state snapshot with subscribers attached.
fn bench_state_snapshot(c: &mut Criterion) {
    let snapshot = state_snapshot(500);
    let mut group = c.benchmark_group("state_snapshot");
    group.throughput(Throughput::Elements(snapshot.len() as u64));

    group.bench_function("500_members_subscribed", |b| {
        b.iter_batched(
            || {
                let router = bench_router(0);
                let rx = router.subscribe(NotificationCategory::MembershipChanged);
                (router, rx, snapshot.clone())
            },
            |(mut router, rx, events)| {
                black_box(router.route_batch(events, false, true));
                (router, rx)
            },
            criterion::BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_live_batch,
    bench_backfill,
    bench_duplicates,
    bench_echo_replacement,
    bench_state_snapshot
);
criterion_main!(benches);
