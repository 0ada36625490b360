//! Delivery feed processing.
//!
//! A reader task decodes deliveries from the feed and queues them in order;
//! the consumer owns the router and applies them one at a time. The queue is
//! the only concurrency boundary: the router itself is never shared.

use crate::config::{Config, FeedFormat};
use crate::metrics;
use anyhow::{bail, Context, Result};
use bytes::BytesMut;
use roomsync_core::{AliasTable, BatchReport, EventRouter, Notification, RouterConfig, StaticIdentity};
use roomsync_protocol::{codec, Delivery};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Read buffer size for framed feeds.
const READ_BUFFER_SIZE: usize = 8192;

/// Totals for one feed run.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeedSummary {
    /// Deliveries applied.
    pub deliveries: usize,
    /// Per-outcome event counts.
    pub events: BatchReport,
}

/// Build the router described by `config`.
///
/// # Errors
///
/// Returns an error if the router configuration is rejected.
pub fn build_router(config: &Config) -> Result<EventRouter> {
    let identity = match &config.identity.user_id {
        Some(user_id) => StaticIdentity::new(user_id.clone()),
        None => StaticIdentity::anonymous(),
    };

    EventRouter::builder()
        .config(RouterConfig {
            dedup_capacity: config.dedup.capacity,
            notification_capacity: config.notifications.capacity,
        })
        .identity(identity)
        .alias_registry(AliasTable::new())
        .build()
        .context("Failed to build event router")
}

/// Read the configured feed to the end and merge every delivery.
///
/// # Errors
///
/// Returns an error if the feed cannot be opened or a framed feed is corrupt.
pub async fn run(config: Config) -> Result<FeedSummary> {
    let mut router = build_router(&config)?;

    let logger = tokio::spawn(log_notifications(router.notifications().subscribe_all()));

    let mut initial_sync = router.initial_sync();
    let baseline = tokio::spawn(async move {
        match initial_sync.completed().await {
            Ok(payload) => info!(payload = %payload, "Initial sync baseline ready"),
            Err(e) => warn!(error = %e, "Feed ended before initial sync completed"),
        }
    });

    let (tx, rx) = mpsc::channel(config.feed.queue_depth);
    let path = config.feed_path();
    let format = config.feed.format;
    let reader = tokio::spawn(async move {
        let source = open_source(&path).await?;
        read_feed(source, format, tx).await
    });

    let summary = drive(&mut router, rx).await;
    let read_result = reader.await.context("Feed reader task failed")?;

    let stats = router.stats();
    info!(
        deliveries = summary.deliveries,
        rooms = stats.rooms.room_count,
        messages = stats.rooms.message_count,
        members = stats.rooms.member_count,
        presence = stats.presence_count,
        dedup_entries = stats.dedup_entries,
        duplicates = summary.events.duplicates,
        "Feed drained"
    );

    // Dropping the router closes the notification channels and the gate.
    drop(router);
    join_background("notification_logger", logger).await;
    join_background("initial_sync_waiter", baseline).await;

    read_result?;
    Ok(summary)
}

/// Wait for a background task, logging a panic or cancellation.
async fn join_background(task: &'static str, handle: JoinHandle<()>) -> bool {
    match handle.await {
        Ok(()) => true,
        Err(e) => {
            warn!(task, error = %e, "Background task failed");
            false
        }
    }
}

/// Open the feed source; `-` is stdin.
async fn open_source(path: &str) -> Result<Box<dyn AsyncRead + Unpin + Send>> {
    if path == "-" {
        info!("Reading deliveries from stdin");
        return Ok(Box::new(tokio::io::stdin()));
    }

    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open feed: {}", path))?;
    info!(path = %path, "Reading deliveries from file");
    Ok(Box::new(file))
}

/// Decode deliveries from `reader` and queue them in order.
///
/// Undecodable JSON lines are skipped. A corrupt or truncated frame in a
/// MessagePack feed ends the read with an error, since frame boundaries are
/// lost after it. Returns the number of deliveries queued.
///
/// # Errors
///
/// Returns an error on I/O failure or a corrupt framed feed.
pub async fn read_feed<R>(reader: R, format: FeedFormat, tx: mpsc::Sender<Delivery>) -> Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut queued = 0;

    match format {
        FeedFormat::Jsonl => {
            let mut lines = BufReader::new(reader).lines();
            let mut line_number = 0usize;

            while let Some(line) = lines.next_line().await? {
                line_number += 1;
                match codec::decode_json_line(&line) {
                    Ok(Some(delivery)) => {
                        if tx.send(delivery).await.is_err() {
                            break;
                        }
                        queued += 1;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!(
                            line = line_number,
                            events_lost = undecodable_event_count(&line),
                            error = %e,
                            "Skipping undecodable delivery"
                        );
                        metrics::record_error("decode");
                    }
                }
            }
        }
        FeedFormat::Msgpack => {
            let mut reader = reader;
            let mut buf = BytesMut::with_capacity(READ_BUFFER_SIZE);

            'read: loop {
                while let Some(delivery) =
                    codec::decode_from(&mut buf).context("Corrupt delivery frame")?
                {
                    if tx.send(delivery).await.is_err() {
                        break 'read;
                    }
                    queued += 1;
                }

                if reader.read_buf(&mut buf).await? == 0 {
                    if !buf.is_empty() {
                        metrics::record_error("truncated");
                        bail!("Feed ended inside a frame ({} bytes left)", buf.len());
                    }
                    break;
                }
            }
        }
    }

    debug!(queued, "Feed reader finished");
    Ok(queued)
}

/// Events carried by a JSON line that failed to decode as a delivery.
///
/// One bad event fails its whole line, so the count covers every event in
/// the batch or page. Zero if the line is not JSON at all.
fn undecodable_event_count(line: &str) -> usize {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(line) else {
        return 0;
    };

    value
        .get("events")
        .or_else(|| value.get("page").and_then(|page| page.get("chunk")))
        .and_then(serde_json::Value::as_array)
        .map_or(0, Vec::len)
}

/// Apply queued deliveries until the queue closes.
pub async fn drive(router: &mut EventRouter, mut rx: mpsc::Receiver<Delivery>) -> FeedSummary {
    let mut summary = FeedSummary::default();

    while let Some(delivery) = rx.recv().await {
        let kind = delivery.kind();
        let events = delivery.event_count();
        let start = Instant::now();

        let report = router.apply(delivery);

        metrics::record_delivery(kind.as_str(), &report, start.elapsed().as_secs_f64());
        metrics::set_state_gauges(router.rooms().len(), router.dedup().len());
        debug!(
            kind = kind.as_str(),
            events,
            applied = report.applied,
            duplicates = report.duplicates,
            "Applied delivery"
        );

        summary.deliveries += 1;
        summary.events += report;
    }

    summary
}

/// Log every notification until the hub is dropped.
async fn log_notifications(mut rx: broadcast::Receiver<Arc<Notification>>) {
    loop {
        match rx.recv().await {
            Ok(notification) => debug!(
                category = %notification.category,
                event_id = ?notification.event.event_id,
                room = ?notification.event.room_id,
                is_live = notification.is_live,
                is_state = notification.is_state,
                "Notification"
            ),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Notification logger lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
