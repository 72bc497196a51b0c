//! Integration tests for live delivery, pause/resume and history.

use std::time::Duration;
use tailcast::{
    BroadcastConfig, Broadcaster, Connection, Delivery, DeliveryMode, EventId, EventInput, Origin,
};

const WAIT: Duration = Duration::from_secs(3);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn test_broadcaster(batch_size: usize, capacity: usize) -> Broadcaster {
    init_tracing();
    Broadcaster::new(BroadcastConfig {
        flush_interval_ms: 10,
        flush_batch_size: batch_size,
        max_event_count: capacity,
        ..Default::default()
    })
    .unwrap()
}

fn ingest_n(broadcaster: &Broadcaster, n: usize) {
    for i in 0..n {
        broadcaster.ingest(EventInput::line(format!("line {}", i)));
    }
}

fn join(broadcaster: &Broadcaster, tail: usize) -> Connection {
    let conn = broadcaster.join_with_tail(tail).unwrap();
    match conn.recv_timeout(WAIT).unwrap() {
        Delivery::ClientJoined { client_id } => assert_eq!(client_id, conn.id),
        other => panic!("Expected ClientJoined, got {:?}", other),
    }
    conn
}

fn next_batch(conn: &Connection) -> Vec<u64> {
    let delivery = conn.recv_timeout(WAIT).expect("no batch delivered");
    delivery.events().iter().map(|e| e.id.0).collect()
}

fn collect(conn: &Connection, n: usize) -> Vec<u64> {
    let mut ids = Vec::new();
    while ids.len() < n {
        ids.extend(next_batch(conn));
    }
    ids
}

fn assert_quiet(conn: &Connection) {
    if let Ok(delivery) = conn.recv_timeout(Duration::from_millis(100)) {
        panic!("Expected no delivery, got {:?}", delivery);
    }
}

fn range(from: u64, to: u64) -> Vec<u64> {
    (from..=to).collect()
}

// --- Live Delivery ---

#[test]
fn test_following_subscriber_sees_global_order() {
    let broadcaster = test_broadcaster(1000, 10_000);
    let conn = join(&broadcaster, 0);

    ingest_n(&broadcaster, 500);

    assert_eq!(collect(&conn, 500), range(1, 500));
    assert_quiet(&conn);
}

#[test]
fn test_all_subscribers_share_order() {
    let broadcaster = test_broadcaster(1000, 10_000);
    let a = join(&broadcaster, 0);
    let b = join(&broadcaster, 0);

    ingest_n(&broadcaster, 200);

    assert_eq!(collect(&a, 200), range(1, 200));
    assert_eq!(collect(&b, 200), range(1, 200));
}

#[test]
fn test_batch_size_bound() {
    let broadcaster = test_broadcaster(7, 10_000);
    ingest_n(&broadcaster, 100);

    let conn = join(&broadcaster, 100);
    let mut ids = Vec::new();
    while ids.len() < 100 {
        let batch = next_batch(&conn);
        assert!(!batch.is_empty());
        assert!(batch.len() <= 7, "batch of {} exceeds limit", batch.len());
        ids.extend(batch);
    }
    assert_eq!(ids, range(1, 100));
}

#[test]
fn test_batches_carry_stats() {
    let broadcaster = test_broadcaster(1000, 10_000);
    let conn = join(&broadcaster, 0);
    ingest_n(&broadcaster, 3);

    let mut seen = 0;
    while seen < 3 {
        match conn.recv_timeout(WAIT).unwrap() {
            Delivery::LogBulk { messages, status } => {
                seen += messages.len();
                assert!(status.count >= seen as u64);
                assert!(status.first_event_at.is_some());
            }
            other => panic!("Expected LogBulk, got {:?}", other),
        }
    }
}

#[test]
fn test_event_payload_reaches_subscriber() {
    let broadcaster = test_broadcaster(1000, 10_000);
    let conn = join(&broadcaster, 0);

    broadcaster.ingest(EventInput::line(r#"{"level":"warn"}"#).with_origin(Origin::Port(8123)));

    let delivery = conn.recv_timeout(WAIT).unwrap();
    let event = &delivery.events()[0];
    assert!(event.is_json);
    assert_eq!(event.json_content.as_ref().unwrap()["level"], "warn");
    assert_eq!(event.origin, Some(Origin::Port(8123)));
}

// --- Eviction ---

#[test]
fn test_eviction_keeps_last_capacity() {
    let broadcaster = test_broadcaster(1000, 10);
    ingest_n(&broadcaster, 25);

    assert_eq!(broadcaster.log_len(), 10);
    let retained: Vec<u64> = broadcaster
        .peek_log(&(0..10).collect::<Vec<_>>())
        .iter()
        .map(|e| e.id.0)
        .collect();
    assert_eq!(retained, range(16, 25));
}

// --- Join Tail ---

#[test]
fn test_join_tail_delivers_last_n() {
    let broadcaster = test_broadcaster(1000, 10_000);
    ingest_n(&broadcaster, 10);

    let conn = join(&broadcaster, 4);
    assert_eq!(next_batch(&conn), range(7, 10));
    assert_quiet(&conn);
}

#[test]
fn test_join_tail_longer_than_log() {
    let broadcaster = test_broadcaster(1000, 10_000);
    ingest_n(&broadcaster, 10);

    let conn = join(&broadcaster, 50);
    assert_eq!(next_batch(&conn), range(1, 10));
}

#[test]
fn test_join_tail_then_live() {
    let broadcaster = test_broadcaster(1000, 10_000);
    ingest_n(&broadcaster, 5);

    let conn = join(&broadcaster, 2);
    ingest_n(&broadcaster, 3);

    assert_eq!(collect(&conn, 5), range(4, 8));
}

// --- Pause / Resume ---

#[test]
fn test_resume_since_cursor_closes_gap() {
    let broadcaster = test_broadcaster(1000, 10_000);
    let conn = join(&broadcaster, 0);

    ingest_n(&broadcaster, 5);
    assert_eq!(collect(&conn, 5), range(1, 5));

    broadcaster.pause(conn.id);
    assert_eq!(broadcaster.subscriber(conn.id).unwrap().cursor, Some(EventId(5)));

    ingest_n(&broadcaster, 7);
    assert_quiet(&conn);
    assert_eq!(broadcaster.pending_len(conn.id), Some(0));

    broadcaster.resume(conn.id, true);
    assert_eq!(next_batch(&conn), range(6, 12));

    ingest_n(&broadcaster, 1);
    assert_eq!(next_batch(&conn), vec![13]);
    assert_quiet(&conn);
}

#[test]
fn test_resume_without_backfill_skips_paused_events() {
    let broadcaster = test_broadcaster(1000, 10_000);
    let conn = join(&broadcaster, 0);

    ingest_n(&broadcaster, 5);
    assert_eq!(collect(&conn, 5), range(1, 5));

    broadcaster.pause(conn.id);
    ingest_n(&broadcaster, 7);
    broadcaster.resume(conn.id, false);
    assert_quiet(&conn);

    ingest_n(&broadcaster, 1);
    assert_eq!(next_batch(&conn), vec![13]);

    let snap = broadcaster.subscriber(conn.id).unwrap();
    assert_eq!(snap.mode, DeliveryMode::Following);
    assert_eq!(snap.cursor, Some(EventId(13)));
}

#[test]
fn test_pause_flushes_pending_before_returning() {
    let broadcaster = Broadcaster::new(BroadcastConfig {
        flush_interval_ms: 50,
        ..Default::default()
    })
    .unwrap();
    let conn = join(&broadcaster, 0);

    ingest_n(&broadcaster, 20);
    broadcaster.pause(conn.id);

    assert_eq!(broadcaster.pending_len(conn.id), Some(0));
    assert_eq!(collect(&conn, 20), range(1, 20));
}

#[test]
fn test_resume_while_following_does_not_duplicate() {
    let broadcaster = test_broadcaster(1000, 10_000);
    let conn = join(&broadcaster, 0);

    ingest_n(&broadcaster, 3);
    assert_eq!(collect(&conn, 3), range(1, 3));

    broadcaster.resume(conn.id, true);
    assert_quiet(&conn);
}

// --- Historical Load ---

#[test]
fn test_load_reads_positions_and_stays_stopped() {
    let broadcaster = test_broadcaster(1000, 10_000);
    let conn = join(&broadcaster, 0);

    ingest_n(&broadcaster, 10);
    assert_eq!(collect(&conn, 10), range(1, 10));

    assert_eq!(broadcaster.load(conn.id, 5, 3, true), 3);
    assert_eq!(next_batch(&conn), vec![5, 6, 7]);

    let snap = broadcaster.subscriber(conn.id).unwrap();
    assert_eq!(snap.mode, DeliveryMode::Stopped);
    assert_eq!(snap.cursor, Some(EventId(10)));

    // Still stopped: live traffic is not delivered until an explicit resume.
    ingest_n(&broadcaster, 2);
    assert_quiet(&conn);

    broadcaster.resume(conn.id, true);
    assert_eq!(next_batch(&conn), vec![11, 12]);
}

#[test]
fn test_load_excluding_start() {
    let broadcaster = test_broadcaster(1000, 10_000);
    ingest_n(&broadcaster, 10);
    let conn = join(&broadcaster, 0);

    assert_eq!(broadcaster.load(conn.id, 5, 3, false), 3);
    assert_eq!(next_batch(&conn), vec![6, 7, 8]);
}

#[test]
fn test_load_respects_batch_size() {
    let broadcaster = test_broadcaster(4, 10_000);
    ingest_n(&broadcaster, 10);
    let conn = join(&broadcaster, 0);

    assert_eq!(broadcaster.load(conn.id, 1, 0, true), 10);
    assert_eq!(next_batch(&conn), vec![1, 2, 3, 4]);
    assert_eq!(next_batch(&conn), vec![5, 6, 7, 8]);
    assert_eq!(next_batch(&conn), vec![9, 10]);
}

// --- Out-of-band Payloads ---

#[test]
fn test_init_payload_over_delivery_channel() {
    let broadcaster = test_broadcaster(1000, 10_000);
    let conn = join(&broadcaster, 0);

    let init = tailcast::InitPayload {
        analytics_enabled: false,
        auth_required: false,
        config_str: r#"{"columns":[]}"#.into(),
    };
    assert!(broadcaster.send_to(conn.id, Delivery::Init(init.clone())));

    match conn.recv_timeout(WAIT).unwrap() {
        Delivery::Init(received) => assert_eq!(received, init),
        other => panic!("Expected Init, got {:?}", other),
    }
}

#[test]
fn test_close_disconnects_channel() {
    let broadcaster = test_broadcaster(1000, 10_000);
    let conn = join(&broadcaster, 0);

    broadcaster.close(conn.id);
    assert_eq!(broadcaster.connected(), 0);
    assert!(conn.recv_timeout(WAIT).is_err());
}
