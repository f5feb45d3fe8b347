//! Integration tests for chunked writes driven through a live connection.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use gattpool::{GattError, GattEvent, GattStatus, WriteProgress};

use super::mock_radio::{CHR_RO, CHR_RW, ChunkRecorder, ConnectEvent, RadioCall, Rig, SVC, key};

const ADDR: &str = "AA:BB:CC:DD:EE:02";

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[test]
fn three_hundred_bytes_in_hundred_byte_chunks() {
    let rig = Rig::new();
    rig.connect(ADDR);
    rig.set_mtu(ADDR, 103);
    let data = payload(300);
    let rec = Arc::new(ChunkRecorder::default());

    rig.pool
        .write_chunked(ADDR, SVC, CHR_RW, data.clone(), 100, Duration::ZERO, rec.clone());
    for _ in 0..3 {
        rig.ack_write(ADDR, CHR_RW, GattStatus::Success);
    }

    let fractions: Vec<f64> = rec.progress().iter().map(|p| p.fraction()).collect();
    assert_eq!(fractions.len(), 3);
    assert!((fractions[0] - 1.0 / 3.0).abs() < 1e-9);
    assert!((fractions[1] - 2.0 / 3.0).abs() < 1e-9);
    assert!((fractions[2] - 1.0).abs() < 1e-9);
    assert_eq!(rec.success(), Some(data.clone()));
    assert_eq!(rec.failure(), None);
    assert_eq!(rig.radio.written_chunks().concat(), data);
}

#[test]
fn only_one_chunk_in_flight() {
    let rig = Rig::new();
    rig.connect(ADDR);
    let rec = Arc::new(ChunkRecorder::default());

    rig.pool
        .write_chunked(ADDR, SVC, CHR_RW, payload(60), 20, Duration::ZERO, rec.clone());
    rig.pool.flush();
    assert_eq!(rig.radio.written_chunks().len(), 1);

    rig.ack_write(ADDR, CHR_RW, GattStatus::Success);
    assert_eq!(rig.radio.written_chunks().len(), 2);
}

#[test]
fn short_last_chunk_counts_true_length() {
    let rig = Rig::new();
    rig.connect(ADDR);
    let rec = Arc::new(ChunkRecorder::default());

    rig.pool
        .write_chunked(ADDR, SVC, CHR_RW, payload(45), 20, Duration::ZERO, rec.clone());
    for _ in 0..3 {
        rig.ack_write(ADDR, CHR_RW, GattStatus::Success);
    }

    let written: Vec<usize> = rec.progress().iter().map(|p| p.written).collect();
    assert_eq!(written, vec![20, 40, 45]);
    assert!(rec.progress().iter().all(|p| p.total == 45));
    assert_eq!(
        rig.radio.written_chunks().iter().map(Vec::len).collect::<Vec<_>>(),
        vec![20, 20, 5]
    );
}

#[test]
fn failure_reports_bytes_already_written() {
    let rig = Rig::new();
    rig.connect(ADDR);
    rig.set_mtu(ADDR, 103);
    let rec = Arc::new(ChunkRecorder::default());

    rig.pool
        .write_chunked(ADDR, SVC, CHR_RW, payload(300), 100, Duration::ZERO, rec.clone());
    rig.ack_write(ADDR, CHR_RW, GattStatus::Success);
    rig.ack_write(ADDR, CHR_RW, GattStatus::Failure(19));

    assert_eq!(rec.failure(), Some((GattError::Unknown, 100)));
    assert_eq!(rec.success(), None);
    assert_eq!(
        rec.progress(),
        vec![WriteProgress {
            written: 100,
            total: 300
        }]
    );
    assert_eq!(rig.radio.written_chunks().len(), 2, "no chunk after a failure");
}

#[test]
fn transport_rejecting_a_chunk_fails_transfer() {
    let rig = Rig::new();
    rig.connect(ADDR);
    let rec = Arc::new(ChunkRecorder::default());

    rig.pool
        .write_chunked(ADDR, SVC, CHR_RW, payload(40), 20, Duration::ZERO, rec.clone());
    rig.radio.reject_writes.store(true, Ordering::SeqCst);
    rig.ack_write(ADDR, CHR_RW, GattStatus::Success);
    // The rejection is reported from inside the first chunk's completion.
    rig.pool.flush();

    assert_eq!(rec.failure(), Some((GattError::Unknown, 20)));
}

#[test]
fn inter_chunk_delay_defers_next_send() {
    let rig = Rig::new();
    rig.connect(ADDR);
    let rec = Arc::new(ChunkRecorder::default());
    let delay = Duration::from_millis(15);

    rig.pool
        .write_chunked(ADDR, SVC, CHR_RW, payload(40), 20, delay, rec.clone());
    rig.ack_write(ADDR, CHR_RW, GattStatus::Success);

    assert_eq!(rig.radio.written_chunks().len(), 1, "held until the delay elapses");
    assert_eq!(rig.timer.delays(), vec![delay]);

    rig.timer.fire_all();
    assert_eq!(rig.radio.written_chunks().len(), 2);
    rig.ack_write(ADDR, CHR_RW, GattStatus::Success);
    assert_eq!(rec.success().map(|d| d.len()), Some(40));
}

#[test]
fn disconnect_cancels_deferred_chunk() {
    let rig = Rig::new();
    rig.connect(ADDR);
    let rec = Arc::new(ChunkRecorder::default());

    rig.pool.write_chunked(
        ADDR,
        SVC,
        CHR_RW,
        payload(40),
        20,
        Duration::from_millis(50),
        rec.clone(),
    );
    rig.ack_write(ADDR, CHR_RW, GattStatus::Success);
    assert_eq!(rig.timer.pending(), 1);

    rig.link_down(ADDR, GattStatus::Success);
    assert_eq!(rig.timer.pending(), 0);
    assert_eq!(rig.radio.written_chunks().len(), 1);
}

#[test]
fn chunk_ack_queued_before_disconnect_stays_silent() {
    let rig = Rig::new();
    let conn_rec = rig.connect(ADDR);
    let link = rig.radio.link_for(ADDR);
    let rec = Arc::new(ChunkRecorder::default());

    rig.pool
        .write_chunked(ADDR, SVC, CHR_RW, payload(40), 20, Duration::ZERO, rec.clone());
    let release = rig.stall_dispatcher();
    rig.pool.handle_event(
        ADDR,
        GattEvent::AttrWrite {
            link,
            key: key(CHR_RW),
            status: GattStatus::Success,
        },
    );
    rig.link_down(ADDR, GattStatus::Success);
    release.send(()).unwrap();
    rig.pool.flush();

    assert_eq!(
        conn_rec.events().last(),
        Some(&ConnectEvent::Disconnected(GattStatus::Success))
    );
    assert_eq!(rec.failure(), None, "no callback after on_disconnected");
    assert_eq!(rec.success(), None);
    assert_eq!(rig.radio.written_chunks().len(), 1);
}

#[test]
fn fired_delay_leaves_no_deferred_entry() {
    let rig = Rig::new();
    rig.connect(ADDR);
    let conn = rig.pool.connection(ADDR).unwrap();
    let rec = Arc::new(ChunkRecorder::default());

    rig.pool.write_chunked(
        ADDR,
        SVC,
        CHR_RW,
        payload(60),
        20,
        Duration::from_millis(10),
        rec.clone(),
    );
    for _ in 0..2 {
        rig.ack_write(ADDR, CHR_RW, GattStatus::Success);
        assert_eq!(conn.pending_counts().deferred, 1);
        assert_eq!(rig.timer.fire_all(), 1);
        assert_eq!(conn.pending_counts().deferred, 0);
    }
    rig.ack_write(ADDR, CHR_RW, GattStatus::Success);

    assert_eq!(rec.success().map(|d| d.len()), Some(60));
    assert!(conn.pending_counts().is_empty());
}

#[test]
fn chunk_larger_than_mtu_rejected() {
    let rig = Rig::new();
    rig.connect(ADDR);
    let rec = Arc::new(ChunkRecorder::default());

    rig.pool
        .write_chunked(ADDR, SVC, CHR_RW, payload(100), 21, Duration::ZERO, rec.clone());
    rig.pool.flush();

    assert_eq!(rec.failure(), Some((GattError::PayloadTooLarge, 0)));
    assert_eq!(rig.radio.count(|c| matches!(c, RadioCall::Write { .. })), 0);
}

#[test]
fn empty_payload_or_zero_chunk_rejected() {
    let rig = Rig::new();
    rig.connect(ADDR);

    let empty = Arc::new(ChunkRecorder::default());
    rig.pool
        .write_chunked(ADDR, SVC, CHR_RW, Vec::new(), 20, Duration::ZERO, empty.clone());
    let zero = Arc::new(ChunkRecorder::default());
    rig.pool
        .write_chunked(ADDR, SVC, CHR_RW, payload(10), 0, Duration::ZERO, zero.clone());
    rig.pool.flush();

    assert_eq!(empty.failure(), Some((GattError::PayloadTooLarge, 0)));
    assert_eq!(zero.failure(), Some((GattError::PayloadTooLarge, 0)));
}

#[test]
fn preconditions_checked_before_payload() {
    let rig = Rig::new();
    rig.connect(ADDR);

    let rec = Arc::new(ChunkRecorder::default());
    rig.pool
        .write_chunked(ADDR, SVC, CHR_RO, Vec::new(), 0, Duration::ZERO, rec.clone());
    rig.pool.flush();

    assert_eq!(
        rec.failure(),
        Some((
            GattError::CapabilityUnsupported(gattpool::Capability::Write),
            0
        ))
    );
}

#[test]
fn not_connected_fails_with_nothing_written() {
    let rig = Rig::new();
    rig.begin_connect(ADDR);

    let rec = Arc::new(ChunkRecorder::default());
    rig.pool
        .write_chunked(ADDR, SVC, CHR_RW, payload(10), 5, Duration::ZERO, rec.clone());
    rig.pool.flush();

    assert_eq!(rec.failure(), Some((GattError::ConnectionNotEstablished, 0)));
}
