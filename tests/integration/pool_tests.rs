//! Integration tests for the connection pool: admission gates, the
//! connection limit, routing, destroy and the string facade.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gattpool::{GattClient, GattError, GattStatus, PoolConfig};

use super::mock_radio::{CHR_RW, ChunkRecorder, ConnectEvent, RadioCall, Rig, SVC, Slot};

fn addr(n: usize) -> String {
    format!("AA:BB:CC:DD:EE:{n:02X}")
}

// ── Admission ─────────────────────────────────────────────────

#[test]
fn radio_off_checked_first() {
    let rig = Rig::new();
    rig.radio.radio_on.store(false, Ordering::SeqCst);
    rig.radio.permission.store(false, Ordering::SeqCst);

    let rec = rig.begin_connect(&addr(1));
    rig.pool.flush();

    assert_eq!(rec.events(), vec![ConnectEvent::Failed(GattError::RadioOff)]);
    assert_eq!(rec.devices.lock().unwrap()[0].address(), addr(1));
    assert!(rig.radio.calls().is_empty());
}

#[test]
fn missing_permission_rejected() {
    let rig = Rig::new();
    rig.radio.permission.store(false, Ordering::SeqCst);

    let rec = rig.begin_connect(&addr(1));
    rig.pool.flush();
    assert_eq!(rec.events(), vec![ConnectEvent::Failed(GattError::PermissionDenied)]);
}

#[test]
fn eighth_device_rejected_until_one_disconnects() {
    let rig = Rig::new();
    for n in 0..7 {
        rig.connect(&addr(n));
    }
    assert_eq!(rig.pool.connected_devices().len(), 7);

    let rejected = rig.begin_connect(&addr(7));
    rig.pool.flush();
    assert_eq!(rejected.events(), vec![ConnectEvent::Failed(GattError::MaxConnectionsReached)]);

    rig.link_down(&addr(3), GattStatus::Success);
    let admitted = rig.begin_connect(&addr(7));
    rig.pool.flush();
    assert_eq!(admitted.events(), vec![ConnectEvent::Started]);
}

#[test]
fn limit_counts_only_connected_devices() {
    let rig = Rig::with_config(PoolConfig {
        max_connections: 1,
        ..PoolConfig::default()
    });
    let connecting = rig.begin_connect(&addr(1));
    let second = rig.begin_connect(&addr(2));
    rig.pool.flush();

    assert_eq!(connecting.events(), vec![ConnectEvent::Started]);
    assert_eq!(second.events(), vec![ConnectEvent::Started]);
}

#[test]
fn target_device_excluded_from_limit() {
    let rig = Rig::with_config(PoolConfig {
        max_connections: 1,
        ..PoolConfig::default()
    });
    rig.connect(&addr(1));

    let again = rig.begin_connect(&addr(1));
    rig.pool.flush();
    assert_eq!(again.events(), vec![ConnectEvent::Connected]);
}

#[test]
fn reconnect_reuses_device_handle() {
    let rig = Rig::new();
    let first = rig.connect(&addr(1));
    rig.link_down(&addr(1), GattStatus::Success);
    let second = rig.connect(&addr(1));

    let a = first.devices.lock().unwrap()[0].clone();
    let b = second.devices.lock().unwrap()[0].clone();
    assert!(Arc::ptr_eq(&a, &b));
}

// ── Queries and routing ───────────────────────────────────────

#[test]
fn connected_devices_excludes_connecting() {
    let rig = Rig::new();
    rig.connect(&addr(1));
    rig.begin_connect(&addr(2));

    let devices = rig.pool.connected_devices();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].address(), addr(1));
    assert!(rig.pool.is_connected(&addr(1)));
    assert!(!rig.pool.is_connected(&addr(2)));
    assert!(!rig.pool.is_connected(&addr(9)));
}

#[test]
fn unknown_address_not_established() {
    let rig = Rig::new();
    let read = Slot::new();
    let mtu = Slot::new();
    let chunked = Arc::new(ChunkRecorder::default());
    rig.pool.read(&addr(5), SVC, CHR_RW, read.boxed());
    rig.pool.negotiate_mtu(&addr(5), 100, mtu.boxed());
    rig.pool
        .write_chunked(&addr(5), SVC, CHR_RW, vec![1; 10], 5, Duration::ZERO, chunked.clone());
    rig.pool.flush();

    assert_eq!(read.take(), Some(Err(GattError::ConnectionNotEstablished)));
    assert_eq!(mtu.take(), Some(Err(GattError::ConnectionNotEstablished)));
    assert_eq!(chunked.failure(), Some((GattError::ConnectionNotEstablished, 0)));
}

#[test]
fn events_for_unknown_address_dropped() {
    let rig = Rig::new();
    rig.connect(&addr(1));
    let link = rig.radio.link_for(&addr(1));
    rig.pool.handle_event(
        &addr(2),
        gattpool::GattEvent::LinkStateChanged {
            link,
            status: GattStatus::Success,
            phase: gattpool::LinkPhase::Unlinked,
        },
    );
    rig.pool.flush();
    assert!(rig.pool.is_connected(&addr(1)));
}

#[test]
fn callbacks_run_on_dispatcher_thread() {
    let rig = Rig::new();
    let name = Arc::new(Mutex::new(None));
    let seen = Arc::clone(&name);
    rig.pool.read(
        &addr(1),
        SVC,
        CHR_RW,
        Box::new(move |_| {
            *seen.lock().unwrap() = std::thread::current().name().map(str::to_owned);
        }),
    );
    rig.pool.flush();
    assert_eq!(name.lock().unwrap().as_deref(), Some("gatt-dispatch"));
}

#[test]
fn panicking_callback_does_not_block_later_ones() {
    let rig = Rig::new();
    rig.pool
        .read(&addr(1), SVC, CHR_RW, Box::new(|_| panic!("application bug")));
    let after = Slot::new();
    rig.pool.read(&addr(1), SVC, CHR_RW, after.boxed());
    rig.pool.flush();
    assert_eq!(after.take(), Some(Err(GattError::ConnectionNotEstablished)));
}

// ── Disconnect all and destroy ────────────────────────────────

#[test]
fn disconnect_all_cancels_deferred_chunks() {
    let rig = Rig::new();
    rig.connect(&addr(1));
    rig.connect(&addr(2));
    let rec = Arc::new(ChunkRecorder::default());
    rig.pool.write_chunked(
        &addr(1),
        SVC,
        CHR_RW,
        vec![0; 40],
        20,
        Duration::from_millis(30),
        rec.clone(),
    );
    rig.ack_write(&addr(1), CHR_RW, GattStatus::Success);
    assert_eq!(rig.timer.pending(), 1);

    rig.pool.disconnect_all();

    assert_eq!(rig.timer.pending(), 0);
    for n in [1, 2] {
        let link = rig.radio.link_for(&addr(n));
        assert!(rig.radio.calls().contains(&RadioCall::Disconnect(link)));
    }
}

#[test]
fn destroy_is_terminal() {
    let rig = Rig::new();
    rig.connect(&addr(1));
    let link = rig.radio.link_for(&addr(1));

    rig.pool.destroy();
    assert!(rig.pool.is_destroyed());
    assert!(rig.radio.calls().contains(&RadioCall::Disconnect(link)));
    assert!(rig.pool.connected_devices().is_empty());

    let rec = rig.begin_connect(&addr(1));
    let read = Slot::new();
    rig.pool.read(&addr(1), SVC, CHR_RW, read.boxed());
    rig.pool.flush();

    assert_eq!(rec.events(), vec![ConnectEvent::Failed(GattError::Unknown)]);
    assert_eq!(read.take(), Some(Err(GattError::Unknown)));
}

// ── Facade ────────────────────────────────────────────────────

#[test]
fn facade_parses_uuid_strings() {
    let rig = Rig::new();
    rig.connect(&addr(1));
    let client = GattClient::new(Arc::new(rig.pool));

    let read = Slot::new();
    client
        .read(&addr(1), &SVC.to_string(), &CHR_RW.hyphenated().to_string(), read.boxed())
        .unwrap();
    assert!(rig.radio.count(|c| matches!(c, RadioCall::Read { .. })) == 1);

    let bad = client.write(&addr(1), "not-a-uuid", &CHR_RW.to_string(), vec![1], Box::new(|_| {}));
    assert!(bad.is_err());
    assert!(client.is_connected(&addr(1)));
}

// ── Real timer ────────────────────────────────────────────────

#[test]
fn async_timer_expires_connect() {
    use gattpool::adapters::timer::AsyncTimer;
    use gattpool::{ConnectionPool, Platform};

    let radio = Arc::new(super::mock_radio::MockTransport::new());
    let timer = Arc::new(AsyncTimer::start().unwrap());
    let pool = ConnectionPool::new(
        PoolConfig::default(),
        Platform::new(radio.clone(), radio.clone(), timer.clone()),
    )
    .unwrap();

    let rec = Arc::new(super::mock_radio::ConnectRecorder::default());
    pool.connect(&addr(1), Duration::from_millis(20), rec.clone());

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while rec.events().len() < 2 && std::time::Instant::now() < deadline {
        pool.flush();
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(timer.armed_count(), 0);

    assert_eq!(
        rec.events(),
        vec![ConnectEvent::Started, ConnectEvent::Failed(GattError::ConnectionTimeout)]
    );
}
