//! Per-device connection state machine.
//!
//! ```text
//!                 connect()                 DiscoveryComplete(ok)
//!  Disconnected ─────────────▶ Connecting ─────────────────────▶ Connected
//!       ▲                          │                                  │
//!       │   timeout · cancel ·     │                                  │
//!       │   link failure ·         │         LinkStateChanged(down) · │
//!       └── discovery failure ─────┘         link failure             │
//!       ▲                                                             │
//!       └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! A link coming up is not success: the connection only becomes
//! `Connected` once service discovery completes.  Every transition runs
//! under the per-device state lock, and every callback it produces is
//! queued on the dispatcher while that lock is still held, so callers see
//! results in the order the transitions happened.
//!
//! Read, write and notify requests are correlated to their completions by
//! [`OperationKey`] in [`PendingTable`]s that have their own locks.
//! Teardown clears every table and single-slot request without notifying
//! the dropped callers.

mod pending;
mod writer;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use log::{debug, info, warn};
use uuid::Uuid;

use crate::callbacks::{
    ChunkedWriteCallback, ConnectCallback, DoneCallback, MtuCallback, NotifyCallback,
    ReadCallback, RssiCallback, WriteCallback,
};
use crate::chunked::ChunkedTransfer;
use crate::device::{Device, OperationKey};
use crate::dispatch::CallbackDispatcher;
use crate::error::{Capability, GattError, Result};
use crate::events::{GattEvent, GattStatus, LinkPhase};
use crate::ports::{LinkId, NotifySetup, Platform, TimeoutTask, TimeoutToken};
use crate::{ATT_HEADER_LEN, MAX_MTU, MIN_MTU, lock};

use pending::PendingTable;
use writer::ChunkedWriter;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Everything guarded by the per-device lock.
struct LinkSlot {
    state: ConnectionState,
    link: Option<LinkId>,
    /// The first caller of the current connect attempt.
    connect_cb: Option<Arc<dyn ConnectCallback>>,
    timeout: Option<TimeoutToken>,
}

enum ConnectNotice {
    Started,
    Connected,
    Failed(GattError),
    Disconnected(GattStatus),
}

struct PendingWrite {
    data: Vec<u8>,
    callback: WriteCallback,
}

/// A notify registration.  `confirmed` flips once the enable has been
/// acknowledged, so a late descriptor ack cannot report success twice.
#[derive(Clone)]
struct NotifyEntry {
    callback: Arc<dyn NotifyCallback>,
    confirmed: bool,
}

/// Outstanding request counts, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PendingCounts {
    pub reads: usize,
    pub writes: usize,
    pub notifies: usize,
    pub rssi: bool,
    pub mtu: bool,
    /// Chunk sends waiting on the inter-chunk delay.
    pub deferred: usize,
}

impl PendingCounts {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// ---------------------------------------------------------------------------
// DeviceConnection
// ---------------------------------------------------------------------------

/// Connection engine for one device.  Created by the pool; one per address.
pub struct DeviceConnection {
    device: Arc<Device>,
    platform: Platform,
    dispatcher: Arc<CallbackDispatcher>,
    default_timeout: Duration,
    self_ref: Weak<DeviceConnection>,

    slot: Mutex<LinkSlot>,
    mtu: AtomicU16,

    reads: PendingTable<ReadCallback>,
    writes: PendingTable<PendingWrite>,
    notifies: PendingTable<NotifyEntry>,
    /// Disable acks still owed by the stack, per key.  Consumed before a
    /// descriptor ack may confirm a newer subscription.
    stale_descriptor_acks: Mutex<HashMap<OperationKey, usize>>,
    rssi: Mutex<Option<RssiCallback>>,
    mtu_request: Mutex<Option<MtuCallback>>,
    /// Deferred chunk sends not yet fired, canceled on teardown.
    deferred: Mutex<HashMap<u64, TimeoutToken>>,
    next_deferred: AtomicU64,
}

impl DeviceConnection {
    pub(crate) fn new(
        device: Arc<Device>,
        platform: Platform,
        dispatcher: Arc<CallbackDispatcher>,
        default_timeout: Duration,
    ) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            device,
            platform,
            dispatcher,
            default_timeout,
            self_ref: self_ref.clone(),
            slot: Mutex::new(LinkSlot {
                state: ConnectionState::Disconnected,
                link: None,
                connect_cb: None,
                timeout: None,
            }),
            mtu: AtomicU16::new(MIN_MTU),
            reads: PendingTable::new("read"),
            writes: PendingTable::new("write"),
            notifies: PendingTable::new("notify"),
            stale_descriptor_acks: Mutex::new(HashMap::new()),
            rssi: Mutex::new(None),
            mtu_request: Mutex::new(None),
            deferred: Mutex::new(HashMap::new()),
            next_deferred: AtomicU64::new(0),
        })
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn state(&self) -> ConnectionState {
        lock(&self.slot).state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Current negotiated transfer unit.
    pub fn mtu(&self) -> u16 {
        self.mtu.load(Ordering::Acquire)
    }

    pub fn pending_counts(&self) -> PendingCounts {
        PendingCounts {
            reads: self.reads.len(),
            writes: self.writes.len(),
            notifies: self.notifies.len(),
            rssi: lock(&self.rssi).is_some(),
            mtu: lock(&self.mtu_request).is_some(),
            deferred: lock(&self.deferred).len(),
        }
    }

    // ── Connect / disconnect ──────────────────────────────────

    /// Start connecting.  A zero `timeout` uses the configured default.
    ///
    /// While a connect is already in progress or established, the new
    /// caller only receives an echo of the current status; the first
    /// caller's callback stays the one that gets the outcome.
    pub fn connect(&self, timeout: Duration, callback: Arc<dyn ConnectCallback>) {
        let mut slot = lock(&self.slot);
        match slot.state {
            ConnectionState::Connecting => {
                debug!("conn[{}]: connect while connecting, echoing status", self.address());
                self.notify_connect(callback, ConnectNotice::Started);
                return;
            }
            ConnectionState::Connected => {
                debug!("conn[{}]: already connected, echoing status", self.address());
                self.notify_connect(callback, ConnectNotice::Connected);
                return;
            }
            ConnectionState::Disconnected => {}
        }

        let Some(link) = self.platform.transport.attempt_link(self.address()) else {
            warn!("conn[{}]: transport could not start link", self.address());
            self.notify_connect(callback, ConnectNotice::Failed(GattError::ConnectionSetupFailed));
            return;
        };

        let timeout = if timeout.is_zero() {
            self.default_timeout
        } else {
            timeout
        };
        info!("conn[{}]: connecting on {} (timeout {:?})", self.address(), link, timeout);

        slot.state = ConnectionState::Connecting;
        slot.link = Some(link);
        slot.connect_cb = Some(Arc::clone(&callback));
        self.device.set_flags(true, false);

        let weak = self.self_ref.clone();
        slot.timeout = Some(self.platform.timer.schedule(
            timeout,
            Box::new(move || {
                if let Some(conn) = weak.upgrade() {
                    conn.on_connect_timeout(link);
                }
            }),
        ));

        self.notify_connect(callback, ConnectNotice::Started);
    }

    /// Cancel a pending connect, or ask the stack to drop an established
    /// link.  For an established link the disconnect is reported later by
    /// the link-state event.
    pub fn disconnect(&self) {
        let mut slot = lock(&self.slot);
        if slot.state == ConnectionState::Disconnected {
            return;
        }
        let Some(link) = slot.link else {
            return;
        };

        self.platform.transport.disconnect(link);

        if slot.state == ConnectionState::Connecting {
            info!("conn[{}]: connect canceled", self.address());
            self.cancel_timeout(&mut slot);
            self.release_link(link);
            let cb = slot.connect_cb.take();
            self.teardown(&mut slot);
            if let Some(cb) = cb {
                self.notify_connect(cb, ConnectNotice::Failed(GattError::ConnectionCanceled));
            }
        } else {
            debug!("conn[{}]: disconnect requested on {}", self.address(), link);
        }
    }

    fn on_connect_timeout(&self, link: LinkId) {
        let mut slot = lock(&self.slot);
        if slot.state != ConnectionState::Connecting || slot.link != Some(link) {
            return;
        }
        warn!("conn[{}]: connect timed out on {}", self.address(), link);
        slot.timeout = None;
        self.platform.transport.disconnect(link);
        self.release_link(link);
        let cb = slot.connect_cb.take();
        self.teardown(&mut slot);
        if let Some(cb) = cb {
            self.notify_connect(cb, ConnectNotice::Failed(GattError::ConnectionTimeout));
        }
    }

    // ── Hardware events ───────────────────────────────────────

    /// Consume one hardware event.  Events for any link other than the
    /// current one are dropped.
    pub fn handle_event(&self, event: GattEvent) {
        match event {
            GattEvent::LinkStateChanged {
                link,
                status,
                phase,
            } => self.on_link_state(link, status, phase),
            GattEvent::DiscoveryComplete { link, status } => self.on_discovery(link, status),
            GattEvent::AttrRead {
                link,
                key,
                status,
                value,
            } => {
                if !self.is_current_link(link) {
                    return;
                }
                if let Some(cb) = self.reads.take(&key) {
                    let result = if status.is_success() {
                        Ok(value)
                    } else {
                        Err(GattError::Unknown)
                    };
                    self.dispatcher.post(move || cb(result));
                }
            }
            GattEvent::AttrWrite { link, key, status } => {
                if !self.is_current_link(link) {
                    return;
                }
                if let Some(PendingWrite { data, callback }) = self.writes.take(&key) {
                    let result = if status.is_success() {
                        Ok(data)
                    } else {
                        Err(GattError::Unknown)
                    };
                    self.dispatcher.post(move || callback(result));
                }
            }
            GattEvent::AttrChanged { link, key, value } => {
                if !self.is_current_link(link) {
                    return;
                }
                if let Some(entry) = self.notifies.get(&key) {
                    self.dispatcher.post(move || entry.callback.on_changed(&value));
                }
            }
            GattEvent::DescriptorWrite { link, key, status } => {
                if !self.is_current_link(link) {
                    return;
                }
                if self.consume_stale_descriptor_ack(&key) {
                    debug!("conn[{}]: descriptor ack for earlier disable on {}", self.address(), key);
                    return;
                }
                if status.is_success() {
                    let confirmed = self
                        .notifies
                        .update(&key, |entry| {
                            (!entry.confirmed).then(|| {
                                entry.confirmed = true;
                                Arc::clone(&entry.callback)
                            })
                        })
                        .flatten();
                    if let Some(cb) = confirmed {
                        self.dispatcher.post(move || cb.on_subscribe_result(Ok(())));
                    }
                } else if let Some(entry) = self.notifies.take(&key) {
                    self.dispatcher.post(move || {
                        entry.callback.on_subscribe_result(Err(GattError::Unknown));
                    });
                }
            }
            GattEvent::RssiRead { link, status, rssi } => {
                if !self.is_current_link(link) {
                    return;
                }
                if let Some(cb) = lock(&self.rssi).take() {
                    let result = if status.is_success() {
                        Ok(rssi)
                    } else {
                        Err(GattError::Unknown)
                    };
                    self.dispatcher.post(move || cb(result));
                }
            }
            GattEvent::UnitChanged { link, status, mtu } => {
                if !self.is_current_link(link) {
                    return;
                }
                let result = if status.is_success() {
                    let mtu = mtu.clamp(MIN_MTU, MAX_MTU);
                    self.mtu.store(mtu, Ordering::Release);
                    info!("conn[{}]: MTU now {}", self.address(), mtu);
                    Ok(mtu)
                } else {
                    Err(GattError::Unknown)
                };
                if let Some(cb) = lock(&self.mtu_request).take() {
                    self.dispatcher.post(move || cb(result));
                }
            }
        }
    }

    fn on_link_state(&self, link: LinkId, status: GattStatus, phase: LinkPhase) {
        let mut slot = lock(&self.slot);
        if slot.link != Some(link) {
            debug!("conn[{}]: stale link-state event for {}", self.address(), link);
            return;
        }
        let prev = slot.state;

        if status.is_success() && phase == LinkPhase::Linked {
            if prev == ConnectionState::Connecting {
                debug!("conn[{}]: link up, discovering services", self.address());
                self.platform.transport.discover_attributes(link);
            }
            return;
        }

        if prev == ConnectionState::Connecting {
            self.cancel_timeout(&mut slot);
        }
        self.release_link(link);
        let cb = slot.connect_cb.take();
        self.teardown(&mut slot);

        let notice = if status.is_success() {
            info!("conn[{}]: link down", self.address());
            (prev != ConnectionState::Disconnected).then_some(ConnectNotice::Disconnected(status))
        } else {
            warn!("conn[{}]: link failure, status {}", self.address(), status.code());
            match prev {
                ConnectionState::Connecting => Some(ConnectNotice::Failed(GattError::Unknown)),
                ConnectionState::Connected => Some(ConnectNotice::Disconnected(status)),
                ConnectionState::Disconnected => None,
            }
        };
        if let (Some(cb), Some(notice)) = (cb, notice) {
            self.notify_connect(cb, notice);
        }
    }

    fn on_discovery(&self, link: LinkId, status: GattStatus) {
        let mut slot = lock(&self.slot);
        if slot.link != Some(link) {
            debug!("conn[{}]: stale discovery event for {}", self.address(), link);
            return;
        }
        self.cancel_timeout(&mut slot);
        if slot.state != ConnectionState::Connecting {
            debug!("conn[{}]: late discovery event ignored", self.address());
            return;
        }

        if status.is_success() {
            info!("conn[{}]: connected", self.address());
            slot.state = ConnectionState::Connected;
            self.device.set_flags(false, true);
            if let Some(cb) = slot.connect_cb.clone() {
                self.notify_connect(cb, ConnectNotice::Connected);
            }
        } else {
            warn!("conn[{}]: service discovery failed, status {}", self.address(), status.code());
            self.platform.transport.disconnect(link);
            self.release_link(link);
            let cb = slot.connect_cb.take();
            self.teardown(&mut slot);
            if let Some(cb) = cb {
                self.notify_connect(cb, ConnectNotice::Failed(GattError::Unknown));
            }
        }
    }

    // ── Attribute operations ──────────────────────────────────

    pub fn read(&self, service: Uuid, attribute: Uuid, callback: ReadCallback) {
        let link = match self.resolve(service, attribute, Capability::Read) {
            Ok(link) => link,
            Err(e) => return self.dispatcher.post(move || callback(Err(e))),
        };
        let key = OperationKey::new(service, attribute);
        self.reads.insert(key, callback);
        if !self.platform.transport.read_attribute(link, service, attribute) {
            warn!("conn[{}]: read {} rejected by transport", self.address(), key);
            if let Some(cb) = self.reads.take(&key) {
                self.dispatcher.post(move || cb(Err(GattError::Unknown)));
            }
        }
    }

    /// Write one attribute value.  The value must fit in `mtu - 3` bytes.
    pub fn write(&self, service: Uuid, attribute: Uuid, data: Vec<u8>, callback: WriteCallback) {
        let link = match self.resolve(service, attribute, Capability::Write) {
            Ok(link) => link,
            Err(e) => return self.dispatcher.post(move || callback(Err(e))),
        };
        if data.len() > self.max_payload() {
            debug!(
                "conn[{}]: write of {} bytes exceeds MTU {}",
                self.address(),
                data.len(),
                self.mtu()
            );
            return self
                .dispatcher
                .post(move || callback(Err(GattError::PayloadTooLarge)));
        }
        let key = OperationKey::new(service, attribute);
        let accepted = {
            let bytes = data.clone();
            self.writes.insert(key, PendingWrite { data, callback });
            self.platform
                .transport
                .write_attribute(link, service, attribute, &bytes)
        };
        if !accepted {
            warn!("conn[{}]: write {} rejected by transport", self.address(), key);
            if let Some(PendingWrite { callback, .. }) = self.writes.take(&key) {
                self.dispatcher.post(move || callback(Err(GattError::Unknown)));
            }
        }
    }

    /// Write a payload of any length as a sequence of `chunk_size` writes,
    /// one outstanding at a time, waiting `inter_chunk_delay` between them.
    pub fn write_chunked(
        &self,
        service: Uuid,
        attribute: Uuid,
        data: Vec<u8>,
        chunk_size: usize,
        inter_chunk_delay: Duration,
        callback: Arc<dyn ChunkedWriteCallback>,
    ) {
        let link = match self.resolve(service, attribute, Capability::Write) {
            Ok(link) => link,
            Err(e) => return self.dispatcher.post(move || callback.on_failure(e, 0)),
        };
        let transfer = if chunk_size > self.max_payload() {
            None
        } else {
            ChunkedTransfer::new(data, chunk_size)
        };
        let Some(transfer) = transfer else {
            return self
                .dispatcher
                .post(move || callback.on_failure(GattError::PayloadTooLarge, 0));
        };
        let key = OperationKey::new(service, attribute);
        ChunkedWriter::new(
            self.self_ref.clone(),
            link,
            key,
            inter_chunk_delay,
            transfer,
            callback,
        )
        .start();
    }

    pub fn subscribe(&self, service: Uuid, attribute: Uuid, callback: Arc<dyn NotifyCallback>) {
        let link = match self.resolve(service, attribute, Capability::Notify) {
            Ok(link) => link,
            Err(e) => return self.dispatcher.post(move || callback.on_subscribe_result(Err(e))),
        };
        let key = OperationKey::new(service, attribute);
        self.notifies.insert(
            key,
            NotifyEntry {
                callback: Arc::clone(&callback),
                confirmed: false,
            },
        );
        match self
            .platform
            .transport
            .set_notify_enabled(link, service, attribute, true)
        {
            NotifySetup::Rejected => {
                warn!("conn[{}]: enabling notify on {} rejected", self.address(), key);
                self.notifies.take(&key);
                self.dispatcher
                    .post(move || callback.on_subscribe_result(Err(GattError::Unknown)));
            }
            NotifySetup::Complete => {
                self.notifies.update(&key, |entry| entry.confirmed = true);
                self.dispatcher.post(move || callback.on_subscribe_result(Ok(())));
            }
            NotifySetup::AwaitingDescriptor => {}
        }
    }

    /// Drop the subscription and issue the disable without waiting for
    /// the stack to confirm it.
    pub fn unsubscribe(&self, service: Uuid, attribute: Uuid, callback: DoneCallback) {
        let link = match self.resolve(service, attribute, Capability::Notify) {
            Ok(link) => link,
            Err(e) => return self.dispatcher.post(move || callback(Err(e))),
        };
        let key = OperationKey::new(service, attribute);
        self.notifies.take(&key);
        let result = match self
            .platform
            .transport
            .set_notify_enabled(link, service, attribute, false)
        {
            NotifySetup::Rejected => Err(GattError::Unknown),
            NotifySetup::Complete => Ok(()),
            NotifySetup::AwaitingDescriptor => {
                *lock(&self.stale_descriptor_acks).entry(key).or_insert(0) += 1;
                Ok(())
            }
        };
        self.dispatcher.post(move || callback(result));
    }

    pub fn read_rssi(&self, callback: RssiCallback) {
        let link = match self.connected_link() {
            Ok(link) => link,
            Err(e) => return self.dispatcher.post(move || callback(Err(e))),
        };
        {
            let mut pending = lock(&self.rssi);
            if pending.is_some() {
                drop(pending);
                return self.dispatcher.post(move || callback(Err(GattError::Busy)));
            }
            *pending = Some(callback);
        }
        if !self.platform.transport.read_rssi(link) {
            if let Some(cb) = lock(&self.rssi).take() {
                self.dispatcher.post(move || cb(Err(GattError::Unknown)));
            }
        }
    }

    /// Ask for a new transfer unit, clamped to `[MIN_MTU, MAX_MTU]`.
    pub fn negotiate_mtu(&self, requested: u16, callback: MtuCallback) {
        let link = match self.connected_link() {
            Ok(link) => link,
            Err(e) => return self.dispatcher.post(move || callback(Err(e))),
        };
        if !self.platform.transport.supports_mtu_negotiation() {
            return self
                .dispatcher
                .post(move || callback(Err(GattError::ApiUnsupported)));
        }
        let mtu = requested.clamp(MIN_MTU, MAX_MTU);
        if mtu == self.mtu() {
            return self.dispatcher.post(move || callback(Ok(mtu)));
        }
        {
            let mut pending = lock(&self.mtu_request);
            if pending.is_some() {
                drop(pending);
                return self.dispatcher.post(move || callback(Err(GattError::Busy)));
            }
            *pending = Some(callback);
        }
        debug!("conn[{}]: requesting MTU {} (asked {})", self.address(), mtu, requested);
        if !self.platform.transport.request_mtu(link, mtu) {
            if let Some(cb) = lock(&self.mtu_request).take() {
                self.dispatcher.post(move || cb(Err(GattError::Unknown)));
            }
        }
    }

    // ── Deferred work ─────────────────────────────────────────

    /// Run `task` after `delay` unless teardown cancels it first.  The
    /// token is forgotten once the task fires.
    pub(crate) fn defer(&self, delay: Duration, task: TimeoutTask) {
        // Held across `schedule` so a fast timer cannot remove the entry
        // before it is inserted.
        let mut deferred = lock(&self.deferred);
        let id = self.next_deferred.fetch_add(1, Ordering::Relaxed);
        let conn = self.self_ref.clone();
        let token = self.platform.timer.schedule(
            delay,
            Box::new(move || {
                if let Some(conn) = conn.upgrade() {
                    lock(&conn.deferred).remove(&id);
                }
                task();
            }),
        );
        deferred.insert(id, token);
    }

    /// Cancel every deferred chunk send.
    pub(crate) fn cancel_deferred(&self) {
        let tokens = std::mem::take(&mut *lock(&self.deferred));
        for token in tokens.into_values() {
            self.platform.timer.cancel(token);
        }
    }

    // ── Internal ──────────────────────────────────────────────

    fn address(&self) -> &str {
        self.device.address()
    }

    fn max_payload(&self) -> usize {
        usize::from(self.mtu()) - ATT_HEADER_LEN
    }

    /// The established link, if any.
    pub(crate) fn current_link(&self) -> Option<LinkId> {
        self.connected_link().ok()
    }

    fn consume_stale_descriptor_ack(&self, key: &OperationKey) -> bool {
        let mut stale = lock(&self.stale_descriptor_acks);
        let Some(owed) = stale.get_mut(key) else {
            return false;
        };
        *owed -= 1;
        if *owed == 0 {
            stale.remove(key);
        }
        true
    }

    fn is_current_link(&self, link: LinkId) -> bool {
        let current = lock(&self.slot).link == Some(link);
        if !current {
            debug!("conn[{}]: dropping event for stale {}", self.address(), link);
        }
        current
    }

    fn connected_link(&self) -> Result<LinkId> {
        let slot = lock(&self.slot);
        match (slot.state, slot.link) {
            (ConnectionState::Connected, Some(link)) => Ok(link),
            _ => Err(GattError::ConnectionNotEstablished),
        }
    }

    /// Precondition checks, in fixed order: connected, service,
    /// characteristic, capability.
    fn resolve(&self, service: Uuid, attribute: Uuid, capability: Capability) -> Result<LinkId> {
        let link = self.connected_link()?;
        let svc = self
            .platform
            .transport
            .service(link, service)
            .ok_or(GattError::ServiceNotFound)?;
        let characteristic = svc
            .characteristic(attribute)
            .ok_or(GattError::AttributeNotFound)?;
        let props = characteristic.properties;
        let supported = match capability {
            Capability::Read => props.can_read(),
            Capability::Write => props.can_write(),
            Capability::Notify => props.can_notify(),
        };
        if supported {
            Ok(link)
        } else {
            Err(GattError::CapabilityUnsupported(capability))
        }
    }

    fn cancel_timeout(&self, slot: &mut LinkSlot) {
        if let Some(token) = slot.timeout.take() {
            self.platform.timer.cancel(token);
        }
    }

    fn release_link(&self, link: LinkId) {
        if !self.platform.transport.refresh_cache(link) {
            debug!("conn[{}]: cache refresh not supported", self.address());
        }
        self.platform.transport.close_link(link);
    }

    /// Back to `Disconnected` with no outstanding state.  Dropped callers
    /// are not notified.
    fn teardown(&self, slot: &mut LinkSlot) {
        self.cancel_timeout(slot);
        slot.state = ConnectionState::Disconnected;
        slot.link = None;
        slot.connect_cb = None;
        self.device.set_flags(false, false);

        let dropped = self.reads.clear() + self.writes.clear() + self.notifies.clear();
        lock(&self.stale_descriptor_acks).clear();
        let rssi = lock(&self.rssi).take().is_some();
        let mtu = lock(&self.mtu_request).take().is_some();
        self.cancel_deferred();
        self.mtu.store(MIN_MTU, Ordering::Release);

        if dropped > 0 || rssi || mtu {
            debug!(
                "conn[{}]: teardown dropped {} keyed requests (rssi={}, mtu={})",
                self.address(),
                dropped,
                rssi,
                mtu
            );
        }
    }

    fn notify_connect(&self, callback: Arc<dyn ConnectCallback>, notice: ConnectNotice) {
        let device = Arc::clone(&self.device);
        self.dispatcher.post(move || match notice {
            ConnectNotice::Started => callback.on_connection_started(&device),
            ConnectNotice::Connected => callback.on_connected(&device),
            ConnectNotice::Failed(e) => callback.on_connection_failed(&device, e),
            ConnectNotice::Disconnected(status) => callback.on_disconnected(&device, status),
        });
    }
}
