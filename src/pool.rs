//! Connection pool: one [`DeviceConnection`] per address.
//!
//! The pool owns the callback dispatcher, gates new connects on radio
//! state, permission and the connection limit, and routes operations and
//! hardware events to the connection for an address.  Entries are created
//! lazily on first connect and kept across disconnects so a reconnect
//! reuses the same connection and device handle.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use log::{debug, info, warn};
use uuid::Uuid;

use crate::callbacks::{
    ChunkedWriteCallback, ConnectCallback, DoneCallback, MtuCallback, NotifyCallback,
    ReadCallback, RssiCallback, WriteCallback,
};
use crate::config::PoolConfig;
use crate::connection::DeviceConnection;
use crate::device::Device;
use crate::dispatch::CallbackDispatcher;
use crate::error::{GattError, Result};
use crate::events::GattEvent;
use crate::lock;
use crate::ports::Platform;

pub struct ConnectionPool {
    config: PoolConfig,
    platform: Platform,
    dispatcher: Arc<CallbackDispatcher>,
    connections: Mutex<HashMap<String, Arc<DeviceConnection>>>,
    destroyed: AtomicBool,
}

impl ConnectionPool {
    /// Validate `config` and start the dispatcher thread.
    pub fn new(config: PoolConfig, platform: Platform) -> anyhow::Result<Self> {
        config.validate()?;
        let dispatcher = CallbackDispatcher::start(&config.dispatcher_thread_name)
            .context("starting callback dispatcher")?;
        info!(
            "pool: ready (max {} connections, connect timeout {} ms)",
            config.max_connections, config.default_connect_timeout_ms
        );
        Ok(Self {
            config,
            platform,
            dispatcher: Arc::new(dispatcher),
            connections: Mutex::new(HashMap::new()),
            destroyed: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    // ── Connections ───────────────────────────────────────────

    /// Connect to `address`.  A zero `timeout` uses the configured default.
    pub fn connect(&self, address: &str, timeout: Duration, callback: Arc<dyn ConnectCallback>) {
        let conn = {
            let mut connections = lock(&self.connections);
            let rejection = if self.is_destroyed() {
                Some(GattError::Unknown)
            } else if !self.platform.radio.is_radio_on() {
                Some(GattError::RadioOff)
            } else if !self.platform.radio.has_connect_permission() {
                Some(GattError::PermissionDenied)
            } else {
                let others = connections
                    .iter()
                    .filter(|(addr, conn)| addr.as_str() != address && conn.is_connected())
                    .count();
                (others >= self.config.max_connections).then_some(GattError::MaxConnectionsReached)
            };

            if let Some(error) = rejection {
                warn!("pool: connect to {} rejected: {}", address, error);
                let device = connections
                    .get(address)
                    .map(|c| Arc::clone(c.device()))
                    .unwrap_or_else(|| Arc::new(Device::new(address)));
                drop(connections);
                return self
                    .dispatcher
                    .post(move || callback.on_connection_failed(&device, error));
            }

            Arc::clone(connections.entry(address.to_owned()).or_insert_with(|| {
                debug!("pool: new connection entry for {}", address);
                DeviceConnection::new(
                    Arc::new(Device::new(address)),
                    self.platform.clone(),
                    Arc::clone(&self.dispatcher),
                    self.config.default_connect_timeout(),
                )
            }))
        };
        conn.connect(timeout, callback);
    }

    pub fn disconnect(&self, address: &str) {
        match self.connection(address) {
            Some(conn) => conn.disconnect(),
            None => debug!("pool: disconnect for unknown {}", address),
        }
    }

    /// Disconnect every device and cancel deferred chunk sends.
    pub fn disconnect_all(&self) {
        for conn in self.snapshot() {
            conn.cancel_deferred();
            conn.disconnect();
        }
    }

    /// Devices currently in the `Connected` state.
    pub fn connected_devices(&self) -> Vec<Arc<Device>> {
        self.snapshot()
            .into_iter()
            .filter(|c| c.is_connected())
            .map(|c| Arc::clone(c.device()))
            .collect()
    }

    pub fn is_connected(&self, address: &str) -> bool {
        self.connection(address).is_some_and(|c| c.is_connected())
    }

    pub fn connection(&self, address: &str) -> Option<Arc<DeviceConnection>> {
        lock(&self.connections).get(address).cloned()
    }

    /// Device handle for `address`, once it has been connected to.
    pub fn device(&self, address: &str) -> Option<Arc<Device>> {
        self.connection(address).map(|c| Arc::clone(c.device()))
    }

    /// Disconnect everything and discard all entries.  The pool is unusable
    /// afterwards: every later operation fails with `Unknown`.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("pool: destroying");
        for conn in self.snapshot() {
            conn.cancel_deferred();
            conn.disconnect();
        }
        lock(&self.connections).clear();
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Block until every callback queued so far has run.
    pub fn flush(&self) {
        self.dispatcher.flush();
    }

    // ── Hardware events ───────────────────────────────────────

    pub fn handle_event(&self, address: &str, event: GattEvent) {
        match self.connection(address) {
            Some(conn) => conn.handle_event(event),
            None => debug!("pool: {} event for unknown {} dropped", event.kind(), address),
        }
    }

    // ── Attribute operations ──────────────────────────────────

    pub fn read(&self, address: &str, service: Uuid, attribute: Uuid, callback: ReadCallback) {
        match self.route(address) {
            Ok(conn) => conn.read(service, attribute, callback),
            Err(e) => self.dispatcher.post(move || callback(Err(e))),
        }
    }

    pub fn write(
        &self,
        address: &str,
        service: Uuid,
        attribute: Uuid,
        data: Vec<u8>,
        callback: WriteCallback,
    ) {
        match self.route(address) {
            Ok(conn) => conn.write(service, attribute, data, callback),
            Err(e) => self.dispatcher.post(move || callback(Err(e))),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn write_chunked(
        &self,
        address: &str,
        service: Uuid,
        attribute: Uuid,
        data: Vec<u8>,
        chunk_size: usize,
        inter_chunk_delay: Duration,
        callback: Arc<dyn ChunkedWriteCallback>,
    ) {
        match self.route(address) {
            Ok(conn) => conn.write_chunked(
                service,
                attribute,
                data,
                chunk_size,
                inter_chunk_delay,
                callback,
            ),
            Err(e) => self.dispatcher.post(move || callback.on_failure(e, 0)),
        }
    }

    pub fn subscribe(
        &self,
        address: &str,
        service: Uuid,
        attribute: Uuid,
        callback: Arc<dyn NotifyCallback>,
    ) {
        match self.route(address) {
            Ok(conn) => conn.subscribe(service, attribute, callback),
            Err(e) => self.dispatcher.post(move || callback.on_subscribe_result(Err(e))),
        }
    }

    pub fn unsubscribe(&self, address: &str, service: Uuid, attribute: Uuid, callback: DoneCallback) {
        match self.route(address) {
            Ok(conn) => conn.unsubscribe(service, attribute, callback),
            Err(e) => self.dispatcher.post(move || callback(Err(e))),
        }
    }

    pub fn read_rssi(&self, address: &str, callback: RssiCallback) {
        match self.route(address) {
            Ok(conn) => conn.read_rssi(callback),
            Err(e) => self.dispatcher.post(move || callback(Err(e))),
        }
    }

    pub fn negotiate_mtu(&self, address: &str, mtu: u16, callback: MtuCallback) {
        match self.route(address) {
            Ok(conn) => conn.negotiate_mtu(mtu, callback),
            Err(e) => self.dispatcher.post(move || callback(Err(e))),
        }
    }

    // ── Internal ──────────────────────────────────────────────

    fn route(&self, address: &str) -> Result<Arc<DeviceConnection>> {
        if self.is_destroyed() {
            return Err(GattError::Unknown);
        }
        self.connection(address)
            .ok_or(GattError::ConnectionNotEstablished)
    }

    fn snapshot(&self) -> Vec<Arc<DeviceConnection>> {
        lock(&self.connections).values().cloned().collect()
    }
}

impl Drop for ConnectionPool {
    fn drop(&mut self) {
        self.destroy();
        self.dispatcher.shutdown();
    }
}
