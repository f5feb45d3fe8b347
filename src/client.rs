//! String-addressed facade over [`ConnectionPool`].
//!
//! Application code that carries service and characteristic identifiers
//! as canonical UUID strings calls through here.  Malformed identifiers
//! are argument errors and are returned synchronously; everything else is
//! reported through the operation's callback exactly as the pool does.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use uuid::Uuid;

use crate::callbacks::{
    ChunkedWriteCallback, ConnectCallback, DoneCallback, MtuCallback, NotifyCallback,
    ReadCallback, RssiCallback, WriteCallback,
};
use crate::device::{Device, OperationKey};
use crate::pool::ConnectionPool;

/// Parse a service/characteristic pair.
pub fn parse_key(service: &str, attribute: &str) -> Result<OperationKey> {
    let service =
        Uuid::parse_str(service).with_context(|| format!("invalid service uuid '{service}'"))?;
    let attribute = Uuid::parse_str(attribute)
        .with_context(|| format!("invalid characteristic uuid '{attribute}'"))?;
    Ok(OperationKey::new(service, attribute))
}

#[derive(Clone)]
pub struct GattClient {
    pool: Arc<ConnectionPool>,
}

impl GattClient {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    pub fn connect(&self, address: &str, timeout: Duration, callback: Arc<dyn ConnectCallback>) {
        self.pool.connect(address, timeout, callback);
    }

    pub fn disconnect(&self, address: &str) {
        self.pool.disconnect(address);
    }

    pub fn disconnect_all(&self) {
        self.pool.disconnect_all();
    }

    pub fn connected_devices(&self) -> Vec<Arc<Device>> {
        self.pool.connected_devices()
    }

    pub fn is_connected(&self, address: &str) -> bool {
        self.pool.is_connected(address)
    }

    pub fn read(
        &self,
        address: &str,
        service: &str,
        attribute: &str,
        callback: ReadCallback,
    ) -> Result<()> {
        let key = parse_key(service, attribute)?;
        self.pool.read(address, key.service, key.attribute, callback);
        Ok(())
    }

    pub fn write(
        &self,
        address: &str,
        service: &str,
        attribute: &str,
        data: Vec<u8>,
        callback: WriteCallback,
    ) -> Result<()> {
        let key = parse_key(service, attribute)?;
        self.pool
            .write(address, key.service, key.attribute, data, callback);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn write_chunked(
        &self,
        address: &str,
        service: &str,
        attribute: &str,
        data: Vec<u8>,
        chunk_size: usize,
        inter_chunk_delay: Duration,
        callback: Arc<dyn ChunkedWriteCallback>,
    ) -> Result<()> {
        let key = parse_key(service, attribute)?;
        self.pool.write_chunked(
            address,
            key.service,
            key.attribute,
            data,
            chunk_size,
            inter_chunk_delay,
            callback,
        );
        Ok(())
    }

    pub fn subscribe(
        &self,
        address: &str,
        service: &str,
        attribute: &str,
        callback: Arc<dyn NotifyCallback>,
    ) -> Result<()> {
        let key = parse_key(service, attribute)?;
        self.pool
            .subscribe(address, key.service, key.attribute, callback);
        Ok(())
    }

    pub fn unsubscribe(
        &self,
        address: &str,
        service: &str,
        attribute: &str,
        callback: DoneCallback,
    ) -> Result<()> {
        let key = parse_key(service, attribute)?;
        self.pool
            .unsubscribe(address, key.service, key.attribute, callback);
        Ok(())
    }

    pub fn read_rssi(&self, address: &str, callback: RssiCallback) {
        self.pool.read_rssi(address, callback);
    }

    pub fn negotiate_mtu(&self, address: &str, mtu: u16, callback: MtuCallback) {
        self.pool.negotiate_mtu(address, mtu, callback);
    }
}
