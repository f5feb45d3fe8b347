//! Log-based connection observer.
//!
//! Implements [`ConnectCallback`] by writing every lifecycle transition to
//! the `log` facade.  Useful as a default observer for fire-and-forget
//! connects, or wrapped around an application callback to trace it.

use std::sync::Arc;

use log::{info, warn};

use crate::callbacks::ConnectCallback;
use crate::device::Device;
use crate::error::GattError;
use crate::events::GattStatus;

/// Adapter that logs every connection event, then forwards it to an
/// optional inner callback.
#[derive(Default)]
pub struct LogConnectCallback {
    inner: Option<Arc<dyn ConnectCallback>>,
}

impl LogConnectCallback {
    pub fn new() -> Self {
        Self { inner: None }
    }

    pub fn wrapping(inner: Arc<dyn ConnectCallback>) -> Self {
        Self { inner: Some(inner) }
    }
}

impl ConnectCallback for LogConnectCallback {
    fn on_connection_started(&self, device: &Arc<Device>) {
        info!("CONN | {} | connecting", device);
        if let Some(inner) = &self.inner {
            inner.on_connection_started(device);
        }
    }

    fn on_connected(&self, device: &Arc<Device>) {
        info!("CONN | {} | connected", device);
        if let Some(inner) = &self.inner {
            inner.on_connected(device);
        }
    }

    fn on_connection_failed(&self, device: &Arc<Device>, error: GattError) {
        warn!("CONN | {} | failed: {} (code {})", device, error, error.code());
        if let Some(inner) = &self.inner {
            inner.on_connection_failed(device, error);
        }
    }

    fn on_disconnected(&self, device: &Arc<Device>, status: GattStatus) {
        info!("CONN | {} | disconnected, status={}", device, status.code());
        if let Some(inner) = &self.inner {
            inner.on_disconnected(device, status);
        }
    }
}
