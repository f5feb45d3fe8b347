//! Caller-facing result callbacks.
//!
//! Every request accepts exactly one callback and every outcome of that
//! request, including precondition failures detected before anything is
//! sent, is reported through it on the dispatcher thread.
//!
//! One-shot requests take boxed closures; requests that may report more
//! than once (connect, subscribe, chunked write) take shared trait
//! objects.

use std::sync::Arc;

use crate::chunked::WriteProgress;
use crate::device::Device;
use crate::error::{GattError, Result};
use crate::events::GattStatus;

/// Connection lifecycle observer for one `connect` call.
pub trait ConnectCallback: Send + Sync {
    fn on_connection_started(&self, _device: &Arc<Device>) {}

    fn on_connected(&self, device: &Arc<Device>);

    fn on_connection_failed(&self, device: &Arc<Device>, error: GattError);

    /// An established link went down.  `status` is the stack's reason.
    fn on_disconnected(&self, device: &Arc<Device>, status: GattStatus);
}

/// Subscription observer.  Stays registered until unsubscribe or teardown.
pub trait NotifyCallback: Send + Sync {
    fn on_subscribe_result(&self, result: Result<()>);

    fn on_changed(&self, value: &[u8]);
}

/// Chunked write observer.
pub trait ChunkedWriteCallback: Send + Sync {
    fn on_progress(&self, progress: WriteProgress);

    /// All chunks acknowledged; carries the full payload.
    fn on_success(&self, data: Vec<u8>);

    /// `written` counts bytes of chunks acknowledged before the failure.
    fn on_failure(&self, error: GattError, written: usize);
}

/// Read result: the attribute value.
pub type ReadCallback = Box<dyn FnOnce(Result<Vec<u8>>) + Send + 'static>;

/// Write result: echoes the bytes that were written.
pub type WriteCallback = Box<dyn FnOnce(Result<Vec<u8>>) + Send + 'static>;

/// Fire-and-forget acknowledgement (unsubscribe).
pub type DoneCallback = Box<dyn FnOnce(Result<()>) + Send + 'static>;

/// RSSI in dBm.
pub type RssiCallback = Box<dyn FnOnce(Result<i32>) + Send + 'static>;

/// Negotiated transfer unit.
pub type MtuCallback = Box<dyn FnOnce(Result<u16>) + Send + 'static>;
