//! gattpool: multi-device GATT connection engine.
//!
//! Manages concurrent connections to many peripheral devices over an
//! abstract attribute-protocol radio stack.  Each device gets a
//! connection state machine; a pool gates and routes connects; every
//! externally visible callback is delivered in order on one dispatcher
//! thread.
//!
//! ```text
//!  application ──▶ GattClient ──▶ ConnectionPool ──▶ DeviceConnection ──▶ Transport
//!       ▲                                 │                  ▲
//!       │                                 ▼                  │ GattEvent
//!       └──────────── CallbackDispatcher ◀┘          radio stack events
//! ```
//!
//! The radio stack, radio state and timers are ports ([`ports`]); the
//! crate ships a thread-based timer and a logging observer
//! ([`adapters`]) and no radio adapter.

#![deny(unused_must_use)]

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod adapters;
pub mod callbacks;
pub mod chunked;
pub mod client;
pub mod config;
pub mod connection;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod pool;
pub mod ports;

pub use callbacks::{ChunkedWriteCallback, ConnectCallback, NotifyCallback};
pub use chunked::WriteProgress;
pub use client::GattClient;
pub use config::PoolConfig;
pub use connection::{ConnectionState, DeviceConnection};
pub use device::{CharProperties, Device, GattCharacteristic, GattService, OperationKey};
pub use error::{Capability, GattError};
pub use events::{GattEvent, GattStatus, LinkPhase};
pub use pool::ConnectionPool;
pub use ports::{LinkId, NotifySetup, Platform};

/// Smallest transfer unit; also the value after every teardown.
pub const MIN_MTU: u16 = 23;
/// Largest transfer unit a negotiation may request.
pub const MAX_MTU: u16 = 512;
/// Attribute-protocol header bytes per write.
pub const ATT_HEADER_LEN: usize = 3;

/// Lock ignoring poisoning; callbacks never run under crate locks, so a
/// poisoned lock only means a panic elsewhere in a short critical section.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
