//! Port traits: the hexagonal boundary between the connection engine and
//! the radio stack underneath it.
//!
//! ```text
//!   Radio stack ──▶ Port trait ──▶ ConnectionPool / DeviceConnection
//! ```
//!
//! Driven adapters (a platform GATT client, a simulated stack in tests)
//! implement these traits.  The engine only ever holds them as shared
//! trait objects, so the core never touches a concrete radio API.
//!
//! ## Contract notes
//!
//! - Every `bool` return means "the request was accepted and a completion
//!   event will follow"; `false` means nothing was started.
//! - Completion events are delivered back through
//!   [`ConnectionPool::handle_event`](crate::pool::ConnectionPool::handle_event)
//!   from a single event thread.
//! - Implementations must not call back into the engine synchronously
//!   from inside these methods.

use core::fmt;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::device::GattService;

/// Opaque handle for one transport-level link.  A fresh handle is issued
/// for every link attempt, so events for an old link never match a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkId(pub u64);

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link#{}", self.0)
    }
}

/// Outcome of enabling or disabling notifications on a characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifySetup {
    /// The transport refused the request.
    Rejected,
    /// Done; no configuration descriptor write is needed.
    Complete,
    /// A configuration descriptor write was issued; a
    /// [`GattEvent::DescriptorWrite`](crate::events::GattEvent::DescriptorWrite)
    /// will report the outcome.
    AwaitingDescriptor,
}

// ───────────────────────────────────────────────────────────────
// Transport port (driven adapter: engine ↔ radio stack)
// ───────────────────────────────────────────────────────────────

/// Capability contract the engine requires from the GATT stack.
pub trait Transport: Send + Sync {
    /// Start a link attempt.  `None` when the attempt could not start.
    fn attempt_link(&self, address: &str) -> Option<LinkId>;

    /// Start service discovery; completes with `DiscoveryComplete`.
    fn discover_attributes(&self, link: LinkId);

    /// Look up a discovered service.
    fn service(&self, link: LinkId, service: Uuid) -> Option<GattService>;

    fn read_attribute(&self, link: LinkId, service: Uuid, attribute: Uuid) -> bool;

    fn write_attribute(&self, link: LinkId, service: Uuid, attribute: Uuid, data: &[u8]) -> bool;

    fn set_notify_enabled(
        &self,
        link: LinkId,
        service: Uuid,
        attribute: Uuid,
        enabled: bool,
    ) -> NotifySetup;

    fn read_rssi(&self, link: LinkId) -> bool;

    /// Whether this platform can negotiate the transfer unit at all.
    fn supports_mtu_negotiation(&self) -> bool;

    fn request_mtu(&self, link: LinkId, mtu: u16) -> bool;

    /// Ask the stack to drop the link.  Completion (for established links)
    /// arrives as `LinkStateChanged`.
    fn disconnect(&self, link: LinkId);

    /// Release the link handle.
    fn close_link(&self, link: LinkId);

    /// Invalidate the stack's cached attribute tree for this link.
    fn refresh_cache(&self, link: LinkId) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Radio port (driven adapter: engine → adapter state)
// ───────────────────────────────────────────────────────────────

/// Adapter-level state queried before any connection is attempted.
pub trait RadioPort: Send + Sync {
    fn is_radio_on(&self) -> bool;

    fn has_connect_permission(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Timeout port (driven adapter: engine → execution context)
// ───────────────────────────────────────────────────────────────

/// Identifies one scheduled task for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeoutToken(pub u64);

/// A deferred task run at most once.
pub type TimeoutTask = Box<dyn FnOnce() + Send + 'static>;

/// Timeout / cancellation primitive supplied by the execution context.
pub trait TimeoutPort: Send + Sync {
    /// Run `task` once after `delay` unless canceled first.
    ///
    /// Must not run `task` on the calling thread: the engine schedules
    /// while holding a device's state lock.
    fn schedule(&self, delay: Duration, task: TimeoutTask) -> TimeoutToken;

    /// Cancel a scheduled task.  Canceling a task that already ran, or was
    /// already canceled, is a no-op.
    fn cancel(&self, token: TimeoutToken);
}

// ───────────────────────────────────────────────────────────────
// Platform bundle
// ───────────────────────────────────────────────────────────────

/// The set of ports a pool is built on.
#[derive(Clone)]
pub struct Platform {
    pub transport: Arc<dyn Transport>,
    pub radio: Arc<dyn RadioPort>,
    pub timer: Arc<dyn TimeoutPort>,
}

impl Platform {
    pub fn new(
        transport: Arc<dyn Transport>,
        radio: Arc<dyn RadioPort>,
        timer: Arc<dyn TimeoutPort>,
    ) -> Self {
        Self {
            transport,
            radio,
            timer,
        }
    }
}

impl fmt::Debug for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Platform").finish_non_exhaustive()
    }
}
