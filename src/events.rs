//! Hardware completion events.
//!
//! Events are produced by the radio stack's single event thread and fed
//! to [`ConnectionPool::handle_event`](crate::pool::ConnectionPool::handle_event),
//! which routes them by address to exactly one connection.  Each
//! connection consumes them in one transition function.
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────────┐
//! │ Radio stack  │────▶│ ConnectionPool│────▶│ DeviceConnection │
//! │ (event thread)│    │  (route by addr)│   │  (validate link) │
//! └──────────────┘     └──────────────┘     └──────────────────┘
//! ```
//!
//! Every variant carries the [`LinkId`] it originated from; events whose
//! link is no longer the connection's current link are dropped.

use crate::device::OperationKey;
use crate::ports::LinkId;

/// Status reported by the stack with each completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GattStatus {
    Success,
    /// Stack-specific failure code.
    Failure(i32),
}

impl GattStatus {
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// Numeric form: `0` for success, the stack code otherwise.
    pub const fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Failure(code) => code,
        }
    }
}

/// Link layer state carried by [`GattEvent::LinkStateChanged`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPhase {
    Linked,
    Unlinked,
}

/// One hardware completion, tagged with its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GattEvent {
    LinkStateChanged {
        link: LinkId,
        status: GattStatus,
        phase: LinkPhase,
    },
    DiscoveryComplete {
        link: LinkId,
        status: GattStatus,
    },
    AttrRead {
        link: LinkId,
        key: OperationKey,
        status: GattStatus,
        value: Vec<u8>,
    },
    AttrWrite {
        link: LinkId,
        key: OperationKey,
        status: GattStatus,
    },
    /// Notification or indication push.
    AttrChanged {
        link: LinkId,
        key: OperationKey,
        value: Vec<u8>,
    },
    DescriptorWrite {
        link: LinkId,
        key: OperationKey,
        status: GattStatus,
    },
    RssiRead {
        link: LinkId,
        status: GattStatus,
        rssi: i32,
    },
    UnitChanged {
        link: LinkId,
        status: GattStatus,
        mtu: u16,
    },
}

impl GattEvent {
    /// The link this event originated from.
    pub fn link(&self) -> LinkId {
        match self {
            Self::LinkStateChanged { link, .. }
            | Self::DiscoveryComplete { link, .. }
            | Self::AttrRead { link, .. }
            | Self::AttrWrite { link, .. }
            | Self::AttrChanged { link, .. }
            | Self::DescriptorWrite { link, .. }
            | Self::RssiRead { link, .. }
            | Self::UnitChanged { link, .. } => *link,
        }
    }

    /// Short name for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LinkStateChanged { .. } => "link-state",
            Self::DiscoveryComplete { .. } => "discovery",
            Self::AttrRead { .. } => "read",
            Self::AttrWrite { .. } => "write",
            Self::AttrChanged { .. } => "changed",
            Self::DescriptorWrite { .. } => "descriptor",
            Self::RssiRead { .. } => "rssi",
            Self::UnitChanged { .. } => "mtu",
        }
    }
}
