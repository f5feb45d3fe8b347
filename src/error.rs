//! Unified error type for every request the engine accepts.
//!
//! Every failure a caller can observe, whether it was detected locally
//! (precondition checks) or round-tripped through the radio, is one of the
//! [`GattError`] variants below.  All variants are `Copy` so they can be
//! moved into queued callbacks without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Capability
// ---------------------------------------------------------------------------

/// The attribute capability an operation needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Read,
    Write,
    /// Notify or indicate.
    Notify,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
            Self::Notify => write!(f, "notification or indication"),
        }
    }
}

// ---------------------------------------------------------------------------
// GattError
// ---------------------------------------------------------------------------

/// Terminal failure of a single request.  None of these are retried
/// internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GattError {
    /// The local radio is switched off.
    RadioOff,
    /// The application lacks the permission required to connect.
    PermissionDenied,
    /// The pool already holds the configured maximum of connected devices.
    MaxConnectionsReached,
    /// The transport refused to start a link attempt.
    ConnectionSetupFailed,
    /// The link was not established before the connect timeout fired.
    ConnectionTimeout,
    /// A pending connect was canceled by `disconnect()`.
    ConnectionCanceled,
    /// The device is not connected.
    ConnectionNotEstablished,
    /// The discovered attribute tree has no such service.
    ServiceNotFound,
    /// The service has no such characteristic.
    AttributeNotFound,
    /// The characteristic does not support the requested operation.
    CapabilityUnsupported(Capability),
    /// Payload does not fit in the negotiated transfer unit.
    PayloadTooLarge,
    /// The transport does not support the requested procedure.
    ApiUnsupported,
    /// A single-slot request (RSSI, MTU) is already outstanding.
    Busy,
    /// The transport rejected the request or reported a failure.
    Unknown,
}

impl GattError {
    /// Stable numeric code, suitable for crossing an FFI or RPC boundary.
    pub const fn code(self) -> u16 {
        match self {
            Self::Unknown => 0,
            Self::RadioOff => 1,
            Self::PermissionDenied => 2,
            Self::MaxConnectionsReached => 3,
            Self::ConnectionSetupFailed => 10,
            Self::ConnectionTimeout => 11,
            Self::ConnectionCanceled => 12,
            Self::ConnectionNotEstablished => 13,
            Self::ServiceNotFound => 20,
            Self::AttributeNotFound => 21,
            Self::CapabilityUnsupported(Capability::Read) => 22,
            Self::CapabilityUnsupported(Capability::Write) => 23,
            Self::CapabilityUnsupported(Capability::Notify) => 24,
            Self::PayloadTooLarge => 30,
            Self::ApiUnsupported => 31,
            Self::Busy => 32,
        }
    }

    /// Whether this error ended a connection attempt (as opposed to a
    /// single attribute operation).
    pub const fn is_connection_failure(self) -> bool {
        matches!(
            self,
            Self::RadioOff
                | Self::PermissionDenied
                | Self::MaxConnectionsReached
                | Self::ConnectionSetupFailed
                | Self::ConnectionTimeout
                | Self::ConnectionCanceled
        )
    }
}

impl fmt::Display for GattError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RadioOff => write!(f, "bluetooth is off"),
            Self::PermissionDenied => write!(f, "connect permission not granted"),
            Self::MaxConnectionsReached => write!(f, "maximum number of connections reached"),
            Self::ConnectionSetupFailed => write!(f, "transport could not start the connection"),
            Self::ConnectionTimeout => write!(f, "connection timed out"),
            Self::ConnectionCanceled => write!(f, "connection canceled"),
            Self::ConnectionNotEstablished => write!(f, "connection not established"),
            Self::ServiceNotFound => write!(f, "service not found"),
            Self::AttributeNotFound => write!(f, "characteristic not found in service"),
            Self::CapabilityUnsupported(cap) => write!(f, "{cap} unsupported by characteristic"),
            Self::PayloadTooLarge => write!(f, "data length greater than MTU"),
            Self::ApiUnsupported => write!(f, "operation not supported by transport"),
            Self::Busy => write!(f, "request already in progress"),
            Self::Unknown => write!(f, "unknown error"),
        }
    }
}

impl std::error::Error for GattError {}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, GattError>;
