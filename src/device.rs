//! Device handles and the discovered attribute tree.
//!
//! | Type                 | Role                                            |
//! |----------------------|-------------------------------------------------|
//! | [`Device`]           | Identity + link flags of one peripheral         |
//! | [`OperationKey`]     | (service, characteristic) correlation key       |
//! | [`GattService`]      | One discovered service                          |
//! | [`GattCharacteristic`]| One characteristic and its property bits      |
//!
//! Device handles are only minted inside the crate (by the pool), so every
//! `Device` a caller sees is the one the pool tracks for that address.

use core::fmt;
use core::ops::BitOr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use uuid::Uuid;

use crate::lock;

/// GAP limit on the length of a device name.
pub const MAX_NAME_LEN: usize = 248;

// ───────────────────────────────────────────────────────────────
// Operation key
// ───────────────────────────────────────────────────────────────

/// Correlates a pending request with its completion event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationKey {
    pub service: Uuid,
    pub attribute: Uuid,
}

impl OperationKey {
    pub const fn new(service: Uuid, attribute: Uuid) -> Self {
        Self { service, attribute }
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.service, self.attribute)
    }
}

// ───────────────────────────────────────────────────────────────
// Device
// ───────────────────────────────────────────────────────────────

/// A remote peripheral, keyed by its stable address.
///
/// The `connected` / `connecting` flags are lock-free snapshots of the
/// owning connection's state and may lag it briefly.
#[derive(Debug)]
pub struct Device {
    address: String,
    name: Mutex<heapless::String<MAX_NAME_LEN>>,
    connected: AtomicBool,
    connecting: AtomicBool,
}

impl Device {
    pub(crate) fn new(address: &str) -> Self {
        Self {
            address: address.to_owned(),
            name: Mutex::new(heapless::String::new()),
            connected: AtomicBool::new(false),
            connecting: AtomicBool::new(false),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn name(&self) -> String {
        lock(&self.name).as_str().to_owned()
    }

    /// Replace the display name, truncating on a character boundary to
    /// [`MAX_NAME_LEN`] bytes.
    pub fn set_name(&self, name: &str) {
        let mut bounded = heapless::String::new();
        for ch in name.chars() {
            if bounded.push(ch).is_err() {
                break;
            }
        }
        *lock(&self.name) = bounded;
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn is_connecting(&self) -> bool {
        self.connecting.load(Ordering::Acquire)
    }

    pub(crate) fn set_flags(&self, connecting: bool, connected: bool) {
        self.connecting.store(connecting, Ordering::Release);
        self.connected.store(connected, Ordering::Release);
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = lock(&self.name);
        if name.is_empty() {
            write!(f, "{}", self.address)
        } else {
            write!(f, "{} ({})", name, self.address)
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Attribute tree
// ───────────────────────────────────────────────────────────────

/// Characteristic property bits, as carried in the characteristic
/// declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct CharProperties(u8);

impl CharProperties {
    pub const BROADCAST: Self = Self(0x01);
    pub const READ: Self = Self(0x02);
    pub const WRITE_WITHOUT_RESPONSE: Self = Self(0x04);
    pub const WRITE: Self = Self(0x08);
    pub const NOTIFY: Self = Self(0x10);
    pub const INDICATE: Self = Self(0x20);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn can_read(self) -> bool {
        self.contains(Self::READ)
    }

    /// Write with or without response.
    pub const fn can_write(self) -> bool {
        self.0 & (Self::WRITE.0 | Self::WRITE_WITHOUT_RESPONSE.0) != 0
    }

    /// Notify or indicate.
    pub const fn can_notify(self) -> bool {
        self.0 & (Self::NOTIFY.0 | Self::INDICATE.0) != 0
    }
}

impl BitOr for CharProperties {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattCharacteristic {
    pub uuid: Uuid,
    pub properties: CharProperties,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattService {
    pub uuid: Uuid,
    pub characteristics: Vec<GattCharacteristic>,
}

impl GattService {
    pub fn characteristic(&self, uuid: Uuid) -> Option<&GattCharacteristic> {
        self.characteristics.iter().find(|c| c.uuid == uuid)
    }
}
