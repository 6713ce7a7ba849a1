//! Wire format of the BLE control link
//!
//! The device exposes one primary service with one characteristic:
//!
//! ```text
//! Control Service (0x00FF)
//! └── Control Characteristic (0xFF01) [Read, Write], max 64 bytes
//!     ├── Read  → 8 bytes: A0..A3 raw samples, big-endian i16 each
//!     └── Write ← 1 byte:  254 enable, 253 disable, else output level
//! ```
//!
//! Read responses carry raw converter counts, not volts; the host scales them
//! with the configured gain.

use serde::{Deserialize, Serialize};

use crate::types::Channel;

// ============================================================================
// GATT Identifiers
// ============================================================================

/// Control service UUID (16-bit)
pub const CONTROL_SERVICE_UUID: u16 = 0x00FF;

/// Control characteristic UUID (16-bit)
pub const CONTROL_CHAR_UUID: u16 = 0xFF01;

/// Attribute handles reserved for the control service
pub const CONTROL_SERVICE_NUM_HANDLES: u16 = 4;

/// Maximum value length of the control characteristic
pub const CONTROL_CHAR_MAX_LEN: usize = 64;

/// Initial value of the control characteristic before the first read
pub const CONTROL_CHAR_INITIAL_VALUE: [u8; 3] = [0x11, 0x22, 0x33];

/// Advertised device name
pub const DEVICE_NAME: &str = "tDCS";

/// Local ATT MTU requested from the stack
pub const LOCAL_MTU: u16 = 500;

/// Characteristic property and permission bits
pub mod char_flags {
    /// Property: readable
    pub const PROP_READ: u8 = 1 << 1;
    /// Property: writable with response
    pub const PROP_WRITE: u8 = 1 << 3;
    /// Permission: read allowed
    pub const PERM_READ: u16 = 1 << 0;
    /// Permission: write allowed
    pub const PERM_WRITE: u16 = 1 << 4;
}

// ============================================================================
// Read Response
// ============================================================================

/// Size of the read response in bytes
pub const READ_RESPONSE_SIZE: usize = 2 * Channel::COUNT;

/// Raw samples of all four channels, as returned by a characteristic read.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadResponse {
    /// Raw samples in channel order (A0..A3); failed channels read 0
    pub samples: [i16; Channel::COUNT],
}

impl ReadResponse {
    /// Packet size in bytes
    pub const SIZE: usize = READ_RESPONSE_SIZE;

    /// Create from samples in channel order
    #[must_use]
    pub const fn new(samples: [i16; Channel::COUNT]) -> Self {
        Self { samples }
    }

    /// Raw sample for one channel
    #[must_use]
    pub const fn sample(&self, channel: Channel) -> i16 {
        self.samples[channel.index()]
    }

    /// Serialize to bytes
    #[must_use]
    pub fn to_bytes(&self) -> [u8; READ_RESPONSE_SIZE] {
        let mut buf = [0u8; READ_RESPONSE_SIZE];
        for (i, sample) in self.samples.iter().enumerate() {
            buf[i * 2..i * 2 + 2].copy_from_slice(&sample.to_be_bytes());
        }
        buf
    }

    /// Deserialize from bytes
    #[must_use]
    pub fn from_bytes(buf: &[u8; READ_RESPONSE_SIZE]) -> Self {
        let mut samples = [0i16; Channel::COUNT];
        for (i, sample) in samples.iter_mut().enumerate() {
            *sample = i16::from_be_bytes([buf[i * 2], buf[i * 2 + 1]]);
        }
        Self { samples }
    }

    /// Deserialize from a characteristic value of any length.
    ///
    /// Returns `None` unless the value is exactly [`READ_RESPONSE_SIZE`] bytes.
    #[must_use]
    pub fn from_slice(value: &[u8]) -> Option<Self> {
        let buf: &[u8; READ_RESPONSE_SIZE] = value.try_into().ok()?;
        Some(Self::from_bytes(buf))
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ReadResponse {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "A0={} A1={} A2={} A3={}",
            self.samples[0],
            self.samples[1],
            self.samples[2],
            self.samples[3]
        );
    }
}

// ============================================================================
// Write Commands
// ============================================================================

/// Command byte that enables the output
pub const CMD_ENABLE: u8 = 254;

/// Command byte that disables the output
pub const CMD_DISABLE: u8 = 253;

/// Decoded control write.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlCommand {
    /// Apply the stored level to the output
    Enable,
    /// Drive the output with the safe level
    Disable,
    /// Store a new output level; the enable flag is untouched
    SetLevel(u8),
}

impl ControlCommand {
    /// Decode a command byte.
    ///
    /// Every byte is a valid command: the two sentinels toggle the output,
    /// anything else is a level. Levels 253 and 254 therefore cannot be set.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        match byte {
            CMD_ENABLE => Self::Enable,
            CMD_DISABLE => Self::Disable,
            level => Self::SetLevel(level),
        }
    }

    /// Decode a characteristic write payload.
    ///
    /// Returns `None` unless the payload is exactly one byte.
    #[must_use]
    pub const fn from_payload(payload: &[u8]) -> Option<Self> {
        match payload {
            [byte] => Some(Self::from_byte(*byte)),
            _ => None,
        }
    }

    /// Encode as the byte a host writes
    #[must_use]
    pub const fn to_byte(self) -> u8 {
        match self {
            Self::Enable => CMD_ENABLE,
            Self::Disable => CMD_DISABLE,
            Self::SetLevel(level) => level,
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ControlCommand {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Enable => defmt::write!(f, "Enable"),
            Self::Disable => defmt::write!(f, "Disable"),
            Self::SetLevel(level) => defmt::write!(f, "SetLevel({})", level),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
