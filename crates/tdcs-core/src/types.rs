//! Core types for the tDCS analog bridge
//!
//! This module provides the fundamental types shared by the firmware and the
//! host tools:
//! - ADS1115 programmable gain and data rate selectors
//! - Single-ended input channel identifiers
//! - Device configuration for the converter and the output stage
//! - The output state (level + enable flag) shared between tasks

use serde::{Deserialize, Serialize};

// ============================================================================
// Programmable Gain Amplifier
// ============================================================================

/// ADS1115 programmable gain setting, named by its full-scale range.
///
/// The discriminant is the PGA field of the config register (bits 11:9).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum Gain {
    /// ±6.144 V (gain 2/3)
    Fsr6_144 = 0x0000,
    /// ±4.096 V (gain 1, default)
    Fsr4_096 = 0x0200,
    /// ±2.048 V (gain 2)
    Fsr2_048 = 0x0400,
    /// ±1.024 V (gain 4)
    Fsr1_024 = 0x0600,
    /// ±0.512 V (gain 8)
    Fsr0_512 = 0x0800,
    /// ±0.256 V (gain 16)
    Fsr0_256 = 0x0A00,
}

impl Gain {
    /// Range used when the configured bits are not one of the six known values
    pub const DEFAULT: Self = Self::Fsr4_096;

    /// All gain settings, widest range first
    pub const ALL: [Self; 6] = [
        Self::Fsr6_144,
        Self::Fsr4_096,
        Self::Fsr2_048,
        Self::Fsr1_024,
        Self::Fsr0_512,
        Self::Fsr0_256,
    ];

    /// Config register bits for this gain
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u16 {
        self as u16
    }

    /// Exact decode of config register bits.
    #[must_use]
    pub const fn from_bits(bits: u16) -> Option<Self> {
        match bits {
            0x0000 => Some(Self::Fsr6_144),
            0x0200 => Some(Self::Fsr4_096),
            0x0400 => Some(Self::Fsr2_048),
            0x0600 => Some(Self::Fsr1_024),
            0x0800 => Some(Self::Fsr0_512),
            0x0A00 => Some(Self::Fsr0_256),
            _ => None,
        }
    }

    /// Decode config register bits, falling back to [`Gain::DEFAULT`].
    #[must_use]
    pub const fn from_bits_or_default(bits: u16) -> Self {
        match Self::from_bits(bits) {
            Some(gain) => gain,
            None => Self::DEFAULT,
        }
    }

    /// Look up a gain by its full-scale range in millivolts (e.g. 4096).
    #[must_use]
    pub const fn from_full_scale_mv(mv: u16) -> Option<Self> {
        match mv {
            6144 => Some(Self::Fsr6_144),
            4096 => Some(Self::Fsr4_096),
            2048 => Some(Self::Fsr2_048),
            1024 => Some(Self::Fsr1_024),
            512 => Some(Self::Fsr0_512),
            256 => Some(Self::Fsr0_256),
            _ => None,
        }
    }

    /// Full-scale range in millivolts
    #[must_use]
    pub const fn full_scale_mv(self) -> u16 {
        match self {
            Self::Fsr6_144 => 6144,
            Self::Fsr4_096 => 4096,
            Self::Fsr2_048 => 2048,
            Self::Fsr1_024 => 1024,
            Self::Fsr0_512 => 512,
            Self::Fsr0_256 => 256,
        }
    }

    /// Size of one least-significant bit in millivolts.
    #[must_use]
    pub const fn lsb_mv(self) -> f32 {
        match self {
            Self::Fsr6_144 => 0.1875,
            Self::Fsr4_096 => 0.125,
            Self::Fsr2_048 => 0.0625,
            Self::Fsr1_024 => 0.031_25,
            Self::Fsr0_512 => 0.015_625,
            Self::Fsr0_256 => 0.007_812_5,
        }
    }
}

impl Default for Gain {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Gain {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "+-{}mV", self.full_scale_mv());
    }
}

// ============================================================================
// Data Rate
// ============================================================================

/// ADS1115 data rate setting.
///
/// The discriminant is the DR field of the config register (bits 7:5).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u16)]
pub enum DataRate {
    /// 8 samples per second
    Sps8 = 0x0000,
    /// 16 samples per second
    Sps16 = 0x0020,
    /// 32 samples per second
    Sps32 = 0x0040,
    /// 64 samples per second
    Sps64 = 0x0060,
    /// 128 samples per second (default)
    Sps128 = 0x0080,
    /// 250 samples per second
    Sps250 = 0x00A0,
    /// 475 samples per second
    Sps475 = 0x00C0,
    /// 860 samples per second
    Sps860 = 0x00E0,
}

impl DataRate {
    /// Rate used when the configured bits are not one of the eight known values
    pub const DEFAULT: Self = Self::Sps128;

    /// All data rates, slowest first
    pub const ALL: [Self; 8] = [
        Self::Sps8,
        Self::Sps16,
        Self::Sps32,
        Self::Sps64,
        Self::Sps128,
        Self::Sps250,
        Self::Sps475,
        Self::Sps860,
    ];

    /// Config register bits for this rate
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u16 {
        self as u16
    }

    /// Exact decode of config register bits.
    #[must_use]
    pub const fn from_bits(bits: u16) -> Option<Self> {
        match bits {
            0x0000 => Some(Self::Sps8),
            0x0020 => Some(Self::Sps16),
            0x0040 => Some(Self::Sps32),
            0x0060 => Some(Self::Sps64),
            0x0080 => Some(Self::Sps128),
            0x00A0 => Some(Self::Sps250),
            0x00C0 => Some(Self::Sps475),
            0x00E0 => Some(Self::Sps860),
            _ => None,
        }
    }

    /// Decode config register bits, falling back to [`DataRate::DEFAULT`].
    #[must_use]
    pub const fn from_bits_or_default(bits: u16) -> Self {
        match Self::from_bits(bits) {
            Some(rate) => rate,
            None => Self::DEFAULT,
        }
    }

    /// Look up a rate by its nominal samples per second.
    #[must_use]
    pub const fn from_hz(hz: u16) -> Option<Self> {
        match hz {
            8 => Some(Self::Sps8),
            16 => Some(Self::Sps16),
            32 => Some(Self::Sps32),
            64 => Some(Self::Sps64),
            128 => Some(Self::Sps128),
            250 => Some(Self::Sps250),
            475 => Some(Self::Sps475),
            860 => Some(Self::Sps860),
            _ => None,
        }
    }

    /// Nominal samples per second
    #[must_use]
    pub const fn hz(self) -> u16 {
        match self {
            Self::Sps8 => 8,
            Self::Sps16 => 16,
            Self::Sps32 => 32,
            Self::Sps64 => 64,
            Self::Sps128 => 128,
            Self::Sps250 => 250,
            Self::Sps475 => 475,
            Self::Sps860 => 860,
        }
    }

    /// Time to wait between starting a single-shot conversion and reading it.
    ///
    /// The nominal conversion period plus margin for bus latency and the
    /// converter's internal oscillator tolerance.
    #[must_use]
    pub const fn conversion_delay_ms(self) -> u32 {
        match self {
            Self::Sps8 => 130,
            Self::Sps16 => 70,
            Self::Sps32 => 35,
            Self::Sps64 => 20,
            Self::Sps128 => 10,
            Self::Sps250 => 5,
            Self::Sps475 => 3,
            Self::Sps860 => 2,
        }
    }
}

impl Default for DataRate {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for DataRate {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{}SPS", self.hz());
    }
}

// ============================================================================
// Input Channels
// ============================================================================

/// Single-ended input channel (AINx against GND).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Channel {
    /// AIN0
    A0 = 0,
    /// AIN1
    A1 = 1,
    /// AIN2
    A2 = 2,
    /// AIN3
    A3 = 3,
}

impl Channel {
    /// Number of input channels
    pub const COUNT: usize = 4;

    /// All channels in acquisition order
    pub const ALL: [Self; Self::COUNT] = [Self::A0, Self::A1, Self::A2, Self::A3];

    /// Create from index (0-3)
    #[must_use]
    pub const fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::A0),
            1 => Some(Self::A1),
            2 => Some(Self::A2),
            3 => Some(Self::A3),
            _ => None,
        }
    }

    /// Get channel index (0-3)
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Multiplexer bits (config register bits 14:12) for single-ended input
    #[must_use]
    pub const fn mux_bits(self) -> u16 {
        match self {
            Self::A0 => 0x4000,
            Self::A1 => 0x5000,
            Self::A2 => 0x6000,
            Self::A3 => 0x7000,
        }
    }

    /// Get channel name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::A0 => "A0",
            Self::A1 => "A1",
            Self::A2 => "A2",
            Self::A3 => "A3",
        }
    }
}

impl core::fmt::Display for Channel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Channel {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{}", self.name());
    }
}

// ============================================================================
// Device Configuration
// ============================================================================

/// I2C address with ADDR strapped to GND
pub const ADDR_GND: u8 = 0x48;
/// I2C address with ADDR strapped to VDD
pub const ADDR_VDD: u8 = 0x49;
/// I2C address with ADDR strapped to SDA
pub const ADDR_SDA: u8 = 0x4A;
/// I2C address with ADDR strapped to SCL
pub const ADDR_SCL: u8 = 0x4B;

/// I2C clock the converter is attached with
pub const I2C_FREQUENCY_HZ: u32 = 100_000;

/// Per-transaction timeout the bus layer is expected to enforce
pub const I2C_TIMEOUT_MS: u32 = 1000;

/// ADS1115 configuration, fixed after the driver is initialized.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdcConfig {
    /// 7-bit I2C address
    pub address: u8,
    /// Programmable gain
    pub gain: Gain,
    /// Data rate
    pub data_rate: DataRate,
}

impl AdcConfig {
    /// Create a configuration
    #[must_use]
    pub const fn new(address: u8, gain: Gain, data_rate: DataRate) -> Self {
        Self { address, gain, data_rate }
    }

    /// Build a configuration from raw config register fields.
    ///
    /// Unknown gain or rate bits fall back to their defaults.
    #[must_use]
    pub const fn from_register_bits(address: u8, gain_bits: u16, rate_bits: u16) -> Self {
        Self {
            address,
            gain: Gain::from_bits_or_default(gain_bits),
            data_rate: DataRate::from_bits_or_default(rate_bits),
        }
    }

    /// Check that the address fits in 7 bits
    #[must_use]
    pub const fn has_valid_address(&self) -> bool {
        self.address <= 0x7F
    }
}

impl Default for AdcConfig {
    /// ±4.096 V at 64 SPS on the GND-strapped address.
    fn default() -> Self {
        Self::new(ADDR_GND, Gain::Fsr4_096, DataRate::Sps64)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for AdcConfig {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "ADS1115@0x{:02X} {} {}", self.address, self.gain, self.data_rate);
    }
}

// ============================================================================
// Output Stage
// ============================================================================

/// Output stage configuration.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Code written while the output is disabled.
    ///
    /// The current source is inverting: code 0 drives maximum current and
    /// code 255 drives (nearly) none, so the safe code is the maximum.
    pub safe_level: u8,
    /// Period of the output application task in milliseconds
    pub period_ms: u32,
}

impl OutputConfig {
    /// Safe code for the inverting current source
    pub const SAFE_LEVEL: u8 = u8::MAX;

    /// Output application period
    pub const PERIOD_MS: u32 = 500;
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            safe_level: Self::SAFE_LEVEL,
            period_ms: Self::PERIOD_MS,
        }
    }
}

/// Output level and enable flag, as set by the control link.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputState {
    /// Requested output code (0-255)
    pub level: u8,
    /// Whether the requested code is applied
    pub enabled: bool,
}

impl OutputState {
    /// Code the output stage should be driven with.
    #[must_use]
    pub const fn effective_level(&self, safe_level: u8) -> u8 {
        if self.enabled {
            self.level
        } else {
            safe_level
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for OutputState {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "level={} enabled={}", self.level, self.enabled);
    }
}

// ============================================================================
// Tests
// ============================================================================
