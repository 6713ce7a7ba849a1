//! ADS1115 ADC Driver
//!
//! Driver for the Texas Instruments ADS1115, a 16-bit, 4-channel delta-sigma
//! ADC with a programmable gain amplifier, attached over I2C.
//!
//! # Conversion protocol
//!
//! Every reading is a single-shot conversion:
//!
//! ```text
//! Idle ─► write CONFIG (OS=1, MUX, PGA, DR, comparator off)
//!      ─► read CONFIG back (best effort, mismatch is only logged)
//!      ─► wait for the conversion (see [`ConversionWait`])
//!      ─► read CONVERSION ─► Idle
//! ```
//!
//! Any failed bus transaction aborts the reading. Nothing is retried here;
//! callers decide what a failed channel means.
//!
//! # Example
//!
//! ```ignore
//! let mut adc = Ads1115::with_delay(i2c, AdcConfig::default(), delay);
//! adc.init()?;
//!
//! let raw = adc.read_channel(Channel::A0)?;
//! let mv = adc.read_voltage(Channel::A1)?;
//! ```

use core::fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use tracing::{debug, info, warn};

use tdcs_core::error::AdcError;
use tdcs_core::types::{AdcConfig, Channel, DataRate, Gain};

/// ADS1115 register addresses
pub mod regs {
    /// Conversion result (read-only)
    pub const CONVERSION: u8 = 0x00;
    /// Configuration
    pub const CONFIG: u8 = 0x01;
    /// Comparator low threshold
    pub const LO_THRESH: u8 = 0x02;
    /// Comparator high threshold
    pub const HI_THRESH: u8 = 0x03;
}

/// Config register fields not covered by [`Gain`], [`DataRate`] and [`Channel`]
pub mod config_bits {
    /// Write: start a single conversion
    pub const OS_SINGLE: u16 = 0x8000;
    /// Read: conversion in progress
    pub const OS_BUSY: u16 = 0x0000;
    /// Read: device idle
    pub const OS_NOT_BUSY: u16 = 0x8000;

    /// Differential AIN0 - AIN1
    pub const MUX_DIFF_0_1: u16 = 0x0000;
    /// Differential AIN0 - AIN3
    pub const MUX_DIFF_0_3: u16 = 0x1000;
    /// Differential AIN1 - AIN3
    pub const MUX_DIFF_1_3: u16 = 0x2000;
    /// Differential AIN2 - AIN3
    pub const MUX_DIFF_2_3: u16 = 0x3000;

    /// Traditional comparator with hysteresis
    pub const CMODE_TRAD: u16 = 0x0000;
    /// Window comparator
    pub const CMODE_WINDOW: u16 = 0x0010;
    /// ALERT/RDY active low
    pub const CPOL_ACTVLOW: u16 = 0x0000;
    /// ALERT/RDY active high
    pub const CPOL_ACTVHI: u16 = 0x0008;
    /// Non-latching comparator
    pub const CLAT_NONLAT: u16 = 0x0000;
    /// Latching comparator
    pub const CLAT_LATCH: u16 = 0x0004;
    /// Assert ALERT/RDY after one conversion
    pub const CQUE_1CONV: u16 = 0x0000;
    /// Assert ALERT/RDY after two conversions
    pub const CQUE_2CONV: u16 = 0x0001;
    /// Assert ALERT/RDY after four conversions
    pub const CQUE_4CONV: u16 = 0x0002;
    /// Comparator disabled, ALERT/RDY high
    pub const CQUE_NONE: u16 = 0x0003;

    /// Comparator fields used for every single-shot conversion
    pub const COMPARATOR_OFF: u16 = CMODE_TRAD | CPOL_ACTVLOW | CLAT_NONLAT | CQUE_NONE;
}

/// Build the config word that starts a single-shot conversion on `channel`.
#[must_use]
pub const fn config_word(channel: Channel, config: &AdcConfig) -> u16 {
    config_bits::OS_SINGLE
        | channel.mux_bits()
        | config.gain.bits()
        | config_bits::COMPARATOR_OFF
        | config.data_rate.bits()
}

/// Convert a raw sample to millivolts for the given gain.
#[must_use]
pub fn raw_to_voltage(raw: i16, gain: Gain) -> f32 {
    f32::from(raw) * gain.lsb_mv()
}

fn write_register<I2C: I2c>(i2c: &mut I2C, address: u8, reg: u8, value: u16) -> Result<(), I2C::Error> {
    let [msb, lsb] = value.to_be_bytes();
    i2c.write(address, &[reg, msb, lsb])
}

fn read_register<I2C: I2c>(i2c: &mut I2C, address: u8, reg: u8) -> Result<u16, I2C::Error> {
    let mut buffer = [0u8; 2];
    i2c.write_read(address, &[reg], &mut buffer)?;
    Ok(u16::from_be_bytes(buffer))
}

// ============================================================================
// Conversion Wait Strategies
// ============================================================================

/// How the driver waits between starting a conversion and reading it.
///
/// Implementations must return within [`DataRate::conversion_delay_ms`] of
/// being called, counting any bus traffic of their own.
pub trait ConversionWait {
    /// Block until the conversion started on `address` should be complete.
    fn wait<I2C: I2c>(&mut self, i2c: &mut I2C, address: u8, rate: DataRate);
}

/// Sleep for the fixed per-rate delay and never touch the bus.
pub struct FixedDelay<D> {
    delay: D,
}

impl<D: DelayNs> FixedDelay<D> {
    /// Create a fixed-delay strategy
    #[must_use]
    pub fn new(delay: D) -> Self {
        Self { delay }
    }
}

impl<D: DelayNs> ConversionWait for FixedDelay<D> {
    fn wait<I2C: I2c>(&mut self, _i2c: &mut I2C, _address: u8, rate: DataRate) {
        let delay_ms = rate.conversion_delay_ms();
        debug!("Waiting {} ms for conversion to complete", delay_ms);
        self.delay.delay_ms(delay_ms);
    }
}

/// Sleep the nominal conversion period, then poll the OS bit of the config
/// register until the fixed per-rate budget is spent.
///
/// Each poll is charged [`PollReady::POLL_BUS_TIME_US`] against the budget,
/// so sleeps plus polls never exceed [`DataRate::conversion_delay_ms`].
/// Returns as soon as the device reports idle. If the budget runs out, or a
/// poll fails on the bus, the caller reads the conversion register anyway and
/// sees whatever the bus reports then.
pub struct PollReady<D> {
    delay: D,
}

impl<D: DelayNs> PollReady<D> {
    /// Sleep between polls
    pub const POLL_INTERVAL_US: u32 = 1_000;

    /// Worst-case bus time of one poll: a 1-byte write plus a 2-byte read
    /// with repeated start at 100 kHz is 45 bit times (450 us)
    pub const POLL_BUS_TIME_US: u32 = 500;

    /// Create a polling strategy
    #[must_use]
    pub fn new(delay: D) -> Self {
        Self { delay }
    }
}

/// Nominal conversion period, rounded up to whole microseconds
fn nominal_period_us(rate: DataRate) -> u32 {
    let hz = u32::from(rate.hz());
    (1_000_000 + hz - 1) / hz
}

impl<D: DelayNs> ConversionWait for PollReady<D> {
    fn wait<I2C: I2c>(&mut self, i2c: &mut I2C, address: u8, rate: DataRate) {
        let budget_us = rate.conversion_delay_ms() * 1_000;
        let mut spent_us = nominal_period_us(rate).min(budget_us);
        self.delay.delay_us(spent_us);

        while spent_us + Self::POLL_BUS_TIME_US <= budget_us {
            let polled = read_register(i2c, address, regs::CONFIG);
            spent_us += Self::POLL_BUS_TIME_US;

            match polled {
                Ok(config) if config & config_bits::OS_NOT_BUSY != 0 => {
                    debug!("Conversion ready after {} us", spent_us);
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Ready poll failed ({:?}), sleeping out the budget", e);
                    break;
                }
            }

            let pause_us = Self::POLL_INTERVAL_US.min(budget_us - spent_us);
            self.delay.delay_us(pause_us);
            spent_us += pause_us;
        }

        if spent_us < budget_us {
            self.delay.delay_us(budget_us - spent_us);
        }
        debug!("Conversion not flagged ready within {} ms", rate.conversion_delay_ms());
    }
}

// ============================================================================
// Driver
// ============================================================================

/// ADS1115 driver
pub struct Ads1115<I2C, W> {
    i2c: I2C,
    config: AdcConfig,
    wait: W,
    initialized: bool,
}

impl<I2C, D> Ads1115<I2C, FixedDelay<D>>
where
    I2C: I2c,
    D: DelayNs,
{
    /// Create a driver that waits a fixed per-rate delay for each conversion
    #[must_use]
    pub fn with_delay(i2c: I2C, config: AdcConfig, delay: D) -> Self {
        Self::new(i2c, config, FixedDelay::new(delay))
    }
}

impl<I2C, W, E> Ads1115<I2C, W>
where
    I2C: I2c<Error = E>,
    W: ConversionWait,
    E: fmt::Debug,
{
    /// Create a new ADS1115 driver. Call [`Ads1115::init`] before reading.
    #[must_use]
    pub fn new(i2c: I2C, config: AdcConfig, wait: W) -> Self {
        Self {
            i2c,
            config,
            wait,
            initialized: false,
        }
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &AdcConfig {
        &self.config
    }

    /// Whether [`Ads1115::init`] has succeeded
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Initialize the ADS1115
    ///
    /// Validates the address and checks the device answers by reading its config
    /// register once.
    pub fn init(&mut self) -> Result<(), AdcError<E>> {
        if !self.config.has_valid_address() {
            return Err(AdcError::InvalidAddress { address: self.config.address });
        }

        let config = read_register(&mut self.i2c, self.config.address, regs::CONFIG)
            .map_err(AdcError::I2c)?;
        debug!("Power-on config: {:#06X}", config);

        self.initialized = true;
        info!("ADS1115 initialized with address {:#04X}", self.config.address);
        Ok(())
    }

    /// Run one single-shot conversion and return the raw sample.
    pub fn read_channel(&mut self, channel: Channel) -> Result<i16, AdcError<E>> {
        if !self.initialized {
            return Err(AdcError::NotInitialized);
        }

        let address = self.config.address;
        let config = config_word(channel, &self.config);
        debug!(
            "Starting conversion on {} with config: {:#06X} (gain={:#06X}, rate={:#06X})",
            channel,
            config,
            self.config.gain.bits(),
            self.config.data_rate.bits()
        );

        if let Err(e) = write_register(&mut self.i2c, address, regs::CONFIG, config) {
            warn!("Failed to write config register: {:?}", e);
            return Err(AdcError::I2c(e));
        }

        // OS reads back as "busy" while the conversion runs, so it is masked
        match read_register(&mut self.i2c, address, regs::CONFIG) {
            Ok(readback) => {
                debug!("Config readback: {:#06X} (expected: {:#06X})", readback, config);
                if readback & !config_bits::OS_NOT_BUSY != config & !config_bits::OS_NOT_BUSY {
                    warn!(
                        "Config readback mismatch on {}: wrote {:#06X}, read {:#06X}",
                        channel, config, readback
                    );
                }
            }
            Err(e) => warn!("Config readback failed on {}: {:?}", channel, e),
        }

        self.wait.wait(&mut self.i2c, address, self.config.data_rate);

        let conversion = match read_register(&mut self.i2c, address, regs::CONVERSION) {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to read conversion register: {:?}", e);
                return Err(AdcError::I2c(e));
            }
        };

        let raw = i16::from_be_bytes(conversion.to_be_bytes());
        debug!("Conversion successful on {}: raw={:#06X} ({})", channel, conversion, raw);
        Ok(raw)
    }

    /// Run one conversion and scale it to millivolts.
    pub fn read_voltage(&mut self, channel: Channel) -> Result<f32, AdcError<E>> {
        let raw = self.read_channel(channel)?;
        Ok(raw_to_voltage(raw, self.config.gain))
    }

    /// Convert all four channels in order (A0..A3).
    pub fn read_all(&mut self) -> [Result<i16, AdcError<E>>; Channel::COUNT] {
        Channel::ALL.map(|channel| self.read_channel(channel))
    }

    /// Release the bus
    pub fn release(self) -> I2C {
        self.i2c
    }
}

// ============================================================================
// Tests
// ============================================================================
