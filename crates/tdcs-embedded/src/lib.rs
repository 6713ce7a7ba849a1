//! tDCS Embedded - ESP32 drivers and BLE control session
//!
//! This crate provides the device side of the tDCS analog bridge:
//! - ADS1115 ADC driver (I2C)
//! - Stimulation output stage and its periodic applier (DAC or PWM)
//! - BLE GATT control session (read samples, write output commands)
//!
//! Everything is written against `embedded-hal` traits and a small
//! [`ble::LinkStack`] trait, so the same code runs on the ESP32 and in the
//! host bench simulator.
//!
//! # Hardware Requirements
//!
//! - ESP32-WROOM (BLE + 8-bit DAC)
//! - TI ADS1115 on the GND address strap
//! - Inverting voltage-controlled current source on the DAC output
//!
//! # GPIO Assignments
//!
//! ```text
//! I2C (ADS1115): SDA=21, SCL=22, 100 kHz, internal pull-ups
//! DAC (output):  GPIO 25 (DAC channel 0)
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod ble;
pub mod drivers;

#[cfg(test)]
mod testing;

// Re-export driver types
pub use drivers::ads1115::{raw_to_voltage, Ads1115, ConversionWait, FixedDelay, PollReady};
pub use drivers::output::{OutputApplier, OutputStage, PwmOutput, SharedOutput};

// Re-export BLE session types
pub use ble::{
    AdvertisingConfig, ControlSession, GapEvent, GattEvent, GattResponse, LinkStack, SampleSource,
    SessionState,
};
