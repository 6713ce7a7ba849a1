//! Hardware drivers for the analog bridge
//!
//! This module contains drivers for the two analog peripherals:
//! - [`ads1115`]: TI ADS1115 16-bit 4-channel ADC (I2C)
//! - [`output`]: 8-bit output stage driving the inverting current source

pub mod ads1115;
pub mod output;
