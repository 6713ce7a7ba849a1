//! tDCS Core - `no_std` compatible types and wire protocol
//!
//! This crate provides the shared vocabulary of the tDCS analog bridge: the
//! ADS1115 conversion settings, the output configuration, the error types of
//! the drivers, and the byte layout of the BLE control characteristic. It is
//! designed to work in `no_std` environments (the ESP32 firmware) as well as
//! `std` environments (the host bench simulator).
//!
//! # Modules
//!
//! - [`types`]: Gain, data rate, input channel and device configuration
//! - [`error`]: Error types for the ADC driver
//! - [`protocol`]: GATT identifiers, read response layout, write commands
//!
//! # Features
//!
//! - `std`: Enable standard library support
//! - `defmt`: Enable `defmt` formatting for embedded logging
//!
//! # Example
//!
//! ```rust
//! use tdcs_core::protocol::{ControlCommand, ReadResponse};
//!
//! let response = ReadResponse::new([100, -50, 0, 32767]);
//! assert_eq!(response.to_bytes(), [0x00, 0x64, 0xFF, 0xCE, 0x00, 0x00, 0x7F, 0xFF]);
//!
//! assert_eq!(ControlCommand::from_byte(254), ControlCommand::Enable);
//! assert_eq!(ControlCommand::from_byte(16), ControlCommand::SetLevel(16));
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

#[cfg(feature = "std")]
extern crate std;

pub mod error;
pub mod protocol;
pub mod types;

// Re-export commonly used types at crate root
pub use error::AdcError;
pub use protocol::{ControlCommand, ReadResponse, CONTROL_CHAR_UUID, CONTROL_SERVICE_UUID};
pub use types::{AdcConfig, Channel, DataRate, Gain, OutputConfig, OutputState};
