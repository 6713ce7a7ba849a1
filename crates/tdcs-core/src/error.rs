//! Error types for the tDCS analog bridge
//!
//! These errors work in `no_std` environments and carry enough context for
//! debugging without heap allocation. Bus errors are kept generic so the
//! driver can report whatever the concrete I2C implementation produced.

use core::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// ADS1115 Driver Errors
// ============================================================================

/// Errors from the ADS1115 ADC driver.
///
/// Argument errors ([`AdcError::NotInitialized`], [`AdcError::InvalidAddress`])
/// are raised before any bus traffic. [`AdcError::I2c`] means a transaction
/// was attempted and failed (timeout, NACK, arbitration loss).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdcError<E> {
    /// I2C transaction failure
    I2c(E),
    /// Conversion requested before `init()` succeeded
    NotInitialized,
    /// Configured address does not fit in 7 bits
    InvalidAddress {
        /// The configured address
        address: u8,
    },
}

impl<E> AdcError<E> {
    /// Whether the error came from a failed bus transaction.
    #[must_use]
    pub const fn is_bus_error(&self) -> bool {
        matches!(self, Self::I2c(_))
    }

    /// Whether the error was raised before touching the bus.
    #[must_use]
    pub const fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::NotInitialized | Self::InvalidAddress { .. })
    }
}

impl<E: fmt::Debug> fmt::Display for AdcError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I2c(e) => write!(f, "I2C communication error: {e:?}"),
            Self::NotInitialized => write!(f, "ADC not initialized"),
            Self::InvalidAddress { address } => {
                write!(f, "Invalid I2C address: 0x{address:02X} is not a 7-bit address")
            }
        }
    }
}

#[cfg(feature = "std")]
impl<E: std::error::Error + 'static> std::error::Error for AdcError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::I2c(e) => Some(e),
            Self::NotInitialized | Self::InvalidAddress { .. } => None,
        }
    }
}

#[cfg(feature = "defmt")]
impl<E: defmt::Format> defmt::Format for AdcError<E> {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::I2c(e) => defmt::write!(f, "I2C error: {}", e),
            Self::NotInitialized => defmt::write!(f, "ADC not initialized"),
            Self::InvalidAddress { address } => {
                defmt::write!(f, "Invalid address: 0x{:02X}", address);
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
