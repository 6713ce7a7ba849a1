//! Simulated hardware for the bench run
//!
//! Stand-ins for the three things the firmware talks to: the ADS1115 on the
//! I2C bus, the 8-bit DAC, and the BLE stack.

use std::convert::Infallible;
use std::time::{Duration, Instant};

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{self, ErrorKind, NoAcknowledgeSource, Operation};
use thiserror::Error;
use tracing::{debug, info};

use tdcs_core::types::{Channel, DataRate};
use tdcs_embedded::ble::{
    AdvertisingData, AdvertisingParams, CharacteristicDefinition, GattResponse, LinkStack,
    ServiceDefinition,
};
use tdcs_embedded::OutputStage;

const REG_CONVERSION: u8 = 0x00;
const REG_CONFIG: u8 = 0x01;
const OS_BIT: u16 = 0x8000;
const POWER_ON_CONFIG: u16 = 0x8583;

/// Errors raised by the simulated bus
#[derive(Debug, Error)]
pub enum SimError {
    /// Transaction addressed to a device that is not there
    #[error("no device at address {0:#04X}")]
    NoDevice(u8),
    /// Conversion read on a channel configured to fail
    #[error("injected NACK reading {0}")]
    InjectedNack(Channel),
    /// Register outside the modelled set
    #[error("register {0:#04X} not modelled")]
    UnknownRegister(u8),
}

impl i2c::Error for SimError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::NoDevice(_) => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address),
            Self::InjectedNack(_) => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data),
            Self::UnknownRegister(_) => ErrorKind::Other,
        }
    }
}

// ============================================================================
// ADS1115
// ============================================================================

/// Register-level ADS1115 model.
///
/// A conversion takes one nominal sample period of wall time; the OS bit
/// reads busy until then.
pub struct SimAds1115 {
    address: u8,
    inputs: [i16; Channel::COUNT],
    failing: Option<Channel>,
    config: u16,
    pointer: u8,
    conversion: u16,
    started: Option<(Instant, Duration)>,
}

impl SimAds1115 {
    /// Create a device answering on `address` with fixed input values
    pub fn new(address: u8, inputs: [i16; Channel::COUNT]) -> Self {
        Self {
            address,
            inputs,
            failing: None,
            config: POWER_ON_CONFIG,
            pointer: REG_CONVERSION,
            conversion: 0,
            started: None,
        }
    }

    /// NACK conversion reads while `channel` is selected
    pub fn fail_channel(mut self, channel: Option<Channel>) -> Self {
        self.failing = channel;
        self
    }

    fn selected_channel(&self) -> Option<Channel> {
        let mux = (self.config >> 12) & 0x7;
        mux.checked_sub(4).and_then(|index| Channel::from_index(u8::try_from(index).ok()?))
    }

    fn busy(&mut self) -> bool {
        match self.started {
            Some((start, duration)) if start.elapsed() < duration => true,
            Some(_) => {
                self.started = None;
                self.finish_conversion();
                false
            }
            None => false,
        }
    }

    fn finish_conversion(&mut self) {
        if let Some(channel) = self.selected_channel() {
            self.conversion = u16::from_be_bytes(self.inputs[channel.index()].to_be_bytes());
        }
    }

    fn write_register(&mut self, reg: u8, value: u16) -> Result<(), SimError> {
        match reg {
            REG_CONFIG => {
                self.config = value;
                if value & OS_BIT != 0 {
                    let rate = DataRate::from_bits_or_default(value & 0x00E0);
                    let period = Duration::from_micros(1_000_000 / u64::from(rate.hz()));
                    self.started = Some((Instant::now(), period));
                    debug!("sim: conversion started, config {:#06X}", value);
                }
                Ok(())
            }
            REG_CONVERSION => Ok(()),
            other => Err(SimError::UnknownRegister(other)),
        }
    }

    fn read_register(&mut self, reg: u8) -> Result<u16, SimError> {
        match reg {
            REG_CONFIG => {
                let os = if self.busy() { 0 } else { OS_BIT };
                Ok((self.config & !OS_BIT) | os)
            }
            REG_CONVERSION => {
                self.busy();
                match self.selected_channel() {
                    Some(channel) if self.failing == Some(channel) => Err(SimError::InjectedNack(channel)),
                    _ => Ok(self.conversion),
                }
            }
            other => Err(SimError::UnknownRegister(other)),
        }
    }
}

impl i2c::ErrorType for SimAds1115 {
    type Error = SimError;
}

impl i2c::I2c for SimAds1115 {
    fn transaction(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), Self::Error> {
        if address != self.address {
            return Err(SimError::NoDevice(address));
        }

        for operation in operations {
            match operation {
                Operation::Write(bytes) => {
                    if let Some((&reg, data)) = bytes.split_first() {
                        self.pointer = reg;
                        if let &[msb, lsb] = data {
                            self.write_register(reg, u16::from_be_bytes([msb, lsb]))?;
                        }
                    }
                }
                Operation::Read(buffer) => {
                    let value = self.read_register(self.pointer)?.to_be_bytes();
                    for (dst, src) in buffer.iter_mut().zip(value) {
                        *dst = src;
                    }
                }
            }
        }
        Ok(())
    }
}

/// `DelayNs` backed by `std::thread::sleep`
#[derive(Clone, Copy, Debug, Default)]
pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(u64::from(ns)));
    }
}

// ============================================================================
// DAC
// ============================================================================

/// 8-bit DAC that logs level changes
#[derive(Debug, Default)]
pub struct SimDac {
    last: Option<u8>,
}

impl OutputStage for SimDac {
    type Error = Infallible;

    fn write_level(&mut self, level: u8) -> Result<(), Self::Error> {
        if self.last != Some(level) {
            info!("DAC: output level {}", level);
            self.last = Some(level);
        }
        Ok(())
    }
}

// ============================================================================
// BLE Stack
// ============================================================================

/// A response the session sent to the central
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentResponse {
    /// Connection id
    pub conn_id: u16,
    /// Transaction id
    pub trans_id: u32,
    /// Value bytes, `None` for a write acknowledgement
    pub value: Option<Vec<u8>>,
}

/// BLE stack that logs every request and keeps the responses
#[derive(Debug, Default)]
pub struct SimLink {
    responses: Vec<SentResponse>,
}

impl SimLink {
    /// Take the responses sent since the last call
    pub fn take_responses(&mut self) -> Vec<SentResponse> {
        std::mem::take(&mut self.responses)
    }
}

impl LinkStack for SimLink {
    type Error = Infallible;

    fn set_device_name(&mut self, name: &str) -> Result<(), Self::Error> {
        info!("link: device name {:?}", name);
        Ok(())
    }

    fn configure_advertising(&mut self, data: &AdvertisingData) -> Result<(), Self::Error> {
        info!("link: advertising data {:?}", data);
        Ok(())
    }

    fn set_local_mtu(&mut self, mtu: u16) -> Result<(), Self::Error> {
        info!("link: local MTU {}", mtu);
        Ok(())
    }

    fn create_service(&mut self, service: &ServiceDefinition) -> Result<(), Self::Error> {
        info!("link: create service {:#06X} ({} handles)", service.uuid, service.num_handles);
        Ok(())
    }

    fn start_service(&mut self, service_handle: u16) -> Result<(), Self::Error> {
        info!("link: start service {}", service_handle);
        Ok(())
    }

    fn add_characteristic(
        &mut self,
        service_handle: u16,
        characteristic: &CharacteristicDefinition,
    ) -> Result<(), Self::Error> {
        info!(
            "link: add characteristic {:#06X} to service {} (props {:#04X}, perms {:#06X}, max {} bytes)",
            characteristic.uuid,
            service_handle,
            characteristic.properties,
            characteristic.permissions,
            characteristic.max_len
        );
        Ok(())
    }

    fn send_response(&mut self, conn_id: u16, trans_id: u32, response: GattResponse<'_>) -> Result<(), Self::Error> {
        let value = match response {
            GattResponse::Value { value, .. } => Some(value.to_vec()),
            GattResponse::Ack => None,
        };
        self.responses.push(SentResponse { conn_id, trans_id, value });
        Ok(())
    }

    fn start_advertising(&mut self, params: &AdvertisingParams) -> Result<(), Self::Error> {
        info!(
            "link: advertising every {}-{} x 0.625 ms",
            params.interval_min, params.interval_max
        );
        Ok(())
    }
}
