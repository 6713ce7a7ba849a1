//! BLE Control Session
//!
//! GATT server logic for the tDCS bridge: one primary service with one
//! read/write characteristic.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  GattEvent / GapEvent   ┌────────────────┐
//! │  BLE stack   │ ──────────────────────► │ ControlSession │
//! │ (LinkStack)  │ ◄────────────────────── │                │
//! └──────────────┘  create / respond / adv └───┬────────┬───┘
//!                                  SampleSource│        │SharedOutput
//!                                              ▼        ▼
//!                                          ADS1115   output task
//! ```
//!
//! The stack delivers events one at a time; [`ControlSession`] reacts by
//! calling back into the stack through [`LinkStack`]. The stack itself
//! (controller bring-up, bonding, advertising payload encoding) stays
//! outside this crate.
//!
//! # Lifecycle
//!
//! ```text
//! Registered ─► set name, configure advertising, set MTU, create service
//! ServiceCreated ─► start service, add characteristic
//! CharacteristicAdded ─► remember handle
//! AdvertisingDataSet ─► start advertising
//! Connected ─► remember connection
//! ReadRequested ─► convert A0..A3, respond with 8 bytes
//! WriteRequested ─► apply one-byte command, ack if asked
//! Disconnected ─► forget connection, restart advertising
//! ```

use core::fmt;

use embedded_hal::i2c::I2c;
use tracing::{debug, error, info, warn};

use tdcs_core::error::AdcError;
use tdcs_core::protocol::{
    char_flags, ControlCommand, ReadResponse, CONTROL_CHAR_INITIAL_VALUE, CONTROL_CHAR_MAX_LEN,
    CONTROL_CHAR_UUID, CONTROL_SERVICE_NUM_HANDLES, CONTROL_SERVICE_UUID, DEVICE_NAME, LOCAL_MTU,
};
use tdcs_core::types::Channel;

use crate::drivers::ads1115::{Ads1115, ConversionWait};
use crate::drivers::output::SharedOutput;

// ============================================================================
// Events
// ============================================================================

/// GATT server events delivered by the stack
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GattEvent<'a> {
    /// Application registered with the stack
    Registered {
        /// Registration status
        success: bool,
    },
    /// Service created
    ServiceCreated {
        /// Handle of the new service
        service_handle: u16,
    },
    /// Characteristic added to the service
    CharacteristicAdded {
        /// Attribute handle of the characteristic value
        attr_handle: u16,
    },
    /// Central connected
    Connected {
        /// Connection id
        conn_id: u16,
    },
    /// Central read an attribute
    ReadRequested {
        /// Connection id
        conn_id: u16,
        /// Transaction id to echo in the response
        trans_id: u32,
        /// Attribute handle being read
        handle: u16,
    },
    /// Central wrote an attribute
    WriteRequested {
        /// Connection id
        conn_id: u16,
        /// Transaction id to echo in the response
        trans_id: u32,
        /// Attribute handle being written
        handle: u16,
        /// Written bytes
        value: &'a [u8],
        /// Whether the central expects a write response
        need_rsp: bool,
    },
    /// Central disconnected
    Disconnected {
        /// Connection id
        conn_id: u16,
    },
}

/// GAP events delivered by the stack
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GapEvent {
    /// Advertising payload configured
    AdvertisingDataSet,
    /// Advertising start completed
    AdvertisingStarted {
        /// Completion status
        success: bool,
    },
    /// Advertising stop completed
    AdvertisingStopped {
        /// Completion status
        success: bool,
    },
}

// ============================================================================
// Attribute Table
// ============================================================================

/// Service the stack is asked to create
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServiceDefinition {
    /// 16-bit service UUID
    pub uuid: u16,
    /// Primary service
    pub primary: bool,
    /// Attribute handles to reserve
    pub num_handles: u16,
}

impl ServiceDefinition {
    /// The control service
    pub const CONTROL: Self = Self {
        uuid: CONTROL_SERVICE_UUID,
        primary: true,
        num_handles: CONTROL_SERVICE_NUM_HANDLES,
    };
}

/// Characteristic the stack is asked to add
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CharacteristicDefinition {
    /// 16-bit characteristic UUID
    pub uuid: u16,
    /// Property bits ([`char_flags`])
    pub properties: u8,
    /// Permission bits ([`char_flags`])
    pub permissions: u16,
    /// Maximum value length
    pub max_len: usize,
    /// Value before the first read
    pub initial_value: &'static [u8],
}

impl CharacteristicDefinition {
    /// The control characteristic
    pub const CONTROL: Self = Self {
        uuid: CONTROL_CHAR_UUID,
        properties: char_flags::PROP_READ | char_flags::PROP_WRITE,
        permissions: char_flags::PERM_READ | char_flags::PERM_WRITE,
        max_len: CONTROL_CHAR_MAX_LEN,
        initial_value: &CONTROL_CHAR_INITIAL_VALUE,
    };
}

// ============================================================================
// Advertising
// ============================================================================

/// Advertising flag bits
pub mod adv_flags {
    /// LE General Discoverable Mode
    pub const GENERAL_DISCOVERABLE: u8 = 1 << 1;
    /// BR/EDR Not Supported
    pub const BREDR_NOT_SUPPORTED: u8 = 1 << 2;
}

/// Advertising payload settings
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdvertisingData {
    /// Include the device name
    pub include_name: bool,
    /// Include TX power
    pub include_tx_power: bool,
    /// Preferred minimum connection interval (1.25 ms units)
    pub min_conn_interval: u16,
    /// Preferred maximum connection interval (1.25 ms units)
    pub max_conn_interval: u16,
    /// GAP appearance
    pub appearance: u16,
    /// Flags ([`adv_flags`])
    pub flags: u8,
}

impl Default for AdvertisingData {
    fn default() -> Self {
        Self {
            include_name: true,
            include_tx_power: false,
            min_conn_interval: 0x0006,
            max_conn_interval: 0x0010,
            appearance: 0,
            flags: adv_flags::GENERAL_DISCOVERABLE | adv_flags::BREDR_NOT_SUPPORTED,
        }
    }
}

/// Advertising parameters
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdvertisingParams {
    /// Minimum advertising interval (0.625 ms units)
    pub interval_min: u16,
    /// Maximum advertising interval (0.625 ms units)
    pub interval_max: u16,
    /// Connectable undirected advertising
    pub connectable: bool,
    /// Advertising channel bitmap (37, 38, 39)
    pub channel_map: u8,
}

impl Default for AdvertisingParams {
    fn default() -> Self {
        Self {
            interval_min: 0x20,
            interval_max: 0x40,
            connectable: true,
            channel_map: 0x07,
        }
    }
}

/// Advertising payload plus parameters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AdvertisingConfig {
    /// Payload
    pub data: AdvertisingData,
    /// Parameters
    pub params: AdvertisingParams,
}

// ============================================================================
// Stack and Sample Seams
// ============================================================================

/// Response to a read or write request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GattResponse<'a> {
    /// Attribute value for a read
    Value {
        /// Attribute handle
        handle: u16,
        /// Value bytes
        value: &'a [u8],
    },
    /// Plain success for a write
    Ack,
}

/// Calls the session makes into the BLE stack.
///
/// Failures are logged by the session and otherwise ignored; the stack
/// reports completion through later events.
pub trait LinkStack {
    /// Error reported by the stack
    type Error: fmt::Debug;

    /// Set the GAP device name
    fn set_device_name(&mut self, name: &str) -> Result<(), Self::Error>;

    /// Configure the advertising payload; completion arrives as
    /// [`GapEvent::AdvertisingDataSet`]
    fn configure_advertising(&mut self, data: &AdvertisingData) -> Result<(), Self::Error>;

    /// Set the preferred local ATT MTU
    fn set_local_mtu(&mut self, mtu: u16) -> Result<(), Self::Error>;

    /// Create a service; completion arrives as [`GattEvent::ServiceCreated`]
    fn create_service(&mut self, service: &ServiceDefinition) -> Result<(), Self::Error>;

    /// Start a created service
    fn start_service(&mut self, service_handle: u16) -> Result<(), Self::Error>;

    /// Add a characteristic; completion arrives as
    /// [`GattEvent::CharacteristicAdded`]
    fn add_characteristic(
        &mut self,
        service_handle: u16,
        characteristic: &CharacteristicDefinition,
    ) -> Result<(), Self::Error>;

    /// Answer a read or write request
    fn send_response(
        &mut self,
        conn_id: u16,
        trans_id: u32,
        response: GattResponse<'_>,
    ) -> Result<(), Self::Error>;

    /// Start (or restart) advertising
    fn start_advertising(&mut self, params: &AdvertisingParams) -> Result<(), Self::Error>;
}

/// Source of raw channel samples for read requests.
pub trait SampleSource {
    /// Acquisition error
    type Error: fmt::Display;

    /// Acquire one raw sample
    fn acquire(&mut self, channel: Channel) -> Result<i16, Self::Error>;
}

impl<I2C, W> SampleSource for Ads1115<I2C, W>
where
    I2C: I2c,
    W: ConversionWait,
{
    type Error = AdcError<I2C::Error>;

    fn acquire(&mut self, channel: Channel) -> Result<i16, Self::Error> {
        self.read_channel(channel)
    }
}

fn log_link_result<E: fmt::Debug>(operation: &str, result: Result<(), E>) {
    if let Err(e) = result {
        warn!("Link {} failed: {:?}", operation, e);
    }
}

// ============================================================================
// Control Session
// ============================================================================

/// What the session has learned from the stack so far
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Active connection
    pub conn_id: Option<u16>,
    /// Handle of the created control service
    pub service_handle: Option<u16>,
    /// Attribute handle of the control characteristic
    pub char_handle: Option<u16>,
}

impl SessionState {
    /// Check if a central is connected
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.conn_id.is_some()
    }
}

/// GATT control session.
///
/// Owns the sample source (and through it the ADC bus) and writes commands
/// into the shared output state read by the output task.
pub struct ControlSession<'a, A> {
    adc: A,
    output: &'a SharedOutput,
    advertising: AdvertisingConfig,
    state: SessionState,
}

impl<'a, A: SampleSource> ControlSession<'a, A> {
    /// Create a session with the default advertising configuration
    #[must_use]
    pub fn new(adc: A, output: &'a SharedOutput) -> Self {
        Self::with_advertising(adc, output, AdvertisingConfig::default())
    }

    /// Create a session with an explicit advertising configuration
    #[must_use]
    pub fn with_advertising(adc: A, output: &'a SharedOutput, advertising: AdvertisingConfig) -> Self {
        Self {
            adc,
            output,
            advertising,
            state: SessionState::default(),
        }
    }

    /// Current session state
    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Shared output state this session writes to
    #[must_use]
    pub fn output(&self) -> &SharedOutput {
        self.output
    }

    /// Access the sample source
    pub fn adc(&mut self) -> &mut A {
        &mut self.adc
    }

    /// Release the sample source
    pub fn release(self) -> A {
        self.adc
    }

    /// Convert all four channels in order; failed channels read 0.
    pub fn acquire_all(&mut self) -> ReadResponse {
        let samples = Channel::ALL.map(|channel| match self.adc.acquire(channel) {
            Ok(raw) => raw,
            Err(e) => {
                error!("Failed to read {}: {}", channel, e);
                0
            }
        });
        ReadResponse::new(samples)
    }

    /// Handle one GATT server event
    pub fn handle_event<L: LinkStack>(&mut self, link: &mut L, event: GattEvent<'_>) {
        match event {
            GattEvent::Registered { success: false } => {
                error!("GATT registration failed, control service not created");
            }
            GattEvent::Registered { success: true } => {
                info!("GATT application registered");
                log_link_result("set device name", link.set_device_name(DEVICE_NAME));
                log_link_result(
                    "configure advertising",
                    link.configure_advertising(&self.advertising.data),
                );
                log_link_result("set local MTU", link.set_local_mtu(LOCAL_MTU));
                log_link_result("create service", link.create_service(&ServiceDefinition::CONTROL));
            }
            GattEvent::ServiceCreated { service_handle } => {
                debug!("Control service created with handle {}", service_handle);
                self.state.service_handle = Some(service_handle);
                log_link_result("start service", link.start_service(service_handle));
                log_link_result(
                    "add characteristic",
                    link.add_characteristic(service_handle, &CharacteristicDefinition::CONTROL),
                );
            }
            GattEvent::CharacteristicAdded { attr_handle } => {
                debug!("Control characteristic added with handle {}", attr_handle);
                self.state.char_handle = Some(attr_handle);
            }
            GattEvent::Connected { conn_id } => {
                if let Some(previous) = self.state.conn_id {
                    warn!("Connection {} replaces active connection {}", conn_id, previous);
                } else {
                    info!("Central connected (conn_id {})", conn_id);
                }
                self.state.conn_id = Some(conn_id);
            }
            GattEvent::ReadRequested { conn_id, trans_id, handle } => {
                let bytes = self.acquire_all().to_bytes();
                debug!("Read on handle {}: {:02X?}", handle, bytes);
                log_link_result(
                    "read response",
                    link.send_response(conn_id, trans_id, GattResponse::Value { handle, value: &bytes }),
                );
            }
            GattEvent::WriteRequested {
                conn_id,
                trans_id,
                handle,
                value,
                need_rsp,
            } => {
                match ControlCommand::from_payload(value) {
                    Some(command) => {
                        self.output.apply_command(command);
                    }
                    None => debug!("Ignoring {}-byte write on handle {}", value.len(), handle),
                }
                if need_rsp {
                    log_link_result("write response", link.send_response(conn_id, trans_id, GattResponse::Ack));
                }
            }
            GattEvent::Disconnected { conn_id } => {
                info!("Central disconnected (conn_id {}), restarting advertising", conn_id);
                self.state.conn_id = None;
                log_link_result("start advertising", link.start_advertising(&self.advertising.params));
            }
        }
    }

    /// Handle one GAP event
    pub fn handle_gap<L: LinkStack>(&mut self, link: &mut L, event: GapEvent) {
        match event {
            GapEvent::AdvertisingDataSet => {
                log_link_result("start advertising", link.start_advertising(&self.advertising.params));
            }
            GapEvent::AdvertisingStarted { success: true } => info!("Advertising started"),
            GapEvent::AdvertisingStarted { success: false } => error!("Advertising start failed"),
            GapEvent::AdvertisingStopped { success: true } => info!("Advertising stopped"),
            GapEvent::AdvertisingStopped { success: false } => error!("Advertising stop failed"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::ads1115::FixedDelay;
    use crate::drivers::output::OutputApplier;
    use crate::testing::{FakeAds1115, RecordingDelay, RecordingStage};
    use tdcs_core::types::{AdcConfig, DataRate, Gain, OutputState};

    extern crate std;
    use std::string::{String, ToString};
    use std::vec::Vec;

    #[derive(Clone, Debug, PartialEq, Eq)]
    enum LinkCall {
        DeviceName(String),
        ConfigureAdvertising(AdvertisingData),
        LocalMtu(u16),
        CreateService(ServiceDefinition),
        StartService(u16),
        AddCharacteristic(u16, CharacteristicDefinition),
        Value { conn_id: u16, trans_id: u32, handle: u16, value: Vec<u8> },
        Ack { conn_id: u16, trans_id: u32 },
        StartAdvertising(AdvertisingParams),
    }

    #[derive(Default)]
    struct RecordingLink {
        calls: Vec<LinkCall>,
        fail: bool,
    }

    impl RecordingLink {
        fn record(&mut self, call: LinkCall) -> Result<(), ()> {
            self.calls.push(call);
            if self.fail {
                Err(())
            } else {
                Ok(())
            }
        }

        fn take(&mut self) -> Vec<LinkCall> {
            core::mem::take(&mut self.calls)
        }
    }

    impl LinkStack for RecordingLink {
        type Error = ();

        fn set_device_name(&mut self, name: &str) -> Result<(), ()> {
            self.record(LinkCall::DeviceName(name.to_string()))
        }

        fn configure_advertising(&mut self, data: &AdvertisingData) -> Result<(), ()> {
            self.record(LinkCall::ConfigureAdvertising(*data))
        }

        fn set_local_mtu(&mut self, mtu: u16) -> Result<(), ()> {
            self.record(LinkCall::LocalMtu(mtu))
        }

        fn create_service(&mut self, service: &ServiceDefinition) -> Result<(), ()> {
            self.record(LinkCall::CreateService(*service))
        }

        fn start_service(&mut self, service_handle: u16) -> Result<(), ()> {
            self.record(LinkCall::StartService(service_handle))
        }

        fn add_characteristic(
            &mut self,
            service_handle: u16,
            characteristic: &CharacteristicDefinition,
        ) -> Result<(), ()> {
            self.record(LinkCall::AddCharacteristic(service_handle, *characteristic))
        }

        fn send_response(&mut self, conn_id: u16, trans_id: u32, response: GattResponse<'_>) -> Result<(), ()> {
            let call = match response {
                GattResponse::Value { handle, value } => LinkCall::Value {
                    conn_id,
                    trans_id,
                    handle,
                    value: value.to_vec(),
                },
                GattResponse::Ack => LinkCall::Ack { conn_id, trans_id },
            };
            self.record(call)
        }

        fn start_advertising(&mut self, params: &AdvertisingParams) -> Result<(), ()> {
            self.record(LinkCall::StartAdvertising(*params))
        }
    }

    type TestAdc = Ads1115<FakeAds1115, FixedDelay<RecordingDelay>>;

    fn adc_with_inputs(inputs: [i16; 4]) -> (FakeAds1115, TestAdc) {
        let bus = FakeAds1115::new();
        bus.set_inputs(inputs);
        let config = AdcConfig::new(0x48, Gain::Fsr4_096, DataRate::Sps64);
        let mut adc = Ads1115::with_delay(bus.clone(), config, RecordingDelay::default());
        adc.init().unwrap();
        (bus, adc)
    }

    fn read(session: &mut ControlSession<'_, TestAdc>, link: &mut RecordingLink) -> Vec<u8> {
        session.handle_event(link, GattEvent::ReadRequested { conn_id: 0, trans_id: 7, handle: 42 });
        match link.take().as_slice() {
            [LinkCall::Value { conn_id: 0, trans_id: 7, handle: 42, value }] => value.clone(),
            other => panic!("unexpected link calls: {other:?}"),
        }
    }

    fn write(session: &mut ControlSession<'_, TestAdc>, link: &mut RecordingLink, byte: u8) {
        let payload = [byte];
        session.handle_event(
            link,
            GattEvent::WriteRequested {
                conn_id: 0,
                trans_id: 8,
                handle: 42,
                value: &payload,
                need_rsp: true,
            },
        );
        assert_eq!(link.take(), [LinkCall::Ack { conn_id: 0, trans_id: 8 }]);
    }

    #[test]
    fn test_registration_builds_topology() {
        let output = SharedOutput::new();
        let (_bus, adc) = adc_with_inputs([0; 4]);
        let mut session = ControlSession::new(adc, &output);
        let mut link = RecordingLink::default();

        session.handle_event(&mut link, GattEvent::Registered { success: true });
        assert_eq!(
            link.take(),
            [
                LinkCall::DeviceName("tDCS".to_string()),
                LinkCall::ConfigureAdvertising(AdvertisingData::default()),
                LinkCall::LocalMtu(500),
                LinkCall::CreateService(ServiceDefinition {
                    uuid: 0x00FF,
                    primary: true,
                    num_handles: 4,
                }),
            ]
        );

        session.handle_event(&mut link, GattEvent::ServiceCreated { service_handle: 40 });
        let calls = link.take();
        assert_eq!(calls[0], LinkCall::StartService(40));
        match &calls[1] {
            LinkCall::AddCharacteristic(40, characteristic) => {
                assert_eq!(characteristic.uuid, 0xFF01);
                assert_eq!(characteristic.properties, 0x0A);
                assert_eq!(characteristic.permissions, 0x11);
                assert_eq!(characteristic.max_len, 64);
                assert_eq!(characteristic.initial_value, [0x11, 0x22, 0x33]);
            }
            other => panic!("unexpected call: {other:?}"),
        }

        session.handle_event(&mut link, GattEvent::CharacteristicAdded { attr_handle: 42 });
        assert_eq!(session.state().service_handle, Some(40));
        assert_eq!(session.state().char_handle, Some(42));
        assert!(link.take().is_empty());
    }

    #[test]
    fn test_failed_registration_is_ignored() {
        let output = SharedOutput::new();
        let (_bus, adc) = adc_with_inputs([0; 4]);
        let mut session = ControlSession::new(adc, &output);
        let mut link = RecordingLink::default();

        session.handle_event(&mut link, GattEvent::Registered { success: false });
        assert!(link.take().is_empty());
        assert_eq!(*session.state(), SessionState::default());
    }

    #[test]
    fn test_read_response_bytes() {
        let output = SharedOutput::new();
        let (_bus, adc) = adc_with_inputs([100, -50, 0, 32767]);
        let mut session = ControlSession::new(adc, &output);
        let mut link = RecordingLink::default();

        assert_eq!(read(&mut session, &mut link), [0x00, 0x64, 0xFF, 0xCE, 0x00, 0x00, 0x7F, 0xFF]);
    }

    #[test]
    fn test_read_substitutes_zero_for_failed_channel() {
        let output = SharedOutput::new();
        let (bus, adc) = adc_with_inputs([100, -50, 1234, 32767]);
        bus.fail_conversion(Channel::A2);
        let mut session = ControlSession::new(adc, &output);
        let mut link = RecordingLink::default();

        assert_eq!(read(&mut session, &mut link), [0x00, 0x64, 0xFF, 0xCE, 0x00, 0x00, 0x7F, 0xFF]);
    }

    #[test]
    fn test_write_controls_output() {
        let output = SharedOutput::new();
        let (_bus, adc) = adc_with_inputs([0; 4]);
        let mut session = ControlSession::new(adc, &output);
        let mut link = RecordingLink::default();
        let mut applier = OutputApplier::new(RecordingStage::default(), &output);

        write(&mut session, &mut link, 0x10);
        assert_eq!(output.snapshot(), OutputState { level: 16, enabled: false });
        assert_eq!(applier.tick(), Ok(255));

        write(&mut session, &mut link, 254);
        assert_eq!(applier.tick(), Ok(16));

        write(&mut session, &mut link, 253);
        assert_eq!(applier.tick(), Ok(255));
        assert_eq!(output.snapshot().level, 16);
    }

    #[test]
    fn test_malformed_write_still_acknowledged() {
        let output = SharedOutput::new();
        let (_bus, adc) = adc_with_inputs([0; 4]);
        let mut session = ControlSession::new(adc, &output);
        let mut link = RecordingLink::default();

        for payload in [&[][..], &[254, 16][..]] {
            session.handle_event(
                &mut link,
                GattEvent::WriteRequested {
                    conn_id: 3,
                    trans_id: 9,
                    handle: 42,
                    value: payload,
                    need_rsp: true,
                },
            );
            assert_eq!(link.take(), [LinkCall::Ack { conn_id: 3, trans_id: 9 }]);
        }
        assert_eq!(output.snapshot(), OutputState::default());
    }

    #[test]
    fn test_write_without_response() {
        let output = SharedOutput::new();
        let (_bus, adc) = adc_with_inputs([0; 4]);
        let mut session = ControlSession::new(adc, &output);
        let mut link = RecordingLink::default();

        session.handle_event(
            &mut link,
            GattEvent::WriteRequested {
                conn_id: 0,
                trans_id: 1,
                handle: 42,
                value: &[254],
                need_rsp: false,
            },
        );
        assert!(link.take().is_empty());
        assert!(output.snapshot().enabled);
    }

    #[test]
    fn test_connection_lifecycle() {
        let output = SharedOutput::new();
        let (_bus, adc) = adc_with_inputs([0; 4]);
        let mut session = ControlSession::new(adc, &output);
        let mut link = RecordingLink::default();

        session.handle_event(&mut link, GattEvent::Connected { conn_id: 1 });
        assert_eq!(session.state().conn_id, Some(1));

        session.handle_event(&mut link, GattEvent::Connected { conn_id: 2 });
        assert_eq!(session.state().conn_id, Some(2));
        assert!(link.take().is_empty());

        session.handle_event(&mut link, GattEvent::Disconnected { conn_id: 2 });
        assert!(!session.state().is_connected());
        assert_eq!(link.take(), [LinkCall::StartAdvertising(AdvertisingParams::default())]);
    }

    #[test]
    fn test_gap_events() {
        let output = SharedOutput::new();
        let (_bus, adc) = adc_with_inputs([0; 4]);
        let mut session = ControlSession::new(adc, &output);
        let mut link = RecordingLink::default();

        session.handle_gap(&mut link, GapEvent::AdvertisingDataSet);
        assert_eq!(link.take(), [LinkCall::StartAdvertising(AdvertisingParams::default())]);

        session.handle_gap(&mut link, GapEvent::AdvertisingStarted { success: false });
        session.handle_gap(&mut link, GapEvent::AdvertisingStopped { success: false });
        assert!(link.take().is_empty());
    }

    #[test]
    fn test_link_failures_do_not_stop_session() {
        let output = SharedOutput::new();
        let (_bus, adc) = adc_with_inputs([1, 2, 3, 4]);
        let mut session = ControlSession::new(adc, &output);
        let mut link = RecordingLink { fail: true, ..RecordingLink::default() };

        session.handle_event(&mut link, GattEvent::Registered { success: true });
        assert_eq!(link.take().len(), 4);

        session.handle_event(&mut link, GattEvent::ReadRequested { conn_id: 0, trans_id: 1, handle: 42 });
        assert_eq!(link.take().len(), 1);

        session.handle_event(
            &mut link,
            GattEvent::WriteRequested {
                conn_id: 0,
                trans_id: 2,
                handle: 42,
                value: &[7],
                need_rsp: true,
            },
        );
        assert_eq!(output.snapshot().level, 7);
    }

    #[test]
    fn test_acquire_all_channel_order() {
        let output = SharedOutput::new();
        let (_bus, adc) = adc_with_inputs([-1, -2, -3, -4]);
        let mut session = ControlSession::new(adc, &output);

        let response = session.acquire_all();
        assert_eq!(response.samples, [-1, -2, -3, -4]);
        assert_eq!(response.sample(Channel::A3), -4);
    }
}
