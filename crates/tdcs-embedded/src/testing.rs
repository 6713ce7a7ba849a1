//! Host-side fakes shared by the driver and session tests.

extern crate std;

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{self, ErrorKind, Operation};
use embedded_hal::pwm;

use tdcs_core::types::Channel;

use crate::drivers::ads1115::{config_bits, regs};
use crate::drivers::output::OutputStage;

/// One register access seen by [`FakeAds1115`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BusOp {
    Write { address: u8, reg: u8, value: u16 },
    Read { address: u8, reg: u8 },
}

#[derive(Default)]
struct FakeState {
    inputs: [i16; Channel::COUNT],
    config: u16,
    pointer: u8,
    absent: bool,
    failing: [bool; Channel::COUNT],
    corrupt_readback: bool,
    busy_polls: u32,
    busy_remaining: u32,
    config_read_nacks: u32,
    clock: Option<(Rc<Cell<u64>>, u64)>,
    log: Vec<BusOp>,
}

impl FakeState {
    fn selected_channel(&self) -> Option<usize> {
        let mux = (self.config >> 12) & 0x7;
        mux.checked_sub(4).map(usize::from)
    }
}

/// Register-level model of an ADS1115 on the bus.
///
/// Clones share state, so a test can keep a handle after moving one into
/// the driver.
#[derive(Clone)]
pub struct FakeAds1115 {
    state: Rc<RefCell<FakeState>>,
}

impl FakeAds1115 {
    pub fn new() -> Self {
        let state = FakeState {
            config: 0x8583,
            ..FakeState::default()
        };
        Self { state: Rc::new(RefCell::new(state)) }
    }

    pub fn set_input(&self, channel: Channel, raw: i16) {
        self.state.borrow_mut().inputs[channel.index()] = raw;
    }

    pub fn set_inputs(&self, raw: [i16; Channel::COUNT]) {
        self.state.borrow_mut().inputs = raw;
    }

    pub fn input(&self, channel: Channel) -> i16 {
        self.state.borrow().inputs[channel.index()]
    }

    /// NACK every transaction
    pub fn set_absent(&self, absent: bool) {
        self.state.borrow_mut().absent = absent;
    }

    /// NACK conversion reads while `channel` is selected
    pub fn fail_conversion(&self, channel: Channel) {
        self.state.borrow_mut().failing[channel.index()] = true;
    }

    pub fn corrupt_readback(&self, corrupt: bool) {
        self.state.borrow_mut().corrupt_readback = corrupt;
    }

    /// Number of config reads reporting busy after each conversion start
    pub fn set_busy_polls(&self, polls: u32) {
        self.state.borrow_mut().busy_polls = polls;
    }

    /// NACK the next `count` config register reads
    pub fn nack_next_config_reads(&self, count: u32) {
        self.state.borrow_mut().config_read_nacks = count;
    }

    /// Advance `clock` by `ns` for every transaction, as bus time
    pub fn charge_transactions(&self, clock: &RecordingDelay, ns: u64) {
        self.state.borrow_mut().clock = Some((Rc::clone(&clock.elapsed_ns), ns));
    }

    pub fn log(&self) -> Vec<BusOp> {
        self.state.borrow().log.clone()
    }

    pub fn clear_log(&self) {
        self.state.borrow_mut().log.clear();
    }
}

impl i2c::ErrorType for FakeAds1115 {
    type Error = ErrorKind;
}

impl i2c::I2c for FakeAds1115 {
    fn transaction(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), Self::Error> {
        let mut state = self.state.borrow_mut();
        if let Some((clock, ns)) = &state.clock {
            clock.set(clock.get() + ns);
        }

        for operation in operations {
            match operation {
                Operation::Write(bytes) => {
                    let Some((&reg, data)) = bytes.split_first() else {
                        continue;
                    };
                    state.pointer = reg;
                    if let &[msb, lsb] = data {
                        let value = u16::from_be_bytes([msb, lsb]);
                        state.log.push(BusOp::Write { address, reg, value });
                        if state.absent {
                            return Err(ErrorKind::Other);
                        }
                        if reg == regs::CONFIG {
                            state.config = value;
                            state.busy_remaining = state.busy_polls;
                        }
                    } else if state.absent {
                        return Err(ErrorKind::Other);
                    }
                }
                Operation::Read(buffer) => {
                    let reg = state.pointer;
                    state.log.push(BusOp::Read { address, reg });
                    if state.absent {
                        return Err(ErrorKind::Other);
                    }

                    let value = match reg {
                        regs::CONFIG if state.config_read_nacks > 0 => {
                            state.config_read_nacks -= 1;
                            return Err(ErrorKind::Other);
                        }
                        regs::CONFIG => {
                            let mut value = state.config & !config_bits::OS_NOT_BUSY;
                            if state.busy_remaining > 0 {
                                state.busy_remaining -= 1;
                            } else {
                                value |= config_bits::OS_NOT_BUSY;
                            }
                            if state.corrupt_readback {
                                value ^= 0x0E00;
                            }
                            value
                        }
                        regs::CONVERSION => match state.selected_channel() {
                            Some(ch) if state.failing[ch] => return Err(ErrorKind::Other),
                            Some(ch) => u16::from_be_bytes(state.inputs[ch].to_be_bytes()),
                            None => 0,
                        },
                        _ => 0,
                    };

                    let bytes = value.to_be_bytes();
                    for (dst, src) in buffer.iter_mut().zip(bytes) {
                        *dst = src;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Delay that only records how long it was asked to wait.
#[derive(Clone, Default)]
pub struct RecordingDelay {
    elapsed_ns: Rc<Cell<u64>>,
}

impl RecordingDelay {
    pub fn elapsed_ms(&self) -> u32 {
        u32::try_from(self.elapsed_ns.get() / 1_000_000).unwrap()
    }

    pub fn elapsed_us(&self) -> u64 {
        self.elapsed_ns.get() / 1_000
    }
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns.set(self.elapsed_ns.get() + u64::from(ns));
    }
}

/// Output stage that records every level written.
#[derive(Default)]
pub struct RecordingStage {
    pub levels: Vec<u8>,
    pub fail: bool,
}

impl OutputStage for RecordingStage {
    type Error = pwm::ErrorKind;

    fn write_level(&mut self, level: u8) -> Result<(), Self::Error> {
        if self.fail {
            return Err(pwm::ErrorKind::Other);
        }
        self.levels.push(level);
        Ok(())
    }
}

/// PWM channel that stores its duty cycle.
pub struct FakePwm {
    pub duty: u16,
    max: u16,
}

impl FakePwm {
    pub fn new(max: u16) -> Self {
        Self { duty: 0, max }
    }
}

impl pwm::ErrorType for FakePwm {
    type Error = pwm::ErrorKind;
}

impl pwm::SetDutyCycle for FakePwm {
    fn max_duty_cycle(&self) -> u16 {
        self.max
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        self.duty = duty;
        Ok(())
    }
}
