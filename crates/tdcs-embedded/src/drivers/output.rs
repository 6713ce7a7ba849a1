//! Stimulation Output Driver
//!
//! Drives the analog output stage that sets the stimulation current. The
//! control link only records what the host asked for in a [`SharedOutput`];
//! an [`OutputApplier`] owned by a periodic task turns that record into a
//! level on the stage.
//!
//! # Levels
//!
//! The stage is an 8-bit DAC or PWM feeding an inverting current source:
//!
//! ```text
//! level   0 ──► maximum current
//! level 255 ──► no current (safe level)
//! ```
//!
//! While the output is disabled the stage is driven with
//! [`OutputConfig::safe_level`], whatever level was last stored.
//!
//! # Safety
//!
//! Software only selects the level. Current limiting must be done in
//! hardware.

use core::cell::Cell;
use core::fmt;

use critical_section::Mutex;
use embedded_hal::pwm::SetDutyCycle;
use tracing::{debug, info};

use tdcs_core::protocol::ControlCommand;
use tdcs_core::types::{OutputConfig, OutputState};

// ============================================================================
// Output Stage
// ============================================================================

/// An 8-bit analog output.
pub trait OutputStage {
    /// Error reported by the hardware
    type Error: fmt::Debug;

    /// Drive the output with `level` (0..=255).
    fn write_level(&mut self, level: u8) -> Result<(), Self::Error>;
}

impl<S: OutputStage + ?Sized> OutputStage for &mut S {
    type Error = S::Error;

    fn write_level(&mut self, level: u8) -> Result<(), Self::Error> {
        (**self).write_level(level)
    }
}

/// Output stage on a PWM channel followed by an RC filter.
///
/// Level 255 maps to full duty.
pub struct PwmOutput<P> {
    pwm: P,
}

impl<P: SetDutyCycle> PwmOutput<P> {
    /// Wrap a PWM channel
    #[must_use]
    pub fn new(pwm: P) -> Self {
        Self { pwm }
    }

    /// Release the PWM channel
    pub fn release(self) -> P {
        self.pwm
    }
}

impl<P: SetDutyCycle> OutputStage for PwmOutput<P> {
    type Error = P::Error;

    fn write_level(&mut self, level: u8) -> Result<(), Self::Error> {
        self.pwm
            .set_duty_cycle_fraction(u16::from(level), u16::from(u8::MAX))
    }
}

// ============================================================================
// Shared State
// ============================================================================

/// Output state shared between the control link and the output task.
///
/// Reads and writes are whole-value under a critical section, so the output
/// task never sees a level from one write mixed with an enable flag from
/// another.
pub struct SharedOutput {
    state: Mutex<Cell<OutputState>>,
}

impl SharedOutput {
    /// Create with the output disabled at level 0
    #[must_use]
    pub const fn new() -> Self {
        Self::with_state(OutputState { level: 0, enabled: false })
    }

    /// Create with a given initial state
    #[must_use]
    pub const fn with_state(state: OutputState) -> Self {
        Self {
            state: Mutex::new(Cell::new(state)),
        }
    }

    /// Copy of the current state
    #[must_use]
    pub fn snapshot(&self) -> OutputState {
        critical_section::with(|cs| self.state.borrow(cs).get())
    }

    /// Apply a control command and return the resulting state.
    pub fn apply_command(&self, command: ControlCommand) -> OutputState {
        let state = critical_section::with(|cs| {
            let cell = self.state.borrow(cs);
            let mut state = cell.get();
            match command {
                ControlCommand::Enable => state.enabled = true,
                ControlCommand::Disable => state.enabled = false,
                ControlCommand::SetLevel(level) => state.level = level,
            }
            cell.set(state);
            state
        });

        match command {
            ControlCommand::Enable => info!("Output enabled (level {})", state.level),
            ControlCommand::Disable => info!("Output disabled"),
            ControlCommand::SetLevel(level) => debug!("Output level set to {}", level),
        }
        state
    }

    /// Decode a command byte and apply it.
    pub fn apply_byte(&self, byte: u8) -> OutputState {
        self.apply_command(ControlCommand::from_byte(byte))
    }
}

impl Default for SharedOutput {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Output Applier
// ============================================================================

/// Applies the shared state to the output stage once per period.
///
/// The caller owns the timing: call [`OutputApplier::tick`] every
/// [`OutputApplier::period_ms`] milliseconds.
pub struct OutputApplier<'a, S> {
    stage: S,
    shared: &'a SharedOutput,
    config: OutputConfig,
}

impl<'a, S: OutputStage> OutputApplier<'a, S> {
    /// Create an applier with the default configuration
    #[must_use]
    pub fn new(stage: S, shared: &'a SharedOutput) -> Self {
        Self::with_config(stage, shared, OutputConfig::default())
    }

    /// Create an applier with an explicit configuration
    #[must_use]
    pub fn with_config(stage: S, shared: &'a SharedOutput, config: OutputConfig) -> Self {
        Self { stage, shared, config }
    }

    /// Output configuration
    #[must_use]
    pub fn config(&self) -> &OutputConfig {
        &self.config
    }

    /// Tick period in milliseconds
    #[must_use]
    pub fn period_ms(&self) -> u32 {
        self.config.period_ms
    }

    /// Write the effective level once and return it.
    ///
    /// A stage error is returned as-is; the next tick writes again.
    pub fn tick(&mut self) -> Result<u8, S::Error> {
        let state = self.shared.snapshot();
        let level = state.effective_level(self.config.safe_level);
        self.stage.write_level(level)?;
        debug!("Output tick: level {} (enabled={})", level, state.enabled);
        Ok(level)
    }

    /// Access the output stage
    pub fn stage(&mut self) -> &mut S {
        &mut self.stage
    }

    /// Release the output stage
    pub fn release(self) -> S {
        self.stage
    }
}

// ============================================================================
// Tests
// ============================================================================
