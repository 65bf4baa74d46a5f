use std::time::Duration;

use embedded_hal::delay::DelayNs;
use tracing::{debug, warn};

use crate::board::{Board, PulserSettings, ReceiverConfig, ShiftRegister};
use crate::error::Error;
use crate::frontend::{Frontend, SampleBatch};
use crate::pixel::{PixelConfig, ROWS};
use crate::registers::{ConfigRegister, GlobalDacs, GlobalRegister};
use crate::retry::{RetryPolicy, WaitOutcome};
use crate::settings::PowerSettings;

mod analog;
mod pixels;
mod readout;
mod registers;

/// Voltage and current read back from one rail.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RailReading {
    /// Output voltage in volts.
    pub volts: f64,
    /// Current drawn in milliamps.
    pub milliamps: f64,
}

/// Read-back of the four supply rails.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PowerReadings {
    pub vdd: RailReading,
    pub vssa: RailReading,
    pub vgate: RailReading,
    pub vcasc: RailReading,
}

/// Snapshot of everything that can be read back from the board, plus the global
/// DACs decoded from the register model.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq)]
pub struct AllConfig {
    pub global: GlobalDacs,
    pub injection: PulserSettings,
    pub tdc_gate: PulserSettings,
    pub tdc_enabled: bool,
    pub tdc_external: bool,
    pub power: PowerReadings,
    pub baseline: RailReading,
    pub threshold: RailReading,
    pub pcb_threshold: RailReading,
    pub injection_high: f64,
    pub injection_low: f64,
    pub receiver: ReceiverConfig,
}

/// Driver for a CCPDv2 on a readout board.
///
/// # Quick start
///
/// Wrap a [`Board`] implementation and a delay source, power the chip up and
/// program it:
///
/// ```ignore
/// let mut chip = Ccpdv2::new(board, StdDelay);
/// chip.power_on(&PowerSettings::default())?;
/// chip.put_global(&GlobalDacs::default())?;
/// chip.put_th(0.9)?;
/// let batch = chip.measure(Duration::ZERO)?;
/// ```
///
/// # Overview
///
/// The driver keeps a bit model of both shift registers. Every `put_*` method
/// that touches a register updates the model and commits the whole register;
/// the model is therefore always what was last shifted into the chip.
///
/// Shift-register commits and short measurements poll a ready flag under a
/// [`RetryPolicy`]. Running out of polls is logged as a warning and reported as
/// [`WaitOutcome::TimedOut`], not as an error.
///
/// The driver implements [`Frontend`], which is all the tuning searches need.
#[derive(Debug)]
pub struct Ccpdv2<B, D> {
    board: B,
    delay: D,
    global: GlobalRegister,
    config: ConfigRegister,
    /// Last receiver routing written; measurements depend on `ccpd_tdc`.
    receiver: ReceiverConfig,
    /// Supplies from the last power-on, restored after trim updates.
    power: PowerSettings,
    shift_policy: RetryPolicy,
    pulser_policy: RetryPolicy,
}

impl<B: Board, D: DelayNs> Ccpdv2<B, D> {
    ////////////////////////////////////////////////////////////////////////////////
    // Constructors
    ////////////////////////////////////////////////////////////////////////////////

    /// Driver for the chip on `board`, using `delay` for every sleep.
    ///
    /// Nothing is written to the board until a `put_*` or power method is called.
    pub fn new(board: B, delay: D) -> Self {
        Self {
            board,
            delay,
            global: GlobalRegister::default(),
            config: ConfigRegister::default(),
            receiver: ReceiverConfig::default(),
            power: PowerSettings::default(),
            shift_policy: RetryPolicy::SHIFT_REGISTER,
            pulser_policy: RetryPolicy::PULSER,
        }
    }

    /// Replace the polling budgets for shift-register commits and the TDC gate.
    pub fn with_retry_policies(mut self, shift_register: RetryPolicy, pulser: RetryPolicy) -> Self {
        self.shift_policy = shift_register;
        self.pulser_policy = pulser;
        self
    }

    /// The underlying board.
    pub fn board(&self) -> &B {
        &self.board
    }

    /// The underlying board, mutably.
    pub fn board_mut(&mut self) -> &mut B {
        &mut self.board
    }

    /// Give back the board and delay.
    pub fn into_parts(self) -> (B, D) {
        (self.board, self.delay)
    }

    ////////////////////////////////////////////////////////////////////////////////
    // Shift-register commits
    ////////////////////////////////////////////////////////////////////////////////

    /// Shift a register model into the chip and wait for the board to finish.
    fn commit(&mut self, register: ShiftRegister) -> Result<WaitOutcome, Error> {
        let bits = match register {
            ShiftRegister::Global => self.global.as_bytes(),
            ShiftRegister::Config => self.config.as_bytes(),
        };
        self.board.load_shift_register(register, bits)?;
        self.board.start_shift_register(register)?;
        let board = &mut self.board;
        let outcome = self.shift_policy.wait(&mut self.delay, || {
            Ok(board.shift_register_done(register)?)
        })?;
        if let WaitOutcome::TimedOut { polls } = outcome {
            warn!(?register, polls, "timeout waiting for shift register");
        }
        Ok(outcome)
    }

    fn sleep(&mut self, duration: Duration) {
        crate::retry::sleep(&mut self.delay, duration);
    }
}

impl<B: Board, D: DelayNs> Frontend for Ccpdv2<B, D> {
    fn set_threshold_voltage(&mut self, volts: f64) -> Result<(), Error> {
        self.put_th(volts)
    }

    fn threshold_voltage(&mut self) -> Result<f64, Error> {
        Ok(self.threshold()?.volts)
    }

    fn begin_tdac_update(&mut self) -> Result<(), Error> {
        self.raise_vdd_for_trim()
    }

    fn write_tdac_column(
        &mut self,
        column: usize,
        codes: &[u8; ROWS],
    ) -> Result<WaitOutcome, Error> {
        self.put_tdac_column(column, codes)
    }

    fn end_tdac_update(&mut self) -> Result<(), Error> {
        self.restore_vdd()
    }

    fn write_config_register(&mut self, config: &PixelConfig) -> Result<WaitOutcome, Error> {
        self.put_pixel_config(config)
    }

    fn trigger_measurement(&mut self, exposure: Duration) -> Result<SampleBatch, Error> {
        debug!(?exposure, "measure");
        self.measure(exposure)
    }
}
