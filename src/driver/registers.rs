use embedded_hal::delay::DelayNs;

use super::{AllConfig, Ccpdv2};
use crate::board::{Board, Pulser, ShiftRegister};
use crate::error::Error;
use crate::registers::{ConfigRegister, GlobalDacs, GlobalRegister};
use crate::retry::WaitOutcome;

impl<B: Board, D: DelayNs> Ccpdv2<B, D> {
    /// Clear both register models. Nothing is written to the chip.
    pub fn reset_registers(&mut self) {
        self.global = GlobalRegister::default();
        self.config = ConfigRegister::default();
    }

    /// Write every global bias DAC and the two feedback enables.
    pub fn put_global(&mut self, dacs: &GlobalDacs) -> Result<WaitOutcome, Error> {
        self.global = GlobalRegister::from_dacs(dacs);
        self.commit(ShiftRegister::Global)
    }

    /// Model of the global register as last committed.
    pub fn global_register(&self) -> &GlobalRegister {
        &self.global
    }

    /// Model of the pixel configuration register as last committed.
    pub fn config_register(&self) -> &ConfigRegister {
        &self.config
    }

    /// Read back everything the board reports.
    pub fn all_config(&mut self) -> Result<AllConfig, Error> {
        let (tdc_enabled, tdc_external) = self.board.tdc_flags()?;
        let (injection_high, injection_low) = self.injection()?;
        Ok(AllConfig {
            global: self.global.to_dacs(),
            injection: self.board.pulser_settings(Pulser::Injection)?,
            tdc_gate: self.board.pulser_settings(Pulser::TdcGate)?,
            tdc_enabled,
            tdc_external,
            power: self.power()?,
            baseline: self.baseline()?,
            threshold: self.threshold()?,
            pcb_threshold: self.pcb_threshold()?,
            injection_high,
            injection_low,
            receiver: self.receiver,
        })
    }
}
