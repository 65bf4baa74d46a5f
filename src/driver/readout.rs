use std::time::Duration;

use embedded_hal::delay::DelayNs;
use tracing::warn;

use super::Ccpdv2;
use crate::board::{Board, Pulser, PulserSettings};
use crate::error::Error;
use crate::frontend::SampleBatch;
use crate::retry::WaitOutcome;
use crate::settings::{PulserConfig, ReadoutMode};

/// Exposures at or below this wait for the TDC gate instead of sleeping.
const SHORT_EXPOSURE: Duration = Duration::from_micros(100);

impl<B: Board, D: DelayNs> Ccpdv2<B, D> {
    /// Program the injection and TDC gate pulsers.
    ///
    /// With `repeat == 0` a single injection is made inside a short gate and the
    /// TDC runs off its internal gate. Otherwise `repeat` injections of the given
    /// period are made inside one long external gate starting after `delay`.
    pub fn put_pulser(&mut self, pulser: &PulserConfig) -> Result<(), Error> {
        let period = pulser.period;
        if pulser.repeat == 0 {
            self.board.configure_pulser(
                Pulser::Injection,
                &PulserSettings {
                    delay: 10,
                    width: period / 2,
                    repeat: 1,
                    enabled: pulser.inj_en,
                },
            )?;
            self.board.configure_pulser(
                Pulser::TdcGate,
                &PulserSettings {
                    delay: 10,
                    width: 100,
                    repeat: 1,
                    enabled: true,
                },
            )?;
            if self.receiver.ccpd_tdc {
                self.board.reset_fifo()?;
            }
            self.board.reset_tdc()?;
            self.board.set_tdc_external(false)?;
        } else {
            self.board.configure_pulser(
                Pulser::Injection,
                &PulserSettings {
                    delay: period / 2,
                    width: period - period / 2 + 1,
                    repeat: pulser.repeat,
                    enabled: pulser.inj_en,
                },
            )?;
            self.board.configure_pulser(
                Pulser::TdcGate,
                &PulserSettings {
                    delay: pulser.delay,
                    width: (period + 1) * (pulser.repeat + 1),
                    repeat: 1,
                    enabled: true,
                },
            )?;
            self.board.reset_tdc()?;
            self.board.set_tdc_external(true)?;
            if self.receiver.ccpd_tdc {
                self.board.reset_fifo()?;
            }
        }
        Ok(())
    }

    /// Route the receiver for a readout mode. The FIFO and receiver are reset
    /// first.
    pub fn put_mode(&mut self, mode: ReadoutMode) -> Result<(), Error> {
        self.board.reset_fifo()?;
        self.board.reset_receiver()?;
        let receiver = mode.receiver_config();
        self.board.write_receiver(receiver)?;
        self.receiver = receiver;
        Ok(())
    }

    /// Fire the TDC gate, clearing the FIFO first when it holds CCPD TDC words.
    pub fn start_pulser(&mut self) -> Result<(), Error> {
        if self.receiver.ccpd_tdc {
            self.board.reset_fifo()?;
        }
        self.board.start_pulser(Pulser::TdcGate)?;
        Ok(())
    }

    /// Run one measurement and drain the FIFO.
    ///
    /// Exposures above 0.1 ms enable the TDC, fire the gate, sleep for the
    /// exposure and disable the TDC again. Shorter exposures fire the gate and
    /// poll until it has closed; a timeout is logged and whatever the FIFO holds
    /// is returned.
    pub fn measure(&mut self, exposure: Duration) -> Result<SampleBatch, Error> {
        let long = exposure > SHORT_EXPOSURE;
        if long {
            self.board.set_tdc_enabled(true)?;
        }
        self.start_pulser()?;
        if long {
            self.sleep(exposure);
            self.board.set_tdc_enabled(false)?;
        } else {
            let board = &mut self.board;
            let outcome = self.pulser_policy.wait(&mut self.delay, || {
                Ok(board.pulser_done(Pulser::TdcGate)?)
            })?;
            if let WaitOutcome::TimedOut { polls } = outcome {
                warn!(polls, "timeout waiting for TDC gate");
            }
        }
        Ok(SampleBatch(self.board.read_fifo()?))
    }
}
