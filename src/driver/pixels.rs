use embedded_hal::delay::DelayNs;

use super::Ccpdv2;
use crate::board::{Board, ShiftRegister};
use crate::error::Error;
use crate::pixel::{AnalogOut, COLUMNS, PixelConfig, PreampEnable, ROWS};
use crate::registers::{ColumnBit, ConfigRegister, RowBit, TrimSide};
use crate::retry::WaitOutcome;

/// Latch pulses per column; the trim inputs need several to settle.
const LATCH_PULSES: usize = 5;

/// Bit of a 24-bit row mask that belongs to `row`; row 0 is the MSB.
fn row_mask_bit(mask: u32, row: usize) -> bool {
    (mask >> (ROWS - 1 - row)) & 1 == 1
}

/// Preamplifier enable serving `row` in a given column phase.
fn preamp_bit(row: usize, phase: usize) -> RowBit {
    match row % 4 {
        1 | 2 => RowBit::PREAMP[phase],
        _ => RowBit::PREAMP[3 + phase],
    }
}

/// Monitor enable (active low) serving `row`.
fn monitor_enable(row: usize) -> RowBit {
    match row % 4 {
        1 | 2 => RowBit::EnL,
        _ => RowBit::EnR,
    }
}

impl<B: Board, D: DelayNs> Ccpdv2<B, D> {
    /// Write the trim codes of one pixel column.
    ///
    /// The codes are placed on the trim inputs of every ROW group and the column's
    /// latch is pulsed, committing the configuration register twice per pulse.
    /// The model is left with the latch low. Returns [`WaitOutcome::TimedOut`] if
    /// any of the commits timed out.
    pub fn put_tdac_column(
        &mut self,
        column: usize,
        codes: &[u8; ROWS],
    ) -> Result<WaitOutcome, Error> {
        if column >= COLUMNS {
            return Err(Error::PixelOutOfRange { row: 0, column });
        }
        for (row, &code) in codes.iter().enumerate() {
            self.config
                .set_trim(ConfigRegister::row_group(row), TrimSide::for_row(row), code);
        }
        let group = ConfigRegister::column_group(column);
        let latch = ColumnBit::latch(column % 3);
        let mut outcome = WaitOutcome::Done;
        for _ in 0..LATCH_PULSES {
            for level in [false, true] {
                self.config.set_column_bit(group, latch, level);
                let commit = self.commit(ShiftRegister::Config)?;
                if commit.is_timeout() {
                    outcome = commit;
                }
            }
        }
        self.config.set_column_bit(group, latch, false);
        Ok(outcome)
    }

    /// Write the monitor selection, preamplifier enables and analog output
    /// selection, and commit the configuration register.
    ///
    /// Trim inputs and latches keep their last values.
    pub fn put_pixel_config(&mut self, config: &PixelConfig) -> Result<WaitOutcome, Error> {
        self.stage_monitor(config);
        self.stage_preamp(config);
        self.stage_analog_out(config);
        self.commit(ShiftRegister::Config)
    }

    fn stage_monitor(&mut self, config: &PixelConfig) {
        let register = &mut self.config;
        for group in 0..ROWS / 2 {
            register.set_row_bit(group, RowBit::EnL, true);
            register.set_row_bit(group, RowBit::EnR, true);
        }
        for group in 0..COLUMNS / 3 {
            for select in ColumnBit::MONITOR {
                register.set_column_bit(group, select, false);
            }
        }
        for pixel in &config.pixels {
            let (row, column) = (pixel.row(), pixel.column());
            register.set_row_bit(ConfigRegister::row_group(row), monitor_enable(row), false);
            let left = matches!(row % 4, 0 | 2);
            register.set_column_bit(
                ConfigRegister::column_group(column),
                ColumnBit::monitor(left, column % 3),
                true,
            );
        }
        if let Some(mask) = config.monitor_mask {
            for row in 0..ROWS {
                register.set_row_bit(
                    ConfigRegister::row_group(row),
                    monitor_enable(row),
                    row_mask_bit(mask, row),
                );
            }
        }
    }

    fn stage_preamp(&mut self, config: &PixelConfig) {
        let register = &mut self.config;
        match config.preamp {
            PreampEnable::All(enabled) => {
                for group in 0..ROWS / 2 {
                    for bit in RowBit::PREAMP {
                        register.set_row_bit(group, bit, enabled);
                    }
                }
                for pixel in &config.pixels {
                    let row = pixel.row();
                    register.set_row_bit(
                        ConfigRegister::row_group(row),
                        preamp_bit(row, pixel.column() % 3),
                        true,
                    );
                }
            }
            PreampEnable::RowMasks(masks) => {
                for (phase, mask) in masks.into_iter().enumerate() {
                    for row in 0..ROWS {
                        register.set_row_bit(
                            ConfigRegister::row_group(row),
                            preamp_bit(row, phase),
                            row_mask_bit(mask, row),
                        );
                    }
                }
            }
        }
    }

    fn stage_analog_out(&mut self, config: &PixelConfig) {
        let register = &mut self.config;
        for group in 0..COLUMNS / 3 {
            register.set_column_bit(group, ColumnBit::Ao, false);
        }
        match config.analog_out {
            AnalogOut::Off => {}
            AnalogOut::SelectedColumns => {
                for pixel in &config.pixels {
                    register.set_column_bit(
                        ConfigRegister::column_group(pixel.column()),
                        ColumnBit::Ao,
                        true,
                    );
                }
            }
            AnalogOut::Mask(mask) => {
                for group in 0..COLUMNS / 3 {
                    register.set_column_bit(group, ColumnBit::Ao, (mask >> group) & 1 == 1);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_masks_start_at_row_zero() {
        assert!(row_mask_bit(1 << 23, 0));
        assert!(!row_mask_bit(1 << 23, 1));
        assert!(row_mask_bit(1, 23));
    }

    #[test]
    fn preamp_and_monitor_sides() {
        assert_eq!(preamp_bit(1, 0), RowBit::En0);
        assert_eq!(preamp_bit(2, 2), RowBit::En2);
        assert_eq!(preamp_bit(0, 1), RowBit::En4);
        assert_eq!(preamp_bit(7, 2), RowBit::En5);
        assert_eq!(monitor_enable(5), RowBit::EnL);
        assert_eq!(monitor_enable(4), RowBit::EnR);
    }
}
