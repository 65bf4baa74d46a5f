use tracing::debug;

use super::{TdacOutcome, TdacState, Tuner};
use crate::Error;
use crate::frontend::Frontend;
use crate::pixel::{COLUMNS, TDAC_MAX};
use crate::retry::WaitOutcome;

/// Write the desired trim codes, bracketed by the front end's update hooks.
///
/// Only columns that differ from the written cache are sent unless `force` is
/// set. The end hook runs even if a column write fails. The cache is updated
/// only when every column was written.
pub(crate) fn write_tdacs<F: Frontend>(
    frontend: &mut F,
    state: &mut TdacState,
    force: bool,
) -> Result<WaitOutcome, Error> {
    let columns: Vec<usize> = if force {
        (0..COLUMNS).collect()
    } else {
        state.desired.changed_columns(&state.written)
    };
    debug!(?columns, force, "write trim columns");
    frontend.begin_tdac_update()?;
    let written = write_columns(frontend, state, &columns);
    let ended = frontend.end_tdac_update();
    let outcome = written?;
    ended?;
    state.written = state.desired.clone();
    Ok(outcome)
}

fn write_columns<F: Frontend>(
    frontend: &mut F,
    state: &TdacState,
    columns: &[usize],
) -> Result<WaitOutcome, Error> {
    let mut outcome = WaitOutcome::Done;
    for &column in columns {
        let commit = frontend.write_tdac_column(column, &state.desired.column_codes(column))?;
        if commit.is_timeout() {
            outcome = commit;
        }
    }
    Ok(outcome)
}

impl<F: Frontend> Tuner<'_, F> {
    /// Find the lowest trim code at which the selected pixels fire on noise.
    ///
    /// Steps the code of every selected pixel from 0 up to 15, measuring with
    /// `exposure` seconds at the current threshold. At the first code giving
    /// more than `count_threshold` words the code below it is written back and
    /// returned. If that happens at code 0 there is nothing below it; 0 stays
    /// applied and `#found tdac -1` is logged.
    pub fn find_tdac(
        &mut self,
        count_threshold: usize,
        exposure: f64,
    ) -> Result<TdacOutcome, Error> {
        self.log.command(&format!("find_tdac {exposure:.6}"))?;
        self.settings.exposure = exposure;
        let pixels = self.settings.pixel_config.pixels.clone();
        for code in 0..=TDAC_MAX {
            if self.cancelled() {
                return Ok(TdacOutcome::Cancelled);
            }
            for &pixel in &pixels {
                self.tdacs.desired.set(pixel, code)?;
            }
            self.program_tdacs(false)?;
            self.log.tdacs(&self.tdacs.desired)?;
            self.apply_pixel_config()?;
            self.log.pixels(&self.settings.pixel_config, &[])?;

            let stats = self.measure()?;
            self.record(self.settings.th, &stats)?;
            if stats.count_all > count_threshold {
                if code == 0 {
                    self.log.found_tdac(Some(-1))?;
                    return Ok(TdacOutcome::Floor);
                }
                let found = code - 1;
                for &pixel in &pixels {
                    self.tdacs.desired.set(pixel, found)?;
                }
                self.program_tdacs(false)?;
                self.log.tdacs(&self.tdacs.desired)?;
                self.log.found_tdac(Some(i32::from(found)))?;
                return Ok(TdacOutcome::Found(found));
            }
        }
        self.log.found_tdac(None)?;
        Ok(TdacOutcome::OutOfRange)
    }
}
