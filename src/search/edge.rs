use tracing::debug;

use super::{SearchOutcome, Tuner, grid};
use crate::Error;
use crate::frontend::Frontend;
use crate::settings::RecordFormat;

const COARSE_STEP: f64 = 0.05;
const MEDIUM_STEP: f64 = 0.005;
const FINE_STEP: f64 = 0.001;
/// Tolerance on comparing the current step with the named step sizes.
const STEP_SLACK: f64 = 0.99;

impl<F: Frontend> Tuner<'_, F> {
    /// Find the threshold at which the injected pulses start being seen.
    ///
    /// Walks down from `start` with `step`. The first probe with more than 5
    /// good hits restarts the walk 9 medium steps (5 mV) above it; a probe
    /// seeing more than half of the injections restarts 6 fine steps (1 mV)
    /// above; a fine-step probe seeing more than 60 % of them is the answer.
    ///
    /// The answer is the threshold read back from the chip.
    pub fn find_th(&mut self, start: f64, stop: f64, step: f64) -> Result<SearchOutcome, Error> {
        self.log.command(&format!("find_th {step:.6}"))?;
        let mut step = step;
        let mut thresholds = grid(start, stop, step);
        let mut i = 0;
        let mut last = None;
        while i < thresholds.len() {
            if self.cancelled() {
                return Ok(SearchOutcome::Cancelled { last });
            }
            self.program_threshold(thresholds[i])?;
            let th = self.frontend.threshold_voltage()?;
            last = Some(th);
            let stats = self.measure()?;
            self.log.data(th, &stats, RecordFormat::Summary)?;

            let hits = stats.count_good as f64;
            let repeat = f64::from(self.settings.pulser.repeat);
            if step.abs() > COARSE_STEP * STEP_SLACK && hits > 5.0 {
                debug!(th, "change step to {MEDIUM_STEP}");
                step = -MEDIUM_STEP;
                thresholds = grid(th - 9.0 * step, stop, step);
                i = 0;
            } else if step.abs() > MEDIUM_STEP * STEP_SLACK && hits > 0.5 * repeat {
                debug!(th, "change step to {FINE_STEP}");
                step = -FINE_STEP;
                thresholds = grid(th - 6.0 * step, stop, step);
                i = 0;
            } else if step.abs() > FINE_STEP * STEP_SLACK && hits > 0.6 * repeat {
                return Ok(SearchOutcome::Found { threshold: th });
            } else {
                i += 1;
            }
        }
        Ok(SearchOutcome::Exhausted { last })
    }
}
