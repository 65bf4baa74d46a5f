use tracing::debug;

use super::{SearchOutcome, Tuner, grid};
use crate::Error;
use crate::frontend::Frontend;

const MEDIUM_STEP: f64 = 0.005;
const FINE_STEP: f64 = 0.001;
/// Good hits needed at the fine step to call the noise edge.
const FINE_HITS: usize = 5;

/// Stages of the noise search, from coarse to fine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Coarse walk with the caller's step.
    First,
    /// Coarse walk repeated with half the step after a silent first pass.
    Again,
    /// 5 mV steps.
    Medium,
    /// 5 mV steps with ten times the exposure.
    LongExposure,
    /// 1 mV steps with the long exposure.
    Fine,
}

impl Phase {
    fn is_coarse(self) -> bool {
        matches!(self, Phase::First | Phase::Again)
    }
}

impl<F: Frontend> Tuner<'_, F> {
    /// Find the highest threshold at which the pixels fire on noise alone.
    ///
    /// Any word in the FIFO counts as a response. A response at the head of a
    /// grid means the walk started too low and the grid is moved up; a response
    /// further down switches to the next finer phase, restarting a few steps
    /// above it. If the whole first coarse grid is silent it is walked once
    /// more with half the step. In the fine phase a probe past the head with
    /// more than 5 good hits is the answer, logged as `#noise th`.
    ///
    /// The exposure starts at `exposure` seconds and is raised tenfold for the
    /// last two phases; `settings.exposure` is left at the last value used.
    /// Records are logged against the programmed threshold.
    pub fn find_noise(
        &mut self,
        start: f64,
        stop: f64,
        step: f64,
        exposure: f64,
    ) -> Result<SearchOutcome, Error> {
        self.log.command(&format!("find_noise {step:.6}"))?;
        let mut step = step;
        let mut thresholds = grid(start, stop, step);
        self.settings.exposure = exposure;
        let mut phase = Phase::First;
        let mut i = 0;
        let mut last = None;
        while i < thresholds.len() {
            if self.cancelled() {
                return Ok(SearchOutcome::Cancelled { last });
            }
            let th = thresholds[i];
            self.program_threshold(th)?;
            last = Some(th);
            let stats = self.measure()?;
            self.record(th, &stats)?;

            let hit = stats.count_all != 0;
            let head = i == 0;
            if hit && phase.is_coarse() && head {
                debug!(?phase, th, "go back");
                thresholds = grid(th - 10.0 * step, stop, step);
            } else if phase == Phase::First && i == thresholds.len() - 1 {
                step *= 0.5;
                thresholds = grid(start, stop, step);
                phase = Phase::Again;
                i = 0;
                debug!(?phase, step);
            } else if hit && phase.is_coarse() {
                phase = Phase::Medium;
                step = -MEDIUM_STEP;
                thresholds = grid(th - 9.0 * step, stop, step);
                i = 0;
                debug!(?phase, th);
            } else if hit && phase == Phase::Medium && head {
                debug!(?phase, th, "go back");
                thresholds = grid(th - 9.0 * step, stop, step);
            } else if hit && phase == Phase::Medium {
                phase = Phase::LongExposure;
                self.settings.exposure = exposure * 10.0;
                thresholds = grid(th - 9.0 * step, stop, step);
                i = 0;
                debug!(?phase, th, exposure = self.settings.exposure);
            } else if hit && phase == Phase::LongExposure && head {
                debug!(?phase, th, "go back");
                thresholds = grid(th - 9.0 * step, stop, step);
            } else if hit && phase == Phase::LongExposure {
                phase = Phase::Fine;
                step = -FINE_STEP;
                thresholds = grid(th - 4.0 * step, stop, step);
                i = 0;
                debug!(?phase, th);
            } else if phase == Phase::Fine && !head && stats.count_good > FINE_HITS {
                self.log.noise_threshold(th)?;
                return Ok(SearchOutcome::Found { threshold: th });
            } else {
                i += 1;
            }
        }
        Ok(SearchOutcome::Exhausted { last })
    }
}
