//! Threshold and trim searches.
//!
//! A [`Tuner`] borrows a [`Frontend`], the chip settings, the trim state and the
//! run log for the duration of one or more searches. Every probe programs the
//! chip, measures once and appends a record to the run log, so a search can be
//! replayed from the log alone.
//!
//! Searches walk a grid of thresholds built like a half-open `arange`: the
//! values `start + i * step` for `i` in `0..ceil((stop - start) / step)`. A
//! negative step walks down. When a probe sees a response the search rebuilds
//! the grid around it with a finer step and starts again from its head.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::Error;
use crate::analysis::{ResponseStats, analyze};
use crate::frontend::Frontend;
use crate::pixel::TdacMatrix;
use crate::retry::WaitOutcome;
use crate::runlog::RunLog;
use crate::settings::ChipSettings;

mod edge;
mod noise;
mod scan;
mod tdac;

pub(crate) use tdac::write_tdacs;

/// Values `start + i * step` for `i` in `0..ceil((stop - start) / step)`.
///
/// Empty if the step is zero, not finite, or points away from `stop`.
pub fn grid(start: f64, stop: f64, step: f64) -> Vec<f64> {
    let len = ((stop - start) / step).ceil();
    if !len.is_finite() || len <= 0.0 {
        return Vec::new();
    }
    (0..len as usize).map(|i| start + i as f64 * step).collect()
}

/// Shared flag that asks a running search to stop at the next probe.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A token that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every search holding a clone of this token to stop.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether [`Self::cancel`] has been called since the last reset.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Clear the flag so the token can be used again.
    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// One measurement made by a search.
#[derive(Debug, Clone, PartialEq)]
pub struct Probe {
    /// The value the record was logged against (threshold or iteration).
    pub parameter: f64,
    /// What the measurement saw.
    pub stats: ResponseStats,
}

/// How a threshold search ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchOutcome {
    /// The search converged.
    Found {
        /// Threshold at which it converged, in volts.
        threshold: f64,
    },
    /// The grid ran out without converging.
    Exhausted {
        /// Last threshold probed, if any.
        last: Option<f64>,
    },
    /// The search was stopped through its [`CancelToken`].
    Cancelled {
        /// Last threshold probed, if any.
        last: Option<f64>,
    },
}

impl SearchOutcome {
    /// True if the search converged.
    pub fn is_found(&self) -> bool {
        matches!(self, SearchOutcome::Found { .. })
    }

    /// The threshold found, or the last one probed.
    pub fn threshold(&self) -> Option<f64> {
        match *self {
            SearchOutcome::Found { threshold } => Some(threshold),
            SearchOutcome::Exhausted { last } | SearchOutcome::Cancelled { last } => last,
        }
    }
}

/// How a trim search ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TdacOutcome {
    /// The pixels respond from this code up; it has been written back.
    Found(u8),
    /// The pixels already respond at code 0, which stays applied.
    Floor,
    /// The pixels never responded; code 15 stays applied.
    OutOfRange,
    /// The search was stopped through its [`CancelToken`].
    Cancelled,
}

/// Trim codes the session wants on the chip, and what was last written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TdacState {
    /// Codes to be written.
    pub desired: TdacMatrix,
    written: TdacMatrix,
}

impl Default for TdacState {
    fn default() -> Self {
        Self {
            desired: TdacMatrix::default(),
            written: TdacMatrix::unknown(),
        }
    }
}

impl TdacState {
    /// All codes 0, nothing known to be written.
    pub fn new() -> Self {
        Self::default()
    }

    /// Nothing known to be written, `desired` to be written next.
    pub fn with_desired(desired: TdacMatrix) -> Self {
        Self {
            desired,
            written: TdacMatrix::unknown(),
        }
    }

    /// Codes last written to the chip; unknown codes are `-1`.
    pub fn written(&self) -> &TdacMatrix {
        &self.written
    }

    /// Forget what was written, so the next update writes every column.
    pub fn invalidate(&mut self) {
        self.written = TdacMatrix::unknown();
    }
}

/// Runs the threshold and trim searches against a [`Frontend`].
#[derive(Debug)]
pub struct Tuner<'a, F> {
    frontend: &'a mut F,
    settings: &'a mut ChipSettings,
    tdacs: &'a mut TdacState,
    log: &'a mut RunLog,
    cancel: CancelToken,
}

impl<'a, F: Frontend> Tuner<'a, F> {
    /// Borrow everything a search touches.
    ///
    /// Searches change `settings.th` (and `settings.exposure` for the noise and
    /// trim searches) as they go; the values left behind are those last used.
    pub fn new(
        frontend: &'a mut F,
        settings: &'a mut ChipSettings,
        tdacs: &'a mut TdacState,
        log: &'a mut RunLog,
    ) -> Self {
        Self {
            frontend,
            settings,
            tdacs,
            log,
            cancel: CancelToken::new(),
        }
    }

    /// Stop searches when `cancel` is cancelled.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Set the comparator threshold and remember it as the current one.
    ///
    /// Out-of-range values are rejected before anything is written, and the
    /// current threshold is left unchanged.
    pub fn program_threshold(&mut self, volts: f64) -> Result<(), Error> {
        self.frontend.set_threshold_voltage(volts)?;
        self.settings.th = volts;
        Ok(())
    }

    /// Write the desired trim codes.
    ///
    /// Only columns that differ from what was last written are sent unless
    /// `force` is set.
    pub fn program_tdacs(&mut self, force: bool) -> Result<WaitOutcome, Error> {
        write_tdacs(&mut *self.frontend, &mut *self.tdacs, force)
    }

    /// Commit the pixel configuration from the settings.
    pub fn apply_pixel_config(&mut self) -> Result<WaitOutcome, Error> {
        self.frontend.write_config_register(&self.settings.pixel_config)
    }

    fn cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn exposure(&self) -> Duration {
        Duration::try_from_secs_f64(self.settings.exposure).unwrap_or(Duration::ZERO)
    }

    fn measure(&mut self) -> Result<ResponseStats, Error> {
        let batch = self.frontend.trigger_measurement(self.exposure())?;
        Ok(analyze(&batch, self.settings.smallhit))
    }

    fn record(&mut self, parameter: f64, stats: &ResponseStats) -> Result<(), Error> {
        self.log.data(parameter, stats, self.settings.record_format)
    }
}
