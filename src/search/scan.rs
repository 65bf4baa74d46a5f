use super::{Probe, Tuner, grid};
use crate::Error;
use crate::frontend::Frontend;

impl<F: Frontend> Tuner<'_, F> {
    /// Measure once at every threshold of the grid `start, start + step, …`
    /// short of `stop`.
    ///
    /// Records are logged against the threshold read back from the chip. Stops
    /// early, returning what was measured so far, if cancelled.
    pub fn scan_th(&mut self, start: f64, stop: f64, step: f64) -> Result<Vec<Probe>, Error> {
        self.log
            .command(&format!("scan_th {start:.6} {stop:.6} {step:.6}"))?;
        let mut probes = Vec::new();
        for target in grid(start, stop, step) {
            if self.cancelled() {
                break;
            }
            self.program_threshold(target)?;
            let th = self.frontend.threshold_voltage()?;
            let stats = self.measure()?;
            self.record(th, &stats)?;
            probes.push(Probe {
                parameter: th,
                stats,
            });
        }
        Ok(probes)
    }

    /// Measure `n` times at the current settings, logging each record against
    /// its index.
    pub fn spectrum(&mut self, n: usize) -> Result<Vec<Probe>, Error> {
        self.log.command(&format!("spectrum {n}"))?;
        let mut probes = Vec::with_capacity(n);
        for i in 0..n {
            if self.cancelled() {
                break;
            }
            let stats = self.measure()?;
            self.record(i as f64, &stats)?;
            probes.push(Probe {
                parameter: i as f64,
                stats,
            });
        }
        Ok(probes)
    }
}
