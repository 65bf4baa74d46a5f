//! The chip operations the tuning searches are built on.

use std::time::Duration;

use crate::Error;
use crate::pixel::{PixelConfig, ROWS};
use crate::retry::WaitOutcome;

/// Raw TDC words from one measurement.
///
/// Each word carries a 12-bit payload in its low bits; the upper bits hold
/// metadata that the analysis ignores.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleBatch(pub Vec<u32>);

impl SampleBatch {
    /// Number of words in the batch.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if the measurement returned nothing.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The 12-bit payload of every word.
    pub fn payloads(&self) -> impl Iterator<Item = u16> + '_ {
        self.0.iter().map(|&word| (word & 0xfff) as u16)
    }
}

impl From<Vec<u32>> for SampleBatch {
    fn from(words: Vec<u32>) -> Self {
        Self(words)
    }
}

/// Blocking access to a CCPDv2 front end, as used by the tuning searches.
///
/// [`Ccpdv2`](crate::Ccpdv2) implements this on top of a [`Board`]; tests can
/// implement it directly with a synthetic response.
///
/// [`Board`]: crate::board::Board
pub trait Frontend {
    /// Set the comparator threshold.
    ///
    /// # Errors
    ///
    /// [`Error::ThresholdOutOfRange`] outside `-0.1..=1.999` V, before anything is
    /// written.
    fn set_threshold_voltage(&mut self, volts: f64) -> Result<(), Error>;

    /// Read the comparator threshold back, in volts.
    fn threshold_voltage(&mut self) -> Result<f64, Error>;

    /// Called before a batch of [`Self::write_tdac_column`] calls.
    fn begin_tdac_update(&mut self) -> Result<(), Error> {
        Ok(())
    }

    /// Commit the trim codes of one pixel column.
    fn write_tdac_column(&mut self, column: usize, codes: &[u8; ROWS])
    -> Result<WaitOutcome, Error>;

    /// Called after a batch of [`Self::write_tdac_column`] calls.
    fn end_tdac_update(&mut self) -> Result<(), Error> {
        Ok(())
    }

    /// Commit the pixel configuration register.
    fn write_config_register(&mut self, config: &PixelConfig) -> Result<WaitOutcome, Error>;

    /// Inject, expose for `exposure` and return the captured TDC words.
    ///
    /// An exposure below 0.1 ms waits for the TDC gate to close instead of
    /// sleeping.
    fn trigger_measurement(&mut self, exposure: Duration) -> Result<SampleBatch, Error>;
}
