//! Reduction of a measurement to hit statistics.

use crate::frontend::SampleBatch;

/// Statistics of one measurement.
///
/// `mean` and `stddev` are over the good samples only and are `NaN` when there
/// are none; callers log them as they are.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseStats {
    /// Mean of the good payloads.
    pub mean: f64,
    /// Population standard deviation of the good payloads.
    pub stddev: f64,
    /// Number of payloads above the noise floor.
    pub count_good: usize,
    /// Number of words in the batch.
    pub count_all: usize,
    /// The good payloads, in capture order.
    pub good: Vec<u16>,
}

/// Keep the payloads above `smallhit` and compute their statistics.
pub fn analyze(batch: &SampleBatch, smallhit: u16) -> ResponseStats {
    let good: Vec<u16> = batch.payloads().filter(|&p| p > smallhit).collect();
    let n = good.len() as f64;
    let mean = good.iter().map(|&p| f64::from(p)).sum::<f64>() / n;
    let variance = good
        .iter()
        .map(|&p| (f64::from(p) - mean).powi(2))
        .sum::<f64>()
        / n;
    ResponseStats {
        mean,
        stddev: variance.sqrt(),
        count_good: good.len(),
        count_all: batch.len(),
        good,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_bits_are_masked() {
        // 0x0A_0C8 -> payload 0xC8 = 200
        let batch = SampleBatch(vec![0x0A0C8, 0xFF064, 0x0012C]);
        let stats = analyze(&batch, 100);
        assert_eq!(stats.count_all, 3);
        assert_eq!(stats.count_good, 2);
        assert_eq!(stats.good, vec![200, 300]);
        assert_eq!(stats.mean, 250.0);
        assert_eq!(stats.stddev, 50.0);
    }

    #[test]
    fn everything_below_floor_gives_nan() {
        let batch = SampleBatch(vec![5, 100, 0x7000 | 99]);
        let stats = analyze(&batch, 100);
        assert_eq!(stats.count_good, 0);
        assert_eq!(stats.count_all, 3);
        assert!(stats.mean.is_nan());
        assert!(stats.stddev.is_nan());
    }

    #[test]
    fn empty_batch() {
        let stats = analyze(&SampleBatch::default(), 100);
        assert_eq!((stats.count_good, stats.count_all), (0, 0));
        assert!(stats.mean.is_nan());
    }

    #[test]
    fn count_all_never_below_count_good() {
        for floor in [0u16, 1, 50, 4095] {
            let batch = SampleBatch((0..200).map(|i| i * 37).collect());
            let stats = analyze(&batch, floor);
            assert!(stats.count_all >= stats.count_good);
        }
    }
}
