//! Discrete-sample peak detection on the diode-voltage channel.
//!
//! A peak is a sample strictly greater than both neighbours. Coarse sampling can
//! merge or miss closely spaced maxima, and a flat top of equal samples is not a
//! peak; both are accepted approximations. Rounding to a fixed number of
//! decimals collapses numerically-noisy repeats of the same attractor value, so a
//! period-N orbit shows up as N representatives.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakSettings {
    /// Smallest peak value kept (V).
    pub threshold: f64,
    /// Decimal places peak values are rounded to before deduplication.
    pub decimals: u32,
}

impl Default for PeakSettings {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            decimals: 4,
        }
    }
}

impl PeakSettings {
    pub fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() {
            bail!("Peak threshold must be finite.");
        }
        if self.decimals > 15 {
            bail!("Peak precision beyond 15 decimals exceeds f64 resolution.");
        }
        Ok(())
    }
}

/// Rounds half-to-even at `decimals` places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round_ties_even() / scale
}

/// Indices of samples strictly greater than both neighbours. End samples never qualify.
pub fn local_maxima(series: &[f64]) -> Vec<usize> {
    series
        .windows(3)
        .enumerate()
        .filter(|(_, w)| w[1] > w[0] && w[1] > w[2])
        .map(|(i, _)| i + 1)
        .collect()
}

/// Contiguous run of peak values, used to count attractor branches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakBranch {
    pub low: f64,
    pub high: f64,
    pub count: usize,
}

/// Distinct rounded peak values, ascending.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PeakSet {
    values: Vec<f64>,
}

impl PeakSet {
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.values
    }

    /// Groups peak values into branches: consecutive values at most `tolerance`
    /// apart share a branch.
    pub fn branches(&self, tolerance: f64) -> Vec<PeakBranch> {
        let mut branches: Vec<PeakBranch> = Vec::new();
        for &value in &self.values {
            match branches.last_mut() {
                Some(branch) if value - branch.high <= tolerance => {
                    branch.high = value;
                    branch.count += 1;
                }
                _ => branches.push(PeakBranch {
                    low: value,
                    high: value,
                    count: 1,
                }),
            }
        }
        branches
    }
}

impl FromIterator<f64> for PeakSet {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut values: Vec<f64> = iter.into_iter().filter(|v| !v.is_nan()).collect();
        values.sort_by(f64::total_cmp);
        values.dedup();
        Self { values }
    }
}

/// Peak values of `series` at or above the threshold, rounded and deduplicated.
pub fn extract_peaks(series: &[f64], settings: &PeakSettings) -> PeakSet {
    local_maxima(series)
        .into_iter()
        .map(|i| series[i])
        .filter(|&value| value >= settings.threshold)
        .map(|value| round_to(value, settings.decimals))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{extract_peaks, local_maxima, round_to, PeakSet, PeakSettings};

    fn alternating_series(cycles: usize, noise: f64) -> Vec<f64> {
        let mut series = vec![0.0];
        for cycle in 0..cycles {
            let jitter = if cycle % 3 == 0 { noise } else { -noise };
            series.extend([0.4, 1.2045 + jitter, 0.3, -0.7, 0.2, 0.8123 - jitter, 0.1, -0.5]);
        }
        series
    }

    #[test]
    fn period_two_signal_yields_two_values() {
        let peaks = extract_peaks(&alternating_series(40, 2e-5), &PeakSettings::default());
        assert_eq!(peaks.values(), &[0.8123, 1.2045]);
    }

    #[test]
    fn extraction_is_idempotent() {
        let series = alternating_series(10, 1e-5);
        let settings = PeakSettings::default();
        let first = extract_peaks(&series, &settings);
        let second = extract_peaks(&series, &settings);
        assert_eq!(first, second);
    }

    #[test]
    fn threshold_is_inclusive_and_filters_small_peaks() {
        let series = [0.0, 0.1, 0.0, 0.05, 0.0, 0.3, 0.0];
        let peaks = extract_peaks(&series, &PeakSettings::default());
        assert_eq!(peaks.values(), &[0.1, 0.3]);
    }

    #[test]
    fn quiet_series_has_no_peaks() {
        let settings = PeakSettings::default();
        let small: Vec<f64> = (0..500).map(|i| 0.05 * (i as f64 * 0.3).sin()).collect();
        assert!(extract_peaks(&small, &settings).is_empty());
        assert!(extract_peaks(&[], &settings).is_empty());
        assert!(extract_peaks(&[1.0, 2.0], &settings).is_empty());
    }

    #[test]
    fn endpoints_and_plateaus_are_not_peaks() {
        assert!(local_maxima(&[5.0, 1.0, 5.0]).is_empty());
        assert!(local_maxima(&[1.0, 2.0, 3.0, 4.0]).is_empty());
        assert!(local_maxima(&[0.0, 1.0, 1.0, 0.0]).is_empty());
        assert_eq!(local_maxima(&[0.0, 1.0, 0.5, 2.0, 1.0]), vec![1, 3]);
        assert!(local_maxima(&[0.0, f64::NAN, 0.0]).is_empty());
    }

    #[test]
    fn rounding_is_half_to_even() {
        assert_eq!(round_to(2.5, 0), 2.0);
        assert_eq!(round_to(3.5, 0), 4.0);
        assert_eq!(round_to(1.23456, 2), 1.23);
        assert_eq!(round_to(-0.75, 1), -0.8);
    }

    #[test]
    fn coarser_precision_merges_nearby_peaks() {
        let series = [0.0, 0.81, 0.0, 0.84, 0.0];
        let fine = extract_peaks(&series, &PeakSettings::default());
        assert_eq!(fine.len(), 2);
        let coarse = extract_peaks(
            &series,
            &PeakSettings {
                decimals: 1,
                ..PeakSettings::default()
            },
        );
        assert_eq!(coarse.values(), &[0.8]);
    }

    #[test]
    fn branches_split_on_gaps_wider_than_tolerance() {
        let peaks: PeakSet = [0.65, 0.5, 0.503, 0.501, 0.6505, 0.5].into_iter().collect();
        assert_eq!(peaks.len(), 5);
        let branches = peaks.branches(0.01);
        assert_eq!(branches.len(), 2);
        assert_eq!((branches[0].low, branches[0].high, branches[0].count), (0.5, 0.503, 3));
        assert_eq!((branches[1].low, branches[1].high, branches[1].count), (0.65, 0.6505, 2));
        assert!(PeakSet::default().branches(0.01).is_empty());
    }

    #[test]
    fn settings_validation() {
        assert!(PeakSettings::default().validate().is_ok());
        let bad = PeakSettings {
            threshold: f64::INFINITY,
            ..PeakSettings::default()
        };
        assert!(bad.validate().is_err());
        let bad = PeakSettings {
            decimals: 16,
            ..PeakSettings::default()
        };
        assert!(bad.validate().is_err());
    }
}
