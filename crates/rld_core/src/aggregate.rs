//! Flattening of per-amplitude outcomes into bifurcation-diagram pairs.

use crate::sweep::PointOutcome;
use serde::{Deserialize, Serialize};

/// One point of the bifurcation diagram.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BifurcationPoint {
    pub amplitude: f64,
    pub peak: f64,
}

/// An amplitude whose work unit failed, with the rendered reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedPoint {
    pub amplitude: f64,
    pub reason: String,
}

/// Every (amplitude, peak) pair of a sweep, in no guaranteed order.
///
/// The same peak value reported by different amplitudes appears once per
/// amplitude. Failed amplitudes contribute no pairs and are listed in `failures`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SweepResult {
    pub points: Vec<BifurcationPoint>,
    pub failures: Vec<FailedPoint>,
}

impl SweepResult {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points ordered by amplitude, then peak.
    pub fn sorted_points(&self) -> Vec<BifurcationPoint> {
        let mut points = self.points.clone();
        points.sort_by(|a, b| {
            a.amplitude
                .total_cmp(&b.amplitude)
                .then(a.peak.total_cmp(&b.peak))
        });
        points
    }

    /// Ascending peaks reported for exactly `amplitude`.
    pub fn peaks_at(&self, amplitude: f64) -> Vec<f64> {
        let mut peaks: Vec<f64> = self
            .points
            .iter()
            .filter(|p| p.amplitude == amplitude)
            .map(|p| p.peak)
            .collect();
        peaks.sort_by(f64::total_cmp);
        peaks
    }

    /// Distinct amplitudes that contributed at least one point, ascending.
    pub fn amplitudes(&self) -> Vec<f64> {
        let mut amplitudes: Vec<f64> = self.points.iter().map(|p| p.amplitude).collect();
        amplitudes.sort_by(f64::total_cmp);
        amplitudes.dedup();
        amplitudes
    }
}

pub fn aggregate<I>(outcomes: I) -> SweepResult
where
    I: IntoIterator<Item = PointOutcome>,
{
    let mut result = SweepResult::default();
    for PointOutcome { amplitude, result: outcome } in outcomes {
        match outcome {
            Ok(peaks) => result.points.extend(
                peaks
                    .iter()
                    .map(|peak| BifurcationPoint { amplitude, peak }),
            ),
            Err(err) => result.failures.push(FailedPoint {
                amplitude,
                reason: err.to_string(),
            }),
        }
    }
    result
}
