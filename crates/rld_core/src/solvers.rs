use crate::error::IntegrationError;
use crate::traits::DynamicalSystem;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

// Dormand-Prince 5(4) tableau.
const C2: f64 = 1.0 / 5.0;
const C3: f64 = 3.0 / 10.0;
const C4: f64 = 4.0 / 5.0;
const C5: f64 = 8.0 / 9.0;

const A21: f64 = 1.0 / 5.0;

const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;

const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;

const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;

const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;

// 5th-order weights (FSAL: k7 is evaluated at the accepted point).
const B1: f64 = 35.0 / 384.0;
const B3: f64 = 500.0 / 1113.0;
const B4: f64 = 125.0 / 192.0;
const B5: f64 = -2187.0 / 6784.0;
const B6: f64 = 11.0 / 84.0;

// Difference between the 5th- and 4th-order solutions.
const E1: f64 = 71.0 / 57600.0;
const E3: f64 = -71.0 / 16695.0;
const E4: f64 = 71.0 / 1920.0;
const E5: f64 = -17253.0 / 339200.0;
const E6: f64 = 22.0 / 525.0;
const E7: f64 = -1.0 / 40.0;

// Continuous extension (Hairer & Wanner, dense output of order 4).
const D1: f64 = -12715105075.0 / 11282082432.0;
const D3: f64 = 87487479700.0 / 32700410799.0;
const D4: f64 = -10690763975.0 / 1880347072.0;
const D5: f64 = 701980252875.0 / 199316789632.0;
const D6: f64 = -1453857185.0 / 822651844.0;
const D7: f64 = 69997945.0 / 29380423.0;

const ERROR_EXPONENT: f64 = -1.0 / 5.0;

/// Error control for [`DormandPrince45`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveSettings {
    pub rtol: f64,
    pub atol: f64,
    /// Upper bound on attempted steps (accepted + rejected) for one integration.
    pub max_steps: usize,
    /// Largest allowed step; `None` leaves the step unbounded.
    pub max_step: Option<f64>,
    /// Initial step; `None` selects one from the local derivative scale.
    pub first_step: Option<f64>,
    pub safety: f64,
    pub min_factor: f64,
    pub max_factor: f64,
}

impl Default for AdaptiveSettings {
    fn default() -> Self {
        Self {
            rtol: 1e-3,
            atol: 1e-6,
            max_steps: 50_000_000,
            max_step: None,
            first_step: None,
            safety: 0.9,
            min_factor: 0.2,
            max_factor: 10.0,
        }
    }
}

impl AdaptiveSettings {
    pub fn validate(&self) -> Result<()> {
        if !(self.rtol.is_finite() && self.rtol > 0.0) {
            bail!("rtol must be positive and finite.");
        }
        if !(self.atol.is_finite() && self.atol > 0.0) {
            bail!("atol must be positive and finite.");
        }
        if self.max_steps == 0 {
            bail!("max_steps must be greater than zero.");
        }
        if let Some(max_step) = self.max_step {
            if !(max_step > 0.0) {
                bail!("max_step must be positive.");
            }
        }
        if let Some(first_step) = self.first_step {
            if !(first_step.is_finite() && first_step > 0.0) {
                bail!("first_step must be positive and finite.");
            }
        }
        if !(self.safety > 0.0 && self.safety <= 1.0) {
            bail!("safety must lie in (0, 1].");
        }
        if !(self.min_factor > 0.0 && self.min_factor <= 1.0 && self.max_factor >= 1.0) {
            bail!("Step factor bounds must satisfy 0 < min_factor <= 1 <= max_factor.");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationStats {
    pub accepted: usize,
    pub rejected: usize,
    pub evaluations: usize,
}

/// Adaptive Dormand-Prince 5(4) integrator with dense output.
///
/// Buffers are sized once for the system dimension and reused across runs.
pub struct DormandPrince45 {
    dim: usize,
    k: [Vec<f64>; 7],
    y: Vec<f64>,
    y_new: Vec<f64>,
    tmp: Vec<f64>,
    sample: Vec<f64>,
}

impl DormandPrince45 {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            k: std::array::from_fn(|_| vec![0.0; dim]),
            y: vec![0.0; dim],
            y_new: vec![0.0; dim],
            tmp: vec![0.0; dim],
            sample: vec![0.0; dim],
        }
    }

    /// Integrates from `(t0, y0)` to the last entry of `sample_times`, handing each
    /// sample to `sink` in order. Samples are evaluated from the continuous
    /// extension, so their placement is independent of where steps land.
    pub fn integrate<S, F>(
        &mut self,
        system: &S,
        t0: f64,
        y0: &[f64],
        sample_times: &[f64],
        settings: &AdaptiveSettings,
        mut sink: F,
    ) -> Result<IntegrationStats, IntegrationError>
    where
        S: DynamicalSystem<f64>,
        F: FnMut(f64, &[f64]),
    {
        if y0.len() != self.dim || system.dimension() != self.dim {
            return Err(IntegrationError::DimensionMismatch {
                expected: self.dim,
                got: y0.len(),
            });
        }
        validate_sample_times(t0, sample_times)?;

        let mut stats = IntegrationStats::default();
        self.y.copy_from_slice(y0);
        let mut t = t0;
        let mut next = 0usize;
        while next < sample_times.len() && sample_times[next] <= t {
            sink(sample_times[next], &self.y);
            next += 1;
        }
        let Some(&t_end) = sample_times.last() else {
            return Ok(stats);
        };
        if next == sample_times.len() {
            return Ok(stats);
        }

        system.apply(t, &self.y, &mut self.k[0]);
        stats.evaluations += 1;

        let mut h = match settings.first_step {
            Some(h) => h,
            None => self.initial_step(system, t, t_end, settings, &mut stats),
        };
        if let Some(max_step) = settings.max_step {
            h = h.min(max_step);
        }
        let mut rejected_last = false;

        loop {
            if stats.accepted + stats.rejected >= settings.max_steps {
                return Err(IntegrationError::StepBudgetExhausted {
                    max_steps: settings.max_steps,
                    t,
                    t_end,
                });
            }
            let min_step = 10.0 * f64::EPSILON * t.abs();
            if !(h > min_step) {
                return Err(IntegrationError::StepSizeUnderflow { t, step: h });
            }

            let (step, t_new) = if t + h >= t_end {
                (t_end - t, t_end)
            } else {
                (h, t + h)
            };

            self.stages(system, t, step, t_new);
            stats.evaluations += 6;
            let err = self.error_norm(step, settings);

            if err <= 1.0 {
                stats.accepted += 1;
                while next < sample_times.len() && sample_times[next] <= t_new {
                    let theta = (sample_times[next] - t) / step;
                    self.interpolate(theta, step);
                    sink(sample_times[next], &self.sample);
                    next += 1;
                }

                t = t_new;
                std::mem::swap(&mut self.y, &mut self.y_new);
                self.k.swap(0, 6);
                if next == sample_times.len() {
                    return Ok(stats);
                }

                let mut factor = if err == 0.0 {
                    settings.max_factor
                } else {
                    (settings.safety * err.powf(ERROR_EXPONENT)).min(settings.max_factor)
                };
                if rejected_last {
                    factor = factor.min(1.0);
                }
                rejected_last = false;
                h = step * factor;
                if let Some(max_step) = settings.max_step {
                    h = h.min(max_step);
                }
            } else {
                stats.rejected += 1;
                // NaN error norms (overflowing trial states) shrink as hard as allowed.
                let factor = if err.is_finite() {
                    (settings.safety * err.powf(ERROR_EXPONENT)).max(settings.min_factor)
                } else {
                    settings.min_factor
                };
                h = step * factor;
                rejected_last = true;
            }
        }
    }

    /// Evaluates stages 2..7 for a step of size `h` from `(t, y)`; `k[0]` must hold f(t, y).
    fn stages<S: DynamicalSystem<f64>>(&mut self, system: &S, t: f64, h: f64, t_new: f64) {
        let n = self.dim;
        let [k1, k2, k3, k4, k5, k6, k7] = &mut self.k;
        let y = &self.y;
        let tmp = &mut self.tmp;

        for i in 0..n {
            tmp[i] = y[i] + h * (A21 * k1[i]);
        }
        system.apply(t + C2 * h, tmp, k2);

        for i in 0..n {
            tmp[i] = y[i] + h * (A31 * k1[i] + A32 * k2[i]);
        }
        system.apply(t + C3 * h, tmp, k3);

        for i in 0..n {
            tmp[i] = y[i] + h * (A41 * k1[i] + A42 * k2[i] + A43 * k3[i]);
        }
        system.apply(t + C4 * h, tmp, k4);

        for i in 0..n {
            tmp[i] = y[i] + h * (A51 * k1[i] + A52 * k2[i] + A53 * k3[i] + A54 * k4[i]);
        }
        system.apply(t + C5 * h, tmp, k5);

        for i in 0..n {
            tmp[i] = y[i]
                + h * (A61 * k1[i] + A62 * k2[i] + A63 * k3[i] + A64 * k4[i] + A65 * k5[i]);
        }
        system.apply(t_new, tmp, k6);

        for i in 0..n {
            self.y_new[i] = y[i]
                + h * (B1 * k1[i] + B3 * k3[i] + B4 * k4[i] + B5 * k5[i] + B6 * k6[i]);
        }
        system.apply(t_new, &self.y_new, k7);
    }

    /// RMS of the embedded error estimate, scaled by `atol + rtol * max(|y|, |y_new|)`.
    fn error_norm(&self, h: f64, settings: &AdaptiveSettings) -> f64 {
        let [k1, _, k3, k4, k5, k6, k7] = &self.k;
        let mut sum = 0.0;
        for i in 0..self.dim {
            let err = h
                * (E1 * k1[i] + E3 * k3[i] + E4 * k4[i] + E5 * k5[i] + E6 * k6[i] + E7 * k7[i]);
            let scale = settings.atol + settings.rtol * self.y[i].abs().max(self.y_new[i].abs());
            let ratio = err / scale;
            sum += ratio * ratio;
        }
        (sum / self.dim as f64).sqrt()
    }

    /// Dense output at `t + theta * h` for the step just computed (before the swap).
    fn interpolate(&mut self, theta: f64, h: f64) {
        let [k1, _, k3, k4, k5, k6, k7] = &self.k;
        let one_minus = 1.0 - theta;
        for i in 0..self.dim {
            let y0 = self.y[i];
            let diff = self.y_new[i] - y0;
            let bspl = h * k1[i] - diff;
            let third = diff - h * k7[i] - bspl;
            let fourth =
                h * (D1 * k1[i] + D3 * k3[i] + D4 * k4[i] + D5 * k5[i] + D6 * k6[i] + D7 * k7[i]);
            self.sample[i] =
                y0 + theta * (diff + one_minus * (bspl + theta * (third + one_minus * fourth)));
        }
    }

    /// Starting step from the local scale of the solution and its derivative.
    fn initial_step<S: DynamicalSystem<f64>>(
        &mut self,
        system: &S,
        t0: f64,
        t_end: f64,
        settings: &AdaptiveSettings,
        stats: &mut IntegrationStats,
    ) -> f64 {
        let interval = t_end - t0;
        let n = self.dim as f64;
        let scale = |value: f64| settings.atol + value.abs() * settings.rtol;

        let mut d0 = 0.0;
        let mut d1 = 0.0;
        for i in 0..self.dim {
            let s = scale(self.y[i]);
            d0 += (self.y[i] / s).powi(2);
            d1 += (self.k[0][i] / s).powi(2);
        }
        let d0 = (d0 / n).sqrt();
        let d1 = (d1 / n).sqrt();

        let h0 = if d0 < 1e-5 || d1 < 1e-5 {
            1e-6
        } else {
            0.01 * d0 / d1
        }
        .min(interval);

        for i in 0..self.dim {
            self.tmp[i] = self.y[i] + h0 * self.k[0][i];
        }
        system.apply(t0 + h0, &self.tmp, &mut self.k[1]);
        stats.evaluations += 1;

        let mut d2 = 0.0;
        for i in 0..self.dim {
            d2 += ((self.k[1][i] - self.k[0][i]) / scale(self.y[i])).powi(2);
        }
        let d2 = (d2 / n).sqrt() / h0;

        let h1 = if d1 <= 1e-15 && d2 <= 1e-15 {
            (h0 * 1e-3).max(1e-6)
        } else {
            (0.01 / d1.max(d2)).powf(1.0 / 5.0)
        };

        (100.0 * h0).min(h1).min(interval)
    }
}

fn validate_sample_times(t0: f64, sample_times: &[f64]) -> Result<(), IntegrationError> {
    if !t0.is_finite() {
        return Err(IntegrationError::InvalidSampleTimes);
    }
    let mut previous = t0;
    for &time in sample_times {
        if !time.is_finite() || time < previous {
            return Err(IntegrationError::InvalidSampleTimes);
        }
        previous = time;
    }
    Ok(())
}
