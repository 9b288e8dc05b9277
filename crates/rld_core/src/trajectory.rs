//! Steady-state trajectories of the driven circuit.
//!
//! Every run starts from rest at `t = 0`, integrates through a transient of
//! whole forcing periods, and samples only the observation window that follows.

use crate::error::IntegrationError;
use crate::model::{DrivenDiodeCircuit, State};
use crate::params::CircuitParameters;
use crate::solvers::{AdaptiveSettings, DormandPrince45, IntegrationStats};
use crate::util::linspace;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrajectorySettings {
    /// Forcing periods integrated and discarded before sampling.
    pub transient_periods: u32,
    /// Forcing periods covered by the observation window.
    pub steady_periods: u32,
    /// Uniform samples across the observation window, both ends included.
    pub samples: usize,
    pub integrator: AdaptiveSettings,
}

impl Default for TrajectorySettings {
    fn default() -> Self {
        Self {
            transient_periods: 400,
            steady_periods: 500,
            samples: 15_000,
            integrator: AdaptiveSettings::default(),
        }
    }
}

impl TrajectorySettings {
    pub fn validate(&self) -> Result<()> {
        if self.steady_periods == 0 {
            bail!("steady_periods must be greater than zero.");
        }
        if self.samples < 3 {
            bail!("At least three samples are needed to locate a peak.");
        }
        self.integrator.validate()
    }
}

/// Start and end time of the sampled window.
pub fn observation_window(params: &CircuitParameters, settings: &TrajectorySettings) -> (f64, f64) {
    let transient_end = f64::from(settings.transient_periods) / params.frequency;
    let steady_end = transient_end + f64::from(settings.steady_periods) / params.frequency;
    (transient_end, steady_end)
}

pub fn sample_times(params: &CircuitParameters, settings: &TrajectorySettings) -> Vec<f64> {
    let (start, end) = observation_window(params, settings);
    linspace(start, end, settings.samples)
}

/// Uniformly sampled states over the observation window of one amplitude.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    amplitude: f64,
    times: Vec<f64>,
    voltage: Vec<f64>,
    slope: Vec<f64>,
    stats: IntegrationStats,
}

impl Trajectory {
    pub fn amplitude(&self) -> f64 {
        self.amplitude
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// The diode-voltage channel, the input of peak extraction.
    pub fn diode_voltage(&self) -> &[f64] {
        &self.voltage
    }

    pub fn slope(&self) -> &[f64] {
        &self.slope
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn state(&self, index: usize) -> Option<State> {
        Some(State::new(*self.voltage.get(index)?, *self.slope.get(index)?))
    }

    pub fn samples(&self) -> impl Iterator<Item = (f64, State)> + '_ {
        self.times
            .iter()
            .zip(self.voltage.iter().zip(&self.slope))
            .map(|(&t, (&v, &dv))| (t, State::new(v, dv)))
    }

    pub fn stats(&self) -> IntegrationStats {
        self.stats
    }
}

/// Integrates the circuit at `amplitude` from rest and returns the observation window.
pub fn simulate_trajectory(
    amplitude: f64,
    params: &CircuitParameters,
    settings: &TrajectorySettings,
) -> Result<Trajectory, IntegrationError> {
    let circuit = DrivenDiodeCircuit::new(params, amplitude);
    let times = sample_times(params, settings);
    let mut voltage = Vec::with_capacity(times.len());
    let mut slope = Vec::with_capacity(times.len());

    let stats = DormandPrince45::new(2).integrate(
        &circuit,
        0.0,
        &State::ZERO.to_array(),
        &times,
        &settings.integrator,
        |_, y| {
            voltage.push(y[0]);
            slope.push(y[1]);
        },
    )?;

    tracing::debug!(
        amplitude,
        accepted = stats.accepted,
        rejected = stats.rejected,
        evaluations = stats.evaluations,
        "trajectory integrated"
    );

    Ok(Trajectory {
        amplitude,
        times,
        voltage,
        slope,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::{observation_window, sample_times, simulate_trajectory, TrajectorySettings};
    use crate::error::IntegrationError;
    use crate::params::CircuitParameters;
    use crate::solvers::AdaptiveSettings;
    use approx::assert_relative_eq;

    fn short_settings() -> TrajectorySettings {
        TrajectorySettings {
            transient_periods: 20,
            steady_periods: 10,
            samples: 300,
            ..TrajectorySettings::default()
        }
    }

    fn assert_err_contains<T: std::fmt::Debug>(result: anyhow::Result<T>, needle: &str) {
        let err = result.expect_err("expected error");
        let message = format!("{err}");
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    #[test]
    fn window_spans_whole_forcing_periods() {
        let params = CircuitParameters::reference();
        let settings = TrajectorySettings::default();
        let (start, end) = observation_window(&params, &settings);
        assert_relative_eq!(start, 400.0 / params.frequency, max_relative = 1e-12);
        assert_relative_eq!(end - start, 500.0 / params.frequency, max_relative = 1e-9);

        let times = sample_times(&params, &settings);
        assert_eq!(times.len(), 15_000);
        assert_eq!(times[0], start);
        assert_eq!(times[times.len() - 1], end);
    }

    #[test]
    fn trajectory_covers_only_the_observation_window() {
        let params = CircuitParameters::reference();
        let settings = short_settings();
        let trajectory =
            simulate_trajectory(0.5, &params, &settings).expect("trajectory should integrate");
        let (start, end) = observation_window(&params, &settings);

        assert_eq!(trajectory.len(), settings.samples);
        assert_eq!(trajectory.amplitude(), 0.5);
        assert!(trajectory.times().iter().all(|&t| t >= start && t <= end));
        assert!(trajectory
            .diode_voltage()
            .iter()
            .all(|v| v.is_finite() && v.abs() < 10.0));
        assert_eq!(trajectory.samples().count(), settings.samples);
        assert!(trajectory.stats().accepted > 0);
        let first = trajectory.state(0).expect("first sample");
        assert_eq!(first.voltage, trajectory.diode_voltage()[0]);
        assert!(trajectory.state(settings.samples).is_none());
    }

    #[test]
    fn undriven_circuit_stays_at_rest() {
        let params = CircuitParameters::reference();
        let trajectory = simulate_trajectory(0.0, &params, &short_settings())
            .expect("trajectory should integrate");
        assert!(trajectory
            .samples()
            .all(|(_, state)| state.voltage == 0.0 && state.slope == 0.0));
    }

    #[test]
    fn repeated_runs_are_bitwise_identical() {
        let params = CircuitParameters::reference();
        let settings = short_settings();
        let first = simulate_trajectory(2.5, &params, &settings).expect("first run");
        let second = simulate_trajectory(2.5, &params, &settings).expect("second run");
        assert_eq!(first, second);
    }

    #[test]
    fn exhausted_step_budget_surfaces_as_integration_error() {
        let params = CircuitParameters::reference();
        let settings = TrajectorySettings {
            integrator: AdaptiveSettings {
                max_steps: 10,
                ..AdaptiveSettings::default()
            },
            ..short_settings()
        };
        let result = simulate_trajectory(3.0, &params, &settings);
        assert!(matches!(
            result,
            Err(IntegrationError::StepBudgetExhausted { max_steps: 10, .. })
        ));
    }

    #[test]
    fn settings_validation() {
        let bad = TrajectorySettings {
            steady_periods: 0,
            ..TrajectorySettings::default()
        };
        assert_err_contains(bad.validate(), "steady_periods");
        let bad = TrajectorySettings {
            samples: 2,
            ..TrajectorySettings::default()
        };
        assert_err_contains(bad.validate(), "three samples");
        TrajectorySettings::default()
            .validate()
            .expect("defaults are valid");
    }
}
