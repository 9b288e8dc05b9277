//! Circuit constants for the driven resistor-inductor-diode loop.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Experimentally observed period-doubling thresholds (drive amplitude in volts)
/// paired with the period that appears past each one.
pub const REFERENCE_BIFURCATIONS: [(f64, u32); 6] = [
    (1.915, 2),
    (4.645, 4),
    (5.235, 8),
    (5.365, 16),
    (5.395, 32),
    (5.401, 64),
];

/// Immutable parameter set shared read-only by every sweep worker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitParameters {
    /// Series resistance (Ω).
    pub resistance: f64,
    /// Series inductance (H).
    pub inductance: f64,
    /// Diode junction capacitance (F).
    pub junction_capacitance: f64,
    /// Drive frequency (Hz).
    pub frequency: f64,
    /// Diode reverse saturation current (A).
    pub saturation_current: f64,
    /// Diode ideality factor.
    pub ideality: f64,
    /// Thermal voltage (V).
    pub thermal_voltage: f64,
}

impl Default for CircuitParameters {
    fn default() -> Self {
        Self::reference()
    }
}

impl CircuitParameters {
    /// Parameters of the reference bench circuit.
    pub const fn reference() -> Self {
        Self {
            resistance: 10.0,
            inductance: 0.239e-3,
            junction_capacitance: 30e-12,
            frequency: 376.6e3,
            saturation_current: 2.5e-9,
            ideality: 1.75,
            thermal_voltage: 0.026,
        }
    }

    pub fn angular_frequency(&self) -> f64 {
        2.0 * PI * self.frequency
    }

    /// Duration of one forcing cycle.
    pub fn period(&self) -> f64 {
        1.0 / self.frequency
    }

    /// Slope voltage `n * Vt` of the diode exponential.
    pub fn emission_voltage(&self) -> f64 {
        self.ideality * self.thermal_voltage
    }

    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("resistance", self.resistance),
            ("inductance", self.inductance),
            ("junction_capacitance", self.junction_capacitance),
            ("frequency", self.frequency),
            ("saturation_current", self.saturation_current),
            ("ideality", self.ideality),
            ("thermal_voltage", self.thermal_voltage),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                bail!("Circuit parameter {name} must be finite.");
            }
        }
        // Zero resistance is an undamped loop.
        if self.resistance < 0.0 {
            bail!("Circuit parameter resistance must be non-negative.");
        }
        for (name, value) in &fields[1..] {
            if *value <= 0.0 {
                bail!("Circuit parameter {name} must be positive.");
            }
        }
        Ok(())
    }
}
