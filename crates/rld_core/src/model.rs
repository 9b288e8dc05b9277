//! Second-order model of the diode junction voltage under sinusoidal drive.
//!
//! The loop equation `Vs = v_d + R (i_D + Cj dv_d) + L d(i_D + Cj dv_d)/dt`
//! is solved for `d2v_d`, with the Shockley diode law for `i_D`.

use crate::params::CircuitParameters;
use crate::traits::DynamicalSystem;
use serde::{Deserialize, Serialize};

/// Interval the diode voltage is clamped to before exponentiation.
/// Keeps `exp` finite for any state the integrator may probe.
pub const DIODE_VOLTAGE_CLAMP: (f64, f64) = (-100.0, 1.5);

/// Integration variable: diode voltage and its time derivative.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct State {
    pub voltage: f64,
    pub slope: f64,
}

impl State {
    pub const ZERO: State = State {
        voltage: 0.0,
        slope: 0.0,
    };

    pub fn new(voltage: f64, slope: f64) -> Self {
        Self { voltage, slope }
    }

    pub fn to_array(self) -> [f64; 2] {
        [self.voltage, self.slope]
    }
}

impl From<[f64; 2]> for State {
    fn from(value: [f64; 2]) -> Self {
        Self::new(value[0], value[1])
    }
}

/// The circuit driven at a fixed amplitude. Coefficients are folded once so the
/// integrator's inner loop only evaluates the exponential and the drive.
#[derive(Debug, Clone, Copy)]
pub struct DrivenDiodeCircuit {
    amplitude: f64,
    omega: f64,
    resistance: f64,
    inductance: f64,
    rc: f64,
    inv_lc: f64,
    saturation_current: f64,
    inv_emission: f64,
}

impl DrivenDiodeCircuit {
    pub fn new(params: &CircuitParameters, amplitude: f64) -> Self {
        let emission = params.emission_voltage();
        Self {
            amplitude,
            omega: params.angular_frequency(),
            resistance: params.resistance,
            inductance: params.inductance,
            rc: params.resistance * params.junction_capacitance,
            inv_lc: 1.0 / (params.inductance * params.junction_capacitance),
            saturation_current: params.saturation_current,
            inv_emission: 1.0 / emission,
        }
    }

    pub fn amplitude(&self) -> f64 {
        self.amplitude
    }

    /// Source voltage `V0 sin(w t)`.
    pub fn drive(&self, t: f64) -> f64 {
        self.amplitude * (self.omega * t).sin()
    }

    pub fn evaluate(&self, t: f64, state: State) -> State {
        let clamped = state
            .voltage
            .clamp(DIODE_VOLTAGE_CLAMP.0, DIODE_VOLTAGE_CLAMP.1);
        let exp_term = (clamped * self.inv_emission).exp();

        let current = self.saturation_current * (exp_term - 1.0);
        let current_rate = self.saturation_current * self.inv_emission * exp_term * state.slope;

        let acceleration = (self.drive(t)
            - state.voltage
            - self.resistance * current
            - self.rc * state.slope
            - self.inductance * current_rate)
            * self.inv_lc;

        State::new(state.slope, acceleration)
    }
}

impl DynamicalSystem<f64> for DrivenDiodeCircuit {
    fn dimension(&self) -> usize {
        2
    }

    fn apply(&self, t: f64, x: &[f64], out: &mut [f64]) {
        let derivative = self.evaluate(t, State::new(x[0], x[1]));
        out[0] = derivative.voltage;
        out[1] = derivative.slope;
    }
}

/// Time derivative of `state` for drive amplitude `amplitude`.
///
/// Never fails: voltages outside the physical range are clamped before the
/// exponential, so the result stays finite for any finite input.
pub fn derivative(t: f64, state: State, amplitude: f64, params: &CircuitParameters) -> State {
    DrivenDiodeCircuit::new(params, amplitude).evaluate(t, state)
}

/// Shockley diode current at voltage `voltage`, with the overflow clamp applied.
pub fn diode_current(voltage: f64, params: &CircuitParameters) -> f64 {
    let clamped = voltage.clamp(DIODE_VOLTAGE_CLAMP.0, DIODE_VOLTAGE_CLAMP.1);
    params.saturation_current * ((clamped / params.emission_voltage()).exp() - 1.0)
}
