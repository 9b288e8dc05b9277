//! The `rld_core` crate computes bifurcation diagrams of a sinusoidally driven
//! resistor-inductor-diode loop.
//!
//! Each drive amplitude is integrated independently from rest, its transient is
//! discarded, and the distinct peaks of the steady-state diode voltage are
//! reported as (amplitude, peak) pairs.
//!
//! Key components:
//! - **Model**: `CircuitParameters` and the `DrivenDiodeCircuit` vector field.
//! - **Solvers**: adaptive Dormand-Prince 5(4) with dense output at requested times.
//! - **Trajectory / Peaks**: observation-window sampling and rounded peak sets.
//! - **Sweep / Aggregate**: parallel per-amplitude dispatch and flattening into a `SweepResult`.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod model;
pub mod params;
pub mod peaks;
pub mod solvers;
pub mod sweep;
pub mod traits;
pub mod trajectory;
mod util;

pub use aggregate::{aggregate, BifurcationPoint, FailedPoint, SweepResult};
pub use config::SweepConfig;
pub use params::{CircuitParameters, REFERENCE_BIFURCATIONS};
pub use peaks::{extract_peaks, PeakSet, PeakSettings};
pub use sweep::{
    run_configured_sweep, run_sweep, run_sweep_parallel, simulate_point, Dispatch,
    PooledDispatch, SerialDispatch,
};
pub use trajectory::{simulate_trajectory, Trajectory, TrajectorySettings};
pub use util::linspace;
