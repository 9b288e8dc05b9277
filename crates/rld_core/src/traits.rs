use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// Floating-point element of a state vector. `Send + Sync` so systems built on
/// it can be shared across sweep workers.
pub trait Scalar: Float + FromPrimitive + Debug + Send + Sync + 'static {}

impl<T: Float + FromPrimitive + Debug + Send + Sync + 'static> Scalar for T {}

/// Right-hand side of a non-autonomous ODE `dx/dt = f(t, x)`.
///
/// Implementations must be pure: the same `(t, x)` always writes the same `out`.
pub trait DynamicalSystem<T: Scalar> {
    /// Length of the state vector.
    fn dimension(&self) -> usize;

    /// Writes `f(t, x)` into `out`. Both slices have length `dimension()`.
    fn apply(&self, t: T, x: &[T], out: &mut [T]);
}
