use thiserror::Error;

/// Reasons an adaptive integration stops short of its final time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntegrationError {
    #[error("Step budget of {max_steps} exhausted at t = {t:e} before reaching t = {t_end:e}.")]
    StepBudgetExhausted { max_steps: usize, t: f64, t_end: f64 },

    #[error("Required step size {step:e} is below the floating-point spacing at t = {t:e}.")]
    StepSizeUnderflow { t: f64, step: f64 },

    #[error("Sample times must be finite, non-decreasing and start at or after t0.")]
    InvalidSampleTimes,

    #[error("State dimension mismatch. Expected {expected}, got {got}.")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Failure of a single sweep work unit. Never aborts the sweep.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PointFailure {
    #[error("Integration failed: {0}")]
    Integration(#[from] IntegrationError),

    #[error("Worker panicked: {0}")]
    Panicked(String),
}
