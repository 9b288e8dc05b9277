//! Parallel sweep over drive amplitudes.
//!
//! Each amplitude is an independent work unit: integrate from rest, extract the
//! steady-state peaks, report. Units share only the read-only configuration, and
//! outcomes are collected in whatever order they complete.

use crate::aggregate::{aggregate, SweepResult};
use crate::config::SweepConfig;
use crate::error::{IntegrationError, PointFailure};
use crate::peaks::{extract_peaks, PeakSet};
use crate::trajectory::simulate_trajectory;
use crate::util::{linspace, panic_payload_to_string};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepSettings {
    /// Worker threads; `None` uses the available CPU parallelism.
    pub workers: Option<usize>,
}

impl SweepSettings {
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == Some(0) {
            bail!("workers must be at least 1.");
        }
        Ok(())
    }
}

/// Evenly spaced amplitudes over `[start, end]`, both ends included.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepDomain {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

impl Default for SweepDomain {
    fn default() -> Self {
        Self {
            start: 1.8,
            end: 5.5,
            count: 400,
        }
    }
}

impl SweepDomain {
    pub fn amplitudes(&self) -> Vec<f64> {
        linspace(self.start, self.end, self.count)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.start.is_finite() && self.end.is_finite()) {
            bail!("Sweep bounds must be finite.");
        }
        if self.count == 0 {
            bail!("Sweep needs at least one amplitude.");
        }
        Ok(())
    }
}

/// What one work unit reported.
#[derive(Debug, Clone, PartialEq)]
pub struct PointOutcome {
    pub amplitude: f64,
    pub result: Result<PeakSet, PointFailure>,
}

/// Schedules independent per-amplitude jobs and collects their outcomes.
///
/// Outcomes come back in completion order; callers must not rely on it.
/// A job that panics is reported as [`PointFailure::Panicked`] for its own
/// amplitude and never takes down the other units.
pub trait Dispatch {
    fn dispatch<F>(&self, amplitudes: &[f64], job: F) -> Vec<PointOutcome>
    where
        F: Fn(f64) -> Result<PeakSet, PointFailure> + Send + Sync + 'static;

    /// Number of units that can run at once.
    fn workers(&self) -> usize;
}

fn run_unit<F>(job: &F, amplitude: f64) -> PointOutcome
where
    F: Fn(f64) -> Result<PeakSet, PointFailure>,
{
    let result = catch_unwind(AssertUnwindSafe(|| job(amplitude)))
        .unwrap_or_else(|payload| Err(PointFailure::Panicked(panic_payload_to_string(payload))));
    PointOutcome { amplitude, result }
}

/// Runs every unit inline on the calling thread, in submission order.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialDispatch;

impl Dispatch for SerialDispatch {
    fn dispatch<F>(&self, amplitudes: &[f64], job: F) -> Vec<PointOutcome>
    where
        F: Fn(f64) -> Result<PeakSet, PointFailure> + Send + Sync + 'static,
    {
        amplitudes
            .iter()
            .map(|&amplitude| run_unit(&job, amplitude))
            .collect()
    }

    fn workers(&self) -> usize {
        1
    }
}

/// Fixed-size rayon pool; outcomes are drained from an unordered channel as
/// units finish, so fast amplitudes never wait behind slow ones.
#[derive(Debug)]
pub struct PooledDispatch {
    pool: rayon::ThreadPool,
    workers: usize,
}

impl PooledDispatch {
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            bail!("Sweep pool needs at least one worker.");
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("sweep-worker-{}", i))
            .build()
            .context("Failed to build sweep worker pool.")?;
        tracing::info!(workers, "Sweep worker pool initialized");
        Ok(Self { pool, workers })
    }

    pub fn from_settings(settings: &SweepSettings) -> Result<Self> {
        settings.validate()?;
        Self::new(settings.worker_count())
    }
}

impl Dispatch for PooledDispatch {
    fn dispatch<F>(&self, amplitudes: &[f64], job: F) -> Vec<PointOutcome>
    where
        F: Fn(f64) -> Result<PeakSet, PointFailure> + Send + Sync + 'static,
    {
        let job = Arc::new(job);
        let (sender, receiver) = crossbeam::channel::unbounded();

        for &amplitude in amplitudes {
            let sender = sender.clone();
            let job = Arc::clone(&job);
            self.pool.spawn(move || {
                // The receiver outlives every unit, so a send can only fail after
                // the caller has stopped listening.
                let _ = sender.send(run_unit(job.as_ref(), amplitude));
            });
        }
        drop(sender);

        let outcomes: Vec<PointOutcome> = receiver.iter().collect();
        if outcomes.len() != amplitudes.len() {
            tracing::warn!(
                submitted = amplitudes.len(),
                reported = outcomes.len(),
                "Some sweep units did not report"
            );
        }
        outcomes
    }

    fn workers(&self) -> usize {
        self.workers
    }
}

/// One work unit: integrate from rest at `amplitude` and extract its peak set.
pub fn simulate_point(amplitude: f64, config: &SweepConfig) -> Result<PeakSet, IntegrationError> {
    let trajectory = simulate_trajectory(amplitude, &config.circuit, &config.trajectory)?;
    Ok(extract_peaks(trajectory.diode_voltage(), &config.peaks))
}

/// Sweeps `amplitudes` through `dispatch` and aggregates every (amplitude, peak) pair.
///
/// Per-unit failures are logged and recorded in the result; only an invalid
/// configuration fails the sweep as a whole.
pub fn run_sweep<D: Dispatch>(
    dispatch: &D,
    amplitudes: &[f64],
    config: &SweepConfig,
) -> Result<SweepResult> {
    config.validate()?;
    if let Some(bad) = amplitudes.iter().find(|a| !a.is_finite()) {
        bail!("Sweep amplitudes must be finite (got {bad}).");
    }

    tracing::info!(
        points = amplitudes.len(),
        workers = dispatch.workers(),
        "Starting amplitude sweep"
    );
    let started = Instant::now();

    let config = *config;
    let outcomes = dispatch.dispatch(amplitudes, move |amplitude| {
        simulate_point(amplitude, &config).map_err(PointFailure::from)
    });

    for outcome in &outcomes {
        if let Err(err) = &outcome.result {
            tracing::warn!(amplitude = outcome.amplitude, error = %err, "Sweep point failed");
        }
    }

    let result = aggregate(outcomes);
    tracing::info!(
        pairs = result.len(),
        failures = result.failures.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Amplitude sweep finished"
    );
    Ok(result)
}

/// Sweeps `amplitudes` on a pool sized by `config.sweep`.
pub fn run_sweep_parallel(amplitudes: &[f64], config: &SweepConfig) -> Result<SweepResult> {
    let dispatch = PooledDispatch::from_settings(&config.sweep)?;
    run_sweep(&dispatch, amplitudes, config)
}

/// Sweeps the amplitudes of `config.domain` in parallel.
pub fn run_configured_sweep(config: &SweepConfig) -> Result<SweepResult> {
    config.domain.validate()?;
    run_sweep_parallel(&config.domain.amplitudes(), config)
}
