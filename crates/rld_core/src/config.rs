use crate::params::CircuitParameters;
use crate::peaks::PeakSettings;
use crate::sweep::{SweepDomain, SweepSettings};
use crate::trajectory::TrajectorySettings;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Everything a sweep reads. Shared read-only by every work unit.
///
/// Missing fields deserialize to the reference experiment, so a partial
/// document only needs to name what it overrides.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub circuit: CircuitParameters,
    pub trajectory: TrajectorySettings,
    pub peaks: PeakSettings,
    pub sweep: SweepSettings,
    pub domain: SweepDomain,
}

impl SweepConfig {
    pub fn validate(&self) -> Result<()> {
        self.circuit
            .validate()
            .context("Invalid circuit parameters.")?;
        self.trajectory
            .validate()
            .context("Invalid trajectory settings.")?;
        self.peaks.validate().context("Invalid peak settings.")?;
        self.sweep.validate().context("Invalid sweep settings.")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::SweepConfig;
    use crate::params::CircuitParameters;

    #[test]
    fn partial_document_keeps_reference_defaults() {
        let config: SweepConfig = serde_json::from_str(
            r#"{
                "trajectory": { "samples": 3000, "integrator": { "rtol": 1e-6 } },
                "sweep": { "workers": 2 }
            }"#,
        )
        .expect("config should parse");

        assert_eq!(config.circuit, CircuitParameters::reference());
        assert_eq!(config.trajectory.samples, 3000);
        assert_eq!(config.trajectory.transient_periods, 400);
        assert_eq!(config.trajectory.integrator.rtol, 1e-6);
        assert_eq!(config.trajectory.integrator.atol, 1e-6);
        assert_eq!(config.peaks.decimals, 4);
        assert_eq!(config.sweep.workers, Some(2));
        assert_eq!(config.domain.count, 400);
        config.validate().expect("config should be valid");
    }

    #[test]
    fn round_trips_through_json() {
        let config = SweepConfig::default();
        let json = serde_json::to_string(&config).expect("config should serialize");
        let back: SweepConfig = serde_json::from_str(&json).expect("config should parse");
        assert_eq!(config, back);
    }

    #[test]
    fn validation_names_the_offending_section() {
        let mut config = SweepConfig::default();
        config.circuit.inductance = 0.0;
        let message = format!("{:#}", config.validate().expect_err("zero inductance"));
        assert!(message.contains("Invalid circuit parameters"));
        assert!(message.contains("inductance"));

        let mut config = SweepConfig::default();
        config.sweep.workers = Some(0);
        let message = format!("{:#}", config.validate().expect_err("zero workers"));
        assert!(message.contains("Invalid sweep settings"));
    }
}
