//! Simulation run configuration.

use gridlab_core::LabConfig;
use gridlab_env::AttackType;
use serde::{Deserialize, Serialize};

use crate::detector::Observability;
use crate::error::SimError;

/// Settings for one simulated lab run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimConfig {
    /// Master seed; 0 is replaced by a time-derived seed in the CLI
    pub seed: u64,

    /// Preset name (`ieee14`, `ieee30`) or path to a topology JSON file
    pub topology: String,

    pub observability: Observability,

    pub attack: AttackType,

    /// Attack target; `None` picks the scenario default
    pub target: Option<String>,

    /// Base detector latency; actual latency is base + U * base
    pub latency_ms: u64,

    /// Detection rate (percent) a run must reach to pass
    pub min_detection_rate: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            topology: "ieee14".to_string(),
            observability: Observability::Full,
            attack: AttackType::FalseDataInjection,
            target: None,
            latency_ms: 500,
            min_detection_rate: 50.0,
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<(), SimError> {
        if !(0.0..=100.0).contains(&self.min_detection_rate) {
            return Err(SimError::InvalidConfig(format!(
                "min_detection_rate must be in [0, 100], got {}",
                self.min_detection_rate
            )));
        }
        if self.topology.trim().is_empty() {
            return Err(SimError::InvalidConfig("topology must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Loads a lab configuration (thresholds, inference policy) from a JSON file.
pub fn load_lab_config(path: &str) -> Result<LabConfig, SimError> {
    let json = std::fs::read_to_string(path).map_err(|e| SimError::io(path, e))?;
    Ok(LabConfig::from_json_str(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = SimConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.topology, "ieee14");
    }

    #[test]
    fn test_rejects_bad_detection_rate() {
        let config = SimConfig {
            min_detection_rate: 120.0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(SimError::InvalidConfig(_))));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SimConfig = serde_json::from_str(r#"{"seed": 7, "observability": "partial"}"#).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.observability, Observability::Partial);
        assert_eq!(config.latency_ms, 500);
    }

    #[test]
    fn test_missing_lab_config_file() {
        assert!(matches!(
            load_lab_config("/nonexistent/lab.json"),
            Err(SimError::Io { .. })
        ));
    }
}
