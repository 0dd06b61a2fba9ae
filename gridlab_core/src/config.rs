//! Lab configuration: status thresholds and inference policy.

use gridlab_env::NodeVerdict;
use serde::{Deserialize, Serialize};

use crate::error::LabError;
use crate::graph::{clamp_score, NodeStatus};

/// Score thresholds that map an anomaly score to a node status.
///
/// This is the only place a score turns into a status.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusThresholds {
    /// Scores at or above this are `warning`
    pub warning: f64,
    /// Scores at or above this are `critical`
    pub critical: f64,
}

impl Default for StatusThresholds {
    fn default() -> Self {
        Self {
            warning: 0.4,
            critical: 0.7,
        }
    }
}

impl StatusThresholds {
    /// Creates validated thresholds.
    pub fn new(warning: f64, critical: f64) -> Result<Self, LabError> {
        let thresholds = Self { warning, critical };
        thresholds.validate()?;
        Ok(thresholds)
    }

    /// Checks `0 <= warning <= critical <= 1`.
    pub fn validate(&self) -> Result<(), LabError> {
        let ordered = 0.0 <= self.warning && self.warning <= self.critical && self.critical <= 1.0;
        if ordered {
            Ok(())
        } else {
            Err(LabError::InvalidConfig(format!(
                "thresholds must satisfy 0 <= warning ({}) <= critical ({}) <= 1",
                self.warning, self.critical
            )))
        }
    }

    /// Classifies a score.
    pub fn classify(&self, score: f64) -> NodeStatus {
        let score = clamp_score(score);
        if score >= self.critical {
            NodeStatus::Critical
        } else if score >= self.warning {
            NodeStatus::Warning
        } else {
            NodeStatus::Normal
        }
    }
}

/// How inference verdicts are admitted into a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferencePolicy {
    /// Verdicts below this confidence keep the node's prior score.
    /// 0.0 admits every verdict.
    pub min_confidence: f64,
}

impl Default for InferencePolicy {
    fn default() -> Self {
        Self { min_confidence: 0.0 }
    }
}

impl InferencePolicy {
    /// Returns true when the verdict is confident enough to apply.
    pub fn admits(&self, verdict: &NodeVerdict) -> bool {
        clamp_score(verdict.confidence) >= self.min_confidence
    }

    fn validate(&self) -> Result<(), LabError> {
        if (0.0..=1.0).contains(&self.min_confidence) {
            Ok(())
        } else {
            Err(LabError::InvalidConfig(format!(
                "min_confidence {} outside [0, 1]",
                self.min_confidence
            )))
        }
    }
}

/// Top-level configuration for a lab session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabConfig {
    pub thresholds: StatusThresholds,
    pub inference: InferencePolicy,
}

impl LabConfig {
    /// Validates every section.
    pub fn validate(&self) -> Result<(), LabError> {
        self.thresholds.validate()?;
        self.inference.validate()
    }

    /// Parses and validates a JSON document. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, LabError> {
        let config: LabConfig =
            serde_json::from_str(json).map_err(|e| LabError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds_classify() {
        let t = StatusThresholds::default();
        assert_eq!(t.classify(0.0), NodeStatus::Normal);
        assert_eq!(t.classify(0.39), NodeStatus::Normal);
        assert_eq!(t.classify(0.4), NodeStatus::Warning);
        assert_eq!(t.classify(0.69), NodeStatus::Warning);
        assert_eq!(t.classify(0.7), NodeStatus::Critical);
        assert_eq!(t.classify(1.0), NodeStatus::Critical);
    }

    #[test]
    fn test_custom_thresholds() {
        let t = StatusThresholds::new(0.2, 0.5).unwrap();
        assert_eq!(t.classify(0.3), NodeStatus::Warning);
        assert_eq!(t.classify(0.5), NodeStatus::Critical);
    }

    #[test]
    fn test_thresholds_rejects_inverted() {
        assert!(matches!(
            StatusThresholds::new(0.8, 0.5),
            Err(LabError::InvalidConfig(_))
        ));
        assert!(StatusThresholds::new(-0.1, 0.5).is_err());
        assert!(StatusThresholds::new(0.4, 1.5).is_err());
    }

    #[test]
    fn test_policy_default_admits_everything() {
        let policy = InferencePolicy::default();
        assert!(policy.admits(&NodeVerdict::malicious(0.9, 0.0)));
    }

    #[test]
    fn test_policy_min_confidence() {
        let policy = InferencePolicy { min_confidence: 0.6 };
        assert!(!policy.admits(&NodeVerdict::malicious(0.9, 0.5)));
        assert!(policy.admits(&NodeVerdict::malicious(0.9, 0.6)));
    }

    #[test]
    fn test_config_from_json_partial() {
        let config = LabConfig::from_json_str(r#"{ "thresholds": { "critical": 0.8 } }"#).unwrap();
        assert_eq!(config.thresholds.critical, 0.8);
        assert_eq!(config.thresholds.warning, 0.4);
        assert_eq!(config.inference.min_confidence, 0.0);
    }

    #[test]
    fn test_config_from_json_invalid() {
        assert!(LabConfig::from_json_str("not json").is_err());
        assert!(LabConfig::from_json_str(r#"{ "inference": { "min_confidence": 2.0 } }"#).is_err());
    }
}
