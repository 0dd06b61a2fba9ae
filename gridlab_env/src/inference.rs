//! Inference engine abstraction for the Virtual Lab.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::EnvError;
use crate::types::{AttackType, Classification, NodeLayer, RunId};

/// Per-node feature row handed to the detection model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeFeature {
    pub id: String,
    pub layer: NodeLayer,
    pub anomaly_score: f64,
}

/// Edge row handed to the detection model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeFeature {
    pub source: String,
    pub target: String,
    /// True for cyber-physical coupling links
    pub coupling: bool,
    pub weight: f64,
}

/// The attack injected into the testbed for this request.
///
/// A simulated detector uses it as ground truth; a real model ignores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackProbe {
    pub attack_type: AttackType,
    pub target: String,
    /// Target plus the neighbours the attack spreads to
    pub affected: Vec<String>,
}

/// Feature view of a grid snapshot submitted for inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceRequest {
    pub run_id: RunId,
    pub nodes: Vec<NodeFeature>,
    pub edges: Vec<EdgeFeature>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attack: Option<AttackProbe>,
}

/// Model verdict for a single node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeVerdict {
    /// Anomaly score in [0, 1]
    pub anomaly_score: f64,
    pub classification: Classification,
    /// Model confidence in [0, 1]
    pub confidence: f64,
}

impl NodeVerdict {
    /// Creates a verdict.
    pub fn new(anomaly_score: f64, classification: Classification, confidence: f64) -> Self {
        Self {
            anomaly_score,
            classification,
            confidence,
        }
    }

    /// Creates a malicious verdict.
    pub fn malicious(anomaly_score: f64, confidence: f64) -> Self {
        Self::new(anomaly_score, Classification::Malicious, confidence)
    }

    /// Creates a benign verdict.
    pub fn benign(anomaly_score: f64, confidence: f64) -> Self {
        Self::new(anomaly_score, Classification::Benign, confidence)
    }
}

/// Run-level summary the model reports alongside per-node verdicts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceSummary {
    pub classification: Classification,
    pub probability: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attack_type: Option<AttackType>,
    pub confidence_score: f64,
    pub inference_time_ms: f64,
}

/// Result of one inference call, keyed by node id.
///
/// Coverage may be partial: nodes without monitoring have no entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceResult {
    verdicts: BTreeMap<String, NodeVerdict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    summary: Option<InferenceSummary>,
}

impl InferenceResult {
    /// Creates an empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a verdict, builder style.
    pub fn with_verdict(mut self, node_id: impl Into<String>, verdict: NodeVerdict) -> Self {
        self.insert(node_id, verdict);
        self
    }

    /// Attaches a run-level summary, builder style.
    pub fn with_summary(mut self, summary: InferenceSummary) -> Self {
        self.summary = Some(summary);
        self
    }

    /// Adds or replaces a verdict.
    pub fn insert(&mut self, node_id: impl Into<String>, verdict: NodeVerdict) {
        self.verdicts.insert(node_id.into(), verdict);
    }

    /// Returns the verdict for a node, if the model observed it.
    pub fn get(&self, node_id: &str) -> Option<&NodeVerdict> {
        self.verdicts.get(node_id)
    }

    /// Iterates verdicts in node-id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &NodeVerdict)> {
        self.verdicts.iter().map(|(id, v)| (id.as_str(), v))
    }

    /// Run-level summary, if the model supplied one.
    pub fn summary(&self) -> Option<&InferenceSummary> {
        self.summary.as_ref()
    }

    /// Number of nodes covered.
    pub fn len(&self) -> usize {
        self.verdicts.len()
    }

    /// True when the result covers no nodes.
    pub fn is_empty(&self) -> bool {
        self.verdicts.is_empty()
    }
}

/// Abstraction over the external anomaly-detection model.
///
/// # Implementations
///
/// - **Production**: a client for the deployed GNN service
/// - **Simulation**: `SimulatedDetector` (in `gridlab_sim`), seeded
///
/// # Call Flow
///
/// ```text
/// Controller                 Engine
///   |                           |
///   |-- infer(request) -------->|
///   |   (stays Running)         |-- [model latency] --+
///   |                           |                     |
///   |<------- InferenceResult --|<--------------------+
///   |-- complete_inference      |
/// ```
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    /// Runs the model over a snapshot's features.
    ///
    /// # Returns
    /// * `Ok(result)` - verdicts for some or all nodes
    /// * `Err(EnvError::InferenceFailed)` - the model could not run
    async fn infer(&self, request: InferenceRequest) -> Result<InferenceResult, EnvError>;

    /// Model name for logging.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inference_result_builder() {
        let result = InferenceResult::new()
            .with_verdict("bus2", NodeVerdict::malicious(0.9, 0.95))
            .with_verdict("bus1", NodeVerdict::benign(0.1, 0.8));

        assert_eq!(result.len(), 2);
        assert_eq!(result.get("bus2").map(|v| v.anomaly_score), Some(0.9));
        assert!(result.get("bus9").is_none());

        // Iteration is ordered by node id
        let ids: Vec<&str> = result.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["bus1", "bus2"]);
    }

    #[test]
    fn test_inference_result_insert_replaces() {
        let mut result = InferenceResult::new();
        result.insert("plc1", NodeVerdict::benign(0.1, 0.5));
        result.insert("plc1", NodeVerdict::malicious(0.8, 0.9));

        assert_eq!(result.len(), 1);
        assert_eq!(
            result.get("plc1").map(|v| v.classification),
            Some(Classification::Malicious)
        );
    }

    #[test]
    fn test_empty_result() {
        let result = InferenceResult::new();
        assert!(result.is_empty());
        assert!(result.summary().is_none());
    }
}
