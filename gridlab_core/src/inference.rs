//! Inference Result Adapter - folds model verdicts into a new snapshot.
//!
//! The adapter is pure: it reads a snapshot and a result and returns a new
//! snapshot. Status is recomputed here, through [`StatusThresholds`], and
//! nowhere else.

use gridlab_env::{AttackProbe, EdgeFeature, InferenceRequest, InferenceResult, NodeFeature, RunId};
use tracing::{debug, warn};

use crate::config::{InferencePolicy, LabConfig, StatusThresholds};
use crate::error::UnknownInferenceTarget;
use crate::graph::GridSnapshot;

/// Outcome of applying an inference result, with what was skipped.
#[derive(Debug, Clone)]
pub struct InferenceReport {
    /// The derived snapshot
    pub snapshot: GridSnapshot,
    /// Node ids whose score was replaced, in topology order
    pub applied: Vec<String>,
    /// Result entries naming nodes absent from the snapshot
    pub unknown_targets: Vec<UnknownInferenceTarget>,
    /// Node ids whose verdict fell below the confidence floor
    pub low_confidence: Vec<String>,
}

/// Applies inference results under a fixed threshold/policy configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct InferenceAdapter {
    thresholds: StatusThresholds,
    policy: InferencePolicy,
}

impl InferenceAdapter {
    /// Creates an adapter.
    pub fn new(thresholds: StatusThresholds, policy: InferencePolicy) -> Self {
        Self { thresholds, policy }
    }

    /// Creates an adapter from a lab configuration.
    pub fn from_config(config: &LabConfig) -> Self {
        Self::new(config.thresholds, config.inference)
    }

    pub fn thresholds(&self) -> &StatusThresholds {
        &self.thresholds
    }

    pub fn policy(&self) -> &InferencePolicy {
        &self.policy
    }

    /// Returns a new snapshot with the result's scores folded in.
    ///
    /// Nodes without an entry are copied unchanged. Entries for unknown
    /// nodes are logged and ignored.
    pub fn apply(&self, snapshot: &GridSnapshot, result: &InferenceResult) -> GridSnapshot {
        self.apply_reporting(snapshot, result).snapshot
    }

    /// Like [`apply`](Self::apply), also reporting what was skipped.
    pub fn apply_reporting(&self, snapshot: &GridSnapshot, result: &InferenceResult) -> InferenceReport {
        let unknown_targets: Vec<UnknownInferenceTarget> = result
            .iter()
            .filter(|(id, _)| !snapshot.contains(id))
            .map(|(id, _)| UnknownInferenceTarget {
                node_id: id.to_string(),
            })
            .collect();

        for target in &unknown_targets {
            warn!("Ignoring inference entry: {}", target);
        }

        let mut applied = Vec::new();
        let mut low_confidence = Vec::new();

        let nodes = snapshot
            .nodes()
            .iter()
            .map(|node| match result.get(node.id()) {
                Some(verdict) if self.policy.admits(verdict) => {
                    applied.push(node.id().to_string());
                    let next = node.rescored(verdict.anomaly_score, &self.thresholds);
                    if next.status() != node.status() {
                        debug!(
                            "  {} {} -> {} (score {:.3})",
                            node.id(),
                            node.status(),
                            next.status(),
                            next.anomaly_score()
                        );
                    }
                    next
                }
                Some(verdict) => {
                    debug!(
                        "  {} verdict skipped (confidence {:.3} < {:.3})",
                        node.id(),
                        verdict.confidence,
                        self.policy.min_confidence
                    );
                    low_confidence.push(node.id().to_string());
                    node.clone()
                }
                None => node.clone(),
            })
            .collect();

        InferenceReport {
            snapshot: snapshot.with_nodes(nodes),
            applied,
            unknown_targets,
            low_confidence,
        }
    }
}

/// Builds the feature view of a snapshot for the inference engine.
pub fn build_request(snapshot: &GridSnapshot, run_id: RunId, attack: Option<AttackProbe>) -> InferenceRequest {
    InferenceRequest {
        run_id,
        nodes: snapshot
            .nodes()
            .iter()
            .map(|n| NodeFeature {
                id: n.id().to_string(),
                layer: n.layer(),
                anomaly_score: n.anomaly_score(),
            })
            .collect(),
        edges: snapshot
            .edges()
            .iter()
            .map(|e| EdgeFeature {
                source: e.source().to_string(),
                target: e.target().to_string(),
                coupling: e.is_coupling(),
                weight: e.weight(),
            })
            .collect(),
        attack,
    }
}
