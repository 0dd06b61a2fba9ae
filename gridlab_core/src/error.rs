//! Error taxonomy for the Virtual Lab core.

use gridlab_env::{EnvError, RunId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lifecycle::LifecyclePhase;

/// Errors returned by the lab core.
///
/// Everything except the topology integrity errors is recoverable and
/// leaves the controller's state untouched.
#[derive(Debug, Error)]
pub enum LabError {
    /// Topology data is corrupt: an edge points at a node that does not exist
    #[error("Edge #{edge_index} ({from_node} -> {to_node}) references unknown node '{missing}'")]
    DanglingEdgeReference {
        edge_index: usize,
        from_node: String,
        to_node: String,
        missing: String,
    },

    /// Topology data is corrupt: two nodes share an id
    #[error("Duplicate node id '{id}' in topology")]
    DuplicateNodeId { id: String },

    /// A run is already in flight (running or injected)
    #[error("A run is already in progress (phase: {phase})")]
    RunAlreadyInProgress { phase: LifecyclePhase },

    /// The operation is not allowed from the current phase
    #[error("Cannot {operation} while {from}")]
    InvalidTransition {
        from: LifecyclePhase,
        operation: &'static str,
    },

    /// An inference ticket outlived the run that issued it
    #[error("Inference for run {ticket} is stale (current run: {})", .current.map(|id| id.to_string()).unwrap_or_else(|| "none".to_string()))]
    StaleInference {
        ticket: RunId,
        current: Option<RunId>,
    },

    /// A node id that is not part of the snapshot
    #[error("Unknown node: {0}")]
    UnknownNode(String),

    /// Rejected configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The inference engine failed
    #[error("Inference engine error: {0}")]
    Inference(#[from] EnvError),
}

impl LabError {
    /// True for errors caused by corrupt topology data.
    pub fn is_integrity_violation(&self) -> bool {
        matches!(
            self,
            LabError::DanglingEdgeReference { .. } | LabError::DuplicateNodeId { .. }
        )
    }
}

/// An inference entry that named a node absent from the snapshot.
///
/// Expected under partial observability, so it is reported and logged
/// rather than returned as an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnknownInferenceTarget {
    pub node_id: String,
}

impl std::fmt::Display for UnknownInferenceTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "inference result names unknown node '{}'", self.node_id)
    }
}
