//! GridLab Core - state engine of the power-grid security Virtual Lab.
//!
//! The core owns a run of the lab from topology load to settled metrics:
//! 1. **Graph Model**: immutable cyber-physical snapshots of the grid
//! 2. **Inference Adapter**: folds model verdicts into a new snapshot
//! 3. **Lifecycle Controller**: idle → running → injected → settled
//! 4. **Metrics Aggregator**: before/after counts, deltas and health indicators
//! 5. **Shared State**: whole-view publication to any number of readers

pub mod attack;
pub mod config;
pub mod error;
pub mod graph;
pub mod inference;
pub mod lifecycle;
pub mod metrics;
pub mod session;

// Re-export key types for convenience
pub use attack::{mitigations, AttackSpec};
pub use config::{InferencePolicy, LabConfig, StatusThresholds};
pub use error::{LabError, UnknownInferenceTarget};
pub use graph::{
    EdgeKind, EdgeSpec, GridEdge, GridNode, GridSnapshot, NodeKind, NodeSpec, NodeStatus,
    TopologyDescriptor,
};
pub use inference::{build_request, InferenceAdapter, InferenceReport};
pub use lifecycle::{EventKind, LabController, LabEvent, LifecyclePhase, PendingInference};
pub use metrics::{
    compare, compute_metrics, DetectionStats, HealthBand, HealthIndicators, LabMetrics,
    MetricsDelta, RunMetrics,
};
pub use session::{view_or_default, LabHandle, LabView};
