//! Simulation Lifecycle Controller - the Virtual Lab state machine.
//!
//! # State Machine
//!
//! ```text
//!            start(topology)             inject_attack(result)
//!   ┌──────┐ ─────────────► ┌─────────┐ ───────────────────► ┌──────────┐
//!   │ Idle │                │ Running │                      │ Injected │
//!   └──────┘ ◄───────────── └─────────┘                      └──────────┘
//!      ▲         cancel()        ▲                                 │
//!      │                         │ start(topology)                 │ settle()
//!      │                         │                                 ▼
//!      │                         │                            ┌─────────┐
//!      └─────────────────────────┴─────────────────────────── │ Settled │
//!                                                             └─────────┘
//! ```
//!
//! While Running, an asynchronous inference may be outstanding
//! (`begin_inference` .. `complete_inference`). During that window the
//! controller stays Running and rejects `start`, `inject_attack` and a second
//! `begin_inference` with `RunAlreadyInProgress`. `cancel()` is still allowed;
//! the late result is then refused as `StaleInference`.
//!
//! Every transition either fully applies or leaves the state unchanged, and
//! ends by publishing a fresh [`LabView`].

use gridlab_env::{InferenceEngine, InferenceRequest, InferenceResult, InferenceSummary, LabContext, RunId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::attack::AttackSpec;
use crate::config::LabConfig;
use crate::error::{LabError, UnknownInferenceTarget};
use crate::graph::{GridSnapshot, TopologyDescriptor};
use crate::inference::{build_request, InferenceAdapter};
use crate::metrics::{compare, RunMetrics};
use crate::session::{LabHandle, LabPublisher, LabView};

/// Phase of the current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecyclePhase {
    /// No run; no snapshots held
    Idle,
    /// `before` captured, waiting for an inference result
    Running,
    /// `after` produced, metrics not yet finalized
    Injected,
    /// Metrics computed; terminal until the next `start`
    Settled,
}

impl std::fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LifecyclePhase::Idle => "idle",
            LifecyclePhase::Running => "running",
            LifecyclePhase::Injected => "injected",
            LifecyclePhase::Settled => "settled",
        };
        write!(f, "{}", name)
    }
}

/// Category of an event log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    StatusChange,
    AttackInjected,
    Detection,
    Mitigation,
}

/// One entry of the run's event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabEvent {
    pub seq: u64,
    /// Milliseconds on the session clock
    pub at_ms: u64,
    pub kind: EventKind,
    pub description: String,
}

/// Ticket for an outstanding inference call.
///
/// Issued by [`LabController::begin_inference`] and redeemed exactly once by
/// `complete_inference` or `abort_inference`.
#[derive(Debug)]
pub struct PendingInference {
    run_id: RunId,
    request: InferenceRequest,
}

impl PendingInference {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Features of the `before` snapshot to hand to the engine.
    pub fn request(&self) -> &InferenceRequest {
        &self.request
    }
}

/// State owned by one run, dropped on cancel or the next start.
#[derive(Debug)]
struct ActiveRun {
    id: RunId,
    before: Arc<GridSnapshot>,
    after: Option<Arc<GridSnapshot>>,
    attack: Option<AttackSpec>,
    affected: Option<Vec<String>>,
    awaiting: bool,
    inference: Option<InferenceSummary>,
    ignored_targets: Vec<UnknownInferenceTarget>,
    metrics: Option<RunMetrics>,
}

impl ActiveRun {
    fn new(id: RunId, before: GridSnapshot) -> Self {
        Self {
            id,
            before: Arc::new(before),
            after: None,
            attack: None,
            affected: None,
            awaiting: false,
            inference: None,
            ignored_targets: Vec::new(),
            metrics: None,
        }
    }
}

/// Owns the lifecycle phase and the snapshots of the current run.
///
/// The controller is the single writer of its session; readers subscribe
/// with [`subscribe`](Self::subscribe).
pub struct LabController {
    ctx: Arc<dyn LabContext>,
    config: LabConfig,
    adapter: InferenceAdapter,
    phase: LifecyclePhase,
    run: Option<ActiveRun>,
    runs_started: u64,
    events: Vec<LabEvent>,
    next_seq: u64,
    publisher: LabPublisher,
}

impl LabController {
    /// Creates an idle controller.
    ///
    /// # Errors
    /// `InvalidConfig` if the thresholds or inference policy are out of range.
    pub fn new(ctx: Arc<dyn LabContext>, config: LabConfig) -> Result<Self, LabError> {
        config.validate()?;
        Ok(Self::build(ctx, config))
    }

    /// Creates an idle controller with default configuration.
    pub fn with_defaults(ctx: Arc<dyn LabContext>) -> Self {
        Self::build(ctx, LabConfig::default())
    }

    fn build(ctx: Arc<dyn LabContext>, config: LabConfig) -> Self {
        Self {
            ctx,
            adapter: InferenceAdapter::from_config(&config),
            config,
            phase: LifecyclePhase::Idle,
            run: None,
            runs_started: 0,
            events: Vec::new(),
            next_seq: 0,
            publisher: LabPublisher::new(),
        }
    }

    // =========================================================================
    // READ ACCESS
    // =========================================================================

    pub fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    pub fn config(&self) -> &LabConfig {
        &self.config
    }

    pub fn run_id(&self) -> Option<RunId> {
        self.run.as_ref().map(|r| r.id)
    }

    /// True while an inference ticket is outstanding.
    pub fn is_awaiting_inference(&self) -> bool {
        self.run.as_ref().is_some_and(|r| r.awaiting)
    }

    pub fn before(&self) -> Option<&Arc<GridSnapshot>> {
        self.run.as_ref().map(|r| &r.before)
    }

    pub fn after(&self) -> Option<&Arc<GridSnapshot>> {
        self.run.as_ref().and_then(|r| r.after.as_ref())
    }

    pub fn metrics(&self) -> Option<&RunMetrics> {
        self.run.as_ref().and_then(|r| r.metrics.as_ref())
    }

    pub fn events(&self) -> &[LabEvent] {
        &self.events
    }

    /// Returns a read-only handle on this session.
    pub fn subscribe(&self) -> LabHandle {
        self.publisher.subscribe()
    }

    /// The currently published view.
    pub fn view(&self) -> Arc<LabView> {
        self.publisher.current()
    }

    // =========================================================================
    // TRANSITIONS
    // =========================================================================

    /// Starts a run: validates the topology and captures `before`.
    ///
    /// Allowed from Idle and Settled. A settled run's snapshots are dropped.
    ///
    /// # Errors
    /// * `RunAlreadyInProgress` - Running or Injected
    /// * `DanglingEdgeReference` / `DuplicateNodeId` - corrupt topology
    pub fn start(&mut self, topology: &TopologyDescriptor) -> Result<RunId, LabError> {
        if matches!(self.phase, LifecyclePhase::Running | LifecyclePhase::Injected) {
            warn!("start rejected: run {:?} is {}", self.run_id(), self.phase);
            return Err(LabError::RunAlreadyInProgress { phase: self.phase });
        }

        let before = GridSnapshot::from_topology(topology, &self.config.thresholds)?;
        let id = self.next_run_id();
        let description = format!(
            "Simulation started with {} topology ({} nodes, {} edges)",
            if topology.name.is_empty() { "custom" } else { topology.name.as_str() },
            before.len(),
            before.edges().len()
        );

        info!("Run {} started: {} nodes, {} edges", id, before.len(), before.edges().len());

        self.run = Some(ActiveRun::new(id, before));
        self.phase = LifecyclePhase::Running;
        self.events.clear();
        self.record(EventKind::StatusChange, description);
        self.publish();
        Ok(id)
    }

    /// Applies an inference result to `before`, producing `after`.
    ///
    /// # Errors
    /// * `RunAlreadyInProgress` - an inference ticket is outstanding
    /// * `InvalidTransition` - not Running
    pub fn inject_attack(&mut self, result: &InferenceResult) -> Result<(), LabError> {
        self.ensure_ready_for_inference("inject an attack")?;
        self.apply_result(result)
    }

    /// Marks the run as awaiting inference and returns the request ticket.
    ///
    /// With an attack spec, the attack and its affected set are recorded for
    /// detection scoring when the run settles.
    ///
    /// # Errors
    /// * `RunAlreadyInProgress` - a ticket is already outstanding
    /// * `InvalidTransition` - not Running
    /// * `UnknownNode` - the attack target is not in the grid
    pub fn begin_inference(&mut self, attack: Option<AttackSpec>) -> Result<PendingInference, LabError> {
        self.ensure_ready_for_inference("begin inference")?;
        let run = self.active_run_mut("begin inference")?;

        let probe = match &attack {
            Some(spec) => Some(spec.probe(&run.before)?),
            None => None,
        };
        let request = build_request(&run.before, run.id, probe.clone());

        run.awaiting = true;
        run.affected = probe.map(|p| p.affected);
        run.attack = attack.clone();
        let run_id = run.id;

        match &attack {
            Some(spec) => {
                info!("Run {}: {} injected", run_id, spec);
                self.record(EventKind::AttackInjected, format!("{} attack injected targeting {}", spec.attack_type, spec.target));
            }
            None => info!("Run {}: inference requested", run_id),
        }
        self.publish();

        Ok(PendingInference { run_id, request })
    }

    /// Redeems a ticket with the engine's result.
    ///
    /// # Errors
    /// `StaleInference` if the run was cancelled or replaced meanwhile.
    pub fn complete_inference(&mut self, pending: PendingInference, result: &InferenceResult) -> Result<(), LabError> {
        self.ensure_ticket(&pending)?;
        self.apply_result(result)
    }

    /// Redeems a ticket without a result (engine failure). Stays Running.
    ///
    /// # Errors
    /// `StaleInference` if the run was cancelled or replaced meanwhile.
    pub fn abort_inference(&mut self, pending: PendingInference) -> Result<(), LabError> {
        self.ensure_ticket(&pending)?;
        if let Some(run) = self.run.as_mut() {
            run.awaiting = false;
            run.attack = None;
            run.affected = None;
        }
        self.record(EventKind::StatusChange, "Inference aborted; run back in running, ready to retry or cancel");
        self.publish();
        Ok(())
    }

    /// Issues an inference request to `engine` and applies the response.
    ///
    /// The controller stays Running for the whole call. If the returned
    /// future is dropped before completion the run stays marked as awaiting
    /// until `cancel()`.
    pub async fn run_attack<E>(&mut self, engine: &E, attack: Option<AttackSpec>) -> Result<(), LabError>
    where
        E: InferenceEngine + ?Sized,
    {
        let pending = self.begin_inference(attack)?;
        debug!("Run {}: submitting {} nodes to {}", pending.run_id, pending.request.nodes.len(), engine.name());

        match engine.infer(pending.request().clone()).await {
            Ok(result) => self.complete_inference(pending, &result),
            Err(e) => {
                warn!("Run {}: inference engine {} failed: {}", pending.run_id, engine.name(), e);
                self.abort_inference(pending)?;
                Err(e.into())
            }
        }
    }

    /// Discards the running run and returns to Idle.
    ///
    /// Allowed only while Running (including while awaiting inference).
    pub fn cancel(&mut self) -> Result<(), LabError> {
        if self.phase != LifecyclePhase::Running {
            return Err(LabError::InvalidTransition {
                from: self.phase,
                operation: "cancel",
            });
        }

        if let Some(run) = self.run.take() {
            info!("Run {} cancelled (awaiting inference: {})", run.id, run.awaiting);
        }
        self.phase = LifecyclePhase::Idle;
        self.record(EventKind::StatusChange, "Simulation cancelled");
        self.publish();
        Ok(())
    }

    /// Computes before/after metrics and moves to Settled.
    pub fn settle(&mut self) -> Result<RunMetrics, LabError> {
        if self.phase != LifecyclePhase::Injected {
            return Err(LabError::InvalidTransition {
                from: self.phase,
                operation: "settle",
            });
        }

        let run = self.active_run_mut("settle")?;
        let Some(after) = run.after.as_ref() else {
            return Err(LabError::InvalidTransition {
                from: LifecyclePhase::Injected,
                operation: "settle",
            });
        };

        let metrics = compare(&run.before, after, run.affected.as_deref());
        run.metrics = Some(metrics.clone());
        let run_id = run.id;

        info!(
            "Run {} settled: critical {} -> {}, warning {} -> {}, avg score {:.3} -> {:.3}",
            run_id,
            metrics.before.critical_count,
            metrics.after.critical_count,
            metrics.before.warning_count,
            metrics.after.warning_count,
            metrics.before.avg_anomaly_score,
            metrics.after.avg_anomaly_score,
        );

        self.phase = LifecyclePhase::Settled;
        self.record(
            EventKind::StatusChange,
            format!(
                "Run settled: security index {:.1}% -> {:.1}%",
                metrics.before_health.security_index, metrics.after_health.security_index
            ),
        );
        self.publish();
        Ok(metrics)
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn next_run_id(&mut self) -> RunId {
        self.runs_started += 1;
        match self.ctx.seed() {
            0 => RunId::new(),
            seed => RunId::from_seed(seed.wrapping_add(self.runs_started)),
        }
    }

    fn active_run_mut(&mut self, operation: &'static str) -> Result<&mut ActiveRun, LabError> {
        let from = self.phase;
        self.run
            .as_mut()
            .ok_or(LabError::InvalidTransition { from, operation })
    }

    fn ensure_ready_for_inference(&self, operation: &'static str) -> Result<(), LabError> {
        match self.phase {
            LifecyclePhase::Running if self.is_awaiting_inference() => {
                warn!("{} rejected: inference already in flight", operation);
                Err(LabError::RunAlreadyInProgress {
                    phase: LifecyclePhase::Running,
                })
            }
            LifecyclePhase::Running => Ok(()),
            from => Err(LabError::InvalidTransition { from, operation }),
        }
    }

    fn ensure_ticket(&self, pending: &PendingInference) -> Result<(), LabError> {
        let current = self.run_id();
        let live = self.phase == LifecyclePhase::Running
            && current == Some(pending.run_id)
            && self.is_awaiting_inference();
        if live {
            Ok(())
        } else {
            warn!("Discarding stale inference for run {}", pending.run_id);
            Err(LabError::StaleInference {
                ticket: pending.run_id,
                current,
            })
        }
    }

    /// Running -> Injected. Callers have checked the phase.
    fn apply_result(&mut self, result: &InferenceResult) -> Result<(), LabError> {
        let adapter = self.adapter;
        let run = self.active_run_mut("inject an attack")?;

        let report = adapter.apply_reporting(&run.before, result);
        run.after = Some(Arc::new(report.snapshot));
        run.ignored_targets = report.unknown_targets;
        run.inference = result.summary().cloned();
        run.awaiting = false;

        let run_id = run.id;
        let attack = run.attack.clone();
        let summary = run.inference.clone();
        let applied = report.applied.len();

        info!(
            "Run {}: inference applied to {} nodes ({} unknown, {} low confidence)",
            run_id,
            applied,
            run.ignored_targets.len(),
            report.low_confidence.len()
        );

        self.phase = LifecyclePhase::Injected;

        let detection = match &summary {
            Some(s) => match s.attack_type {
                Some(attack_type) => format!(
                    "GNN detected {} attack with {:.1}% confidence",
                    attack_type,
                    s.confidence_score * 100.0
                ),
                None => format!("GNN classified grid as {:?} ({} nodes scored)", s.classification, applied),
            },
            None => format!("Inference result applied to {} nodes", applied),
        };
        self.record(EventKind::Detection, detection);

        if let Some(spec) = attack {
            self.record(
                EventKind::Mitigation,
                format!(
                    "{} mitigation steps recommended for {}",
                    spec.mitigations().len(),
                    spec.attack_type.label()
                ),
            );
        }

        self.publish();
        Ok(())
    }

    fn record(&mut self, kind: EventKind, description: impl Into<String>) {
        let event = LabEvent {
            seq: self.next_seq,
            at_ms: self.ctx.now().as_millis() as u64,
            kind,
            description: description.into(),
        };
        debug!("event #{} {:?}: {}", event.seq, event.kind, event.description);
        self.next_seq += 1;
        self.events.push(event);
    }

    fn publish(&self) {
        let mut view = LabView {
            phase: self.phase,
            events: self.events.clone(),
            ..LabView::default()
        };

        if let Some(run) = &self.run {
            view.run_id = Some(run.id);
            view.awaiting_inference = run.awaiting;
            view.before = Some(Arc::clone(&run.before));
            view.after = run.after.clone();
            view.metrics = run.metrics.clone();
            view.attack = run.attack.clone();
            view.inference = run.inference.clone();
            view.ignored_targets = run.ignored_targets.clone();
            if run.after.is_some() {
                view.mitigations = run
                    .attack
                    .as_ref()
                    .map(|a| a.mitigations().to_vec())
                    .unwrap_or_default();
            }
        }

        self.publisher.publish(view);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeKind, EdgeSpec, NodeKind, NodeSpec, NodeStatus};
    use approx::assert_relative_eq;
    use async_trait::async_trait;
    use gridlab_env::{AttackType, Classification, EnvError, NodeLayer, NodeVerdict, TokioContext};
    use std::sync::Mutex;

    fn controller() -> LabController {
        LabController::with_defaults(TokioContext::shared())
    }

    fn two_node_topology() -> TopologyDescriptor {
        TopologyDescriptor::new(
            vec![
                NodeSpec::new("1", "Node 1", NodeKind::Bus, NodeLayer::Physical),
                NodeSpec::new("2", "Node 2", NodeKind::Bus, NodeLayer::Physical),
            ],
            vec![EdgeSpec::new("1", "2", EdgeKind::Physical)],
        )
        .named("pair")
    }

    fn attack_on_2() -> InferenceResult {
        InferenceResult::new().with_verdict("2", NodeVerdict::malicious(0.85, 0.9))
    }

    #[test]
    fn test_full_run_metrics() {
        let mut lab = controller();
        lab.start(&two_node_topology()).unwrap();
        assert_eq!(lab.phase(), LifecyclePhase::Running);

        lab.inject_attack(&attack_on_2()).unwrap();
        assert_eq!(lab.phase(), LifecyclePhase::Injected);
        assert!(lab.metrics().is_none());

        let metrics = lab.settle().unwrap();
        assert_eq!(lab.phase(), LifecyclePhase::Settled);

        assert_eq!(metrics.before.critical_count, 0);
        assert_eq!(metrics.before.warning_count, 0);
        assert_eq!(metrics.before.avg_anomaly_score, 0.0);

        assert_eq!(metrics.after.critical_count, 1);
        assert_eq!(metrics.after.warning_count, 0);
        assert_relative_eq!(metrics.after.avg_anomaly_score, 0.425, epsilon = 1e-12);

        // Snapshots stay readable after settling
        assert!(lab.before().is_some());
        assert_eq!(
            lab.after().and_then(|s| s.node("2")).map(|n| n.status()),
            Some(NodeStatus::Critical)
        );
    }

    #[test]
    fn test_double_start_rejected_and_run_untouched() {
        let mut lab = controller();
        let first = lab.start(&two_node_topology()).unwrap();
        let before = Arc::clone(lab.before().unwrap());

        let err = lab.start(&two_node_topology()).unwrap_err();
        assert!(matches!(
            err,
            LabError::RunAlreadyInProgress {
                phase: LifecyclePhase::Running
            }
        ));
        assert_eq!(lab.run_id(), Some(first));
        assert!(Arc::ptr_eq(lab.before().unwrap(), &before));

        lab.inject_attack(&attack_on_2()).unwrap();
        assert!(matches!(
            lab.start(&two_node_topology()),
            Err(LabError::RunAlreadyInProgress {
                phase: LifecyclePhase::Injected
            })
        ));
        assert_eq!(lab.phase(), LifecyclePhase::Injected);
        assert!(lab.after().is_some());
    }

    #[test]
    fn test_cancel_returns_to_idle() {
        let mut lab = controller();
        lab.start(&two_node_topology()).unwrap();
        lab.cancel().unwrap();

        assert_eq!(lab.phase(), LifecyclePhase::Idle);
        assert!(lab.before().is_none());
        assert!(lab.after().is_none());
        assert!(lab.run_id().is_none());

        // A fresh start behaves like the first one
        lab.start(&two_node_topology()).unwrap();
        assert_eq!(lab.phase(), LifecyclePhase::Running);
        assert!(lab.after().is_none());
        assert_eq!(lab.events().len(), 1);
    }

    #[test]
    fn test_cancel_not_allowed_after_injection() {
        let mut lab = controller();
        assert!(matches!(lab.cancel(), Err(LabError::InvalidTransition { .. })));

        lab.start(&two_node_topology()).unwrap();
        lab.inject_attack(&attack_on_2()).unwrap();
        assert!(matches!(
            lab.cancel(),
            Err(LabError::InvalidTransition {
                from: LifecyclePhase::Injected,
                ..
            })
        ));
        assert_eq!(lab.phase(), LifecyclePhase::Injected);
    }

    #[test]
    fn test_invalid_transitions_leave_state() {
        let mut lab = controller();
        assert!(matches!(lab.settle(), Err(LabError::InvalidTransition { .. })));
        assert!(matches!(
            lab.inject_attack(&attack_on_2()),
            Err(LabError::InvalidTransition { .. })
        ));
        assert_eq!(lab.phase(), LifecyclePhase::Idle);

        lab.start(&two_node_topology()).unwrap();
        assert!(matches!(lab.settle(), Err(LabError::InvalidTransition { .. })));
        lab.inject_attack(&attack_on_2()).unwrap();
        assert!(matches!(
            lab.inject_attack(&attack_on_2()),
            Err(LabError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_unknown_inference_target_not_fatal() {
        let mut lab = controller();
        lab.start(&two_node_topology()).unwrap();

        let result = InferenceResult::new().with_verdict("99", NodeVerdict::malicious(0.95, 0.9));
        lab.inject_attack(&result).unwrap();

        let after = lab.after().unwrap();
        assert_eq!(after.as_ref(), lab.before().unwrap().as_ref());
        assert_eq!(lab.view().ignored_targets.len(), 1);
    }

    #[test]
    fn test_dangling_topology_leaves_idle() {
        let mut lab = controller();
        let mut topo = two_node_topology();
        topo.edges.push(EdgeSpec::new("2", "3", EdgeKind::Coupling));

        assert!(matches!(
            lab.start(&topo),
            Err(LabError::DanglingEdgeReference { .. })
        ));
        assert_eq!(lab.phase(), LifecyclePhase::Idle);
        assert!(lab.before().is_none());
    }

    #[test]
    fn test_restart_after_settle_resets_snapshots() {
        let mut lab = controller();
        let first = lab.start(&two_node_topology()).unwrap();
        lab.inject_attack(&attack_on_2()).unwrap();
        lab.settle().unwrap();

        let second = lab.start(&two_node_topology()).unwrap();
        assert_ne!(first, second);
        assert_eq!(lab.phase(), LifecyclePhase::Running);
        assert!(lab.after().is_none());
        assert!(lab.metrics().is_none());
    }

    #[test]
    fn test_pending_inference_blocks_other_transitions() {
        let mut lab = controller();
        lab.start(&two_node_topology()).unwrap();

        let pending = lab.begin_inference(None).unwrap();
        assert!(lab.is_awaiting_inference());
        assert!(matches!(lab.start(&two_node_topology()), Err(LabError::RunAlreadyInProgress { .. })));
        assert!(matches!(lab.inject_attack(&attack_on_2()), Err(LabError::RunAlreadyInProgress { .. })));
        assert!(matches!(lab.begin_inference(None), Err(LabError::RunAlreadyInProgress { .. })));
        assert_eq!(lab.phase(), LifecyclePhase::Running);

        lab.complete_inference(pending, &attack_on_2()).unwrap();
        assert_eq!(lab.phase(), LifecyclePhase::Injected);
        assert!(!lab.is_awaiting_inference());
    }

    #[test]
    fn test_cancel_while_awaiting_makes_ticket_stale() {
        let mut lab = controller();
        lab.start(&two_node_topology()).unwrap();
        let pending = lab.begin_inference(None).unwrap();

        lab.cancel().unwrap();
        assert!(matches!(
            lab.complete_inference(pending, &attack_on_2()),
            Err(LabError::StaleInference { current: None, .. })
        ));
        assert_eq!(lab.phase(), LifecyclePhase::Idle);
        assert!(lab.after().is_none());
    }

    #[test]
    fn test_ticket_from_previous_run_is_stale() {
        let mut lab = controller();
        lab.start(&two_node_topology()).unwrap();
        let old = lab.begin_inference(None).unwrap();
        lab.cancel().unwrap();

        let current = lab.start(&two_node_topology()).unwrap();
        assert!(matches!(
            lab.complete_inference(old, &attack_on_2()),
            Err(LabError::StaleInference { current: Some(id), .. }) if id == current
        ));
        assert_eq!(lab.phase(), LifecyclePhase::Running);
    }

    #[test]
    fn test_attack_spec_drives_detection_and_mitigations() {
        let mut lab = controller();
        lab.start(&two_node_topology()).unwrap();

        let spec = AttackSpec::new(AttackType::FalseDataInjection, "2");
        let pending = lab.begin_inference(Some(spec)).unwrap();
        let probe = pending.request().attack.clone().unwrap();
        assert_eq!(probe.affected, vec!["2", "1"]);

        // The model only catches the target
        lab.complete_inference(pending, &attack_on_2()).unwrap();
        assert_eq!(lab.view().mitigations.len(), 4);

        let metrics = lab.settle().unwrap();
        let detection = metrics.detection.unwrap();
        assert_eq!(detection.detected, vec!["2"]);
        assert_eq!(detection.missed, vec!["1"]);
        assert_eq!(metrics.after_health.detection_rate, Some(50.0));
    }

    #[test]
    fn test_unknown_attack_target_leaves_state() {
        let mut lab = controller();
        lab.start(&two_node_topology()).unwrap();
        let spec = AttackSpec::new(AttackType::Backdoor, "42");
        assert!(matches!(lab.begin_inference(Some(spec)), Err(LabError::UnknownNode(_))));
        assert!(!lab.is_awaiting_inference());
        assert!(lab.events().iter().all(|e| e.kind != EventKind::AttackInjected));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = LabConfig::default();
        config.thresholds.warning = 0.9;
        assert!(matches!(
            LabController::new(TokioContext::shared(), config),
            Err(LabError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_view_tracks_transitions() {
        let mut lab = controller();
        let handle = lab.subscribe();
        assert_eq!(handle.current().phase, LifecyclePhase::Idle);

        lab.start(&two_node_topology()).unwrap();
        let running = handle.current();
        assert!(running.is_running());
        assert!(running.before.is_some());

        lab.inject_attack(&attack_on_2()).unwrap();
        lab.settle().unwrap();
        let settled = handle.current();
        assert_eq!(settled.phase, LifecyclePhase::Settled);
        assert_eq!(settled.after_metrics().critical_count, 1);
        assert_eq!(settled.nodes().len(), 2);

        // An older view is not mutated by later transitions
        assert_eq!(running.phase, LifecyclePhase::Running);
        assert!(running.after.is_none());
    }

    // -------------------------------------------------------------------------
    // Async engine path
    // -------------------------------------------------------------------------

    struct ObservingEngine {
        handle: Mutex<Option<LabHandle>>,
        seen: Mutex<Option<(LifecyclePhase, bool)>>,
        fail: bool,
    }

    impl ObservingEngine {
        fn new(fail: bool) -> Self {
            Self {
                handle: Mutex::new(None),
                seen: Mutex::new(None),
                fail,
            }
        }
    }

    #[async_trait]
    impl InferenceEngine for ObservingEngine {
        async fn infer(&self, request: InferenceRequest) -> Result<InferenceResult, EnvError> {
            let view = self.handle.lock().unwrap().as_ref().map(|h| h.current());
            *self.seen.lock().unwrap() = view.map(|v| (v.phase, v.awaiting_inference));
            tokio::task::yield_now().await;

            if self.fail {
                return Err(EnvError::inference("model offline"));
            }

            let mut result = InferenceResult::new();
            if let Some(attack) = &request.attack {
                for id in &attack.affected {
                    result.insert(id.clone(), NodeVerdict::malicious(0.9, 0.95));
                }
            }
            Ok(result.with_summary(InferenceSummary {
                classification: Classification::Malicious,
                probability: 0.9,
                attack_type: request.attack.as_ref().map(|a| a.attack_type),
                confidence_score: 0.95,
                inference_time_ms: 10.0,
            }))
        }

        fn name(&self) -> &str {
            "observing"
        }
    }

    #[tokio::test]
    async fn test_run_attack_stays_running_during_inference() {
        let mut lab = controller();
        let engine = ObservingEngine::new(false);
        *engine.handle.lock().unwrap() = Some(lab.subscribe());

        lab.start(&two_node_topology()).unwrap();
        lab.run_attack(&engine, Some(AttackSpec::new(AttackType::Ransomware, "1")))
            .await
            .unwrap();

        assert_eq!(*engine.seen.lock().unwrap(), Some((LifecyclePhase::Running, true)));
        assert_eq!(lab.phase(), LifecyclePhase::Injected);

        let view = lab.view();
        assert_eq!(view.inference.as_ref().and_then(|s| s.attack_type), Some(AttackType::Ransomware));
        let kinds: Vec<EventKind> = view.events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::StatusChange,
                EventKind::AttackInjected,
                EventKind::Detection,
                EventKind::Mitigation
            ]
        );

        let metrics = lab.settle().unwrap();
        assert_eq!(metrics.after.critical_count, 2);
    }

    #[tokio::test]
    async fn test_run_attack_engine_failure_stays_running() {
        let mut lab = controller();
        let engine = ObservingEngine::new(true);
        lab.start(&two_node_topology()).unwrap();

        let err = lab.run_attack(&engine, None).await.unwrap_err();
        assert!(matches!(err, LabError::Inference(EnvError::InferenceFailed(_))));
        assert_eq!(lab.phase(), LifecyclePhase::Running);
        assert!(!lab.is_awaiting_inference());
        let last = lab.events().last().unwrap();
        assert_eq!(last.kind, EventKind::StatusChange);
        assert!(last.description.contains("back in running"));

        // The run can still take a result
        lab.inject_attack(&attack_on_2()).unwrap();
        assert_eq!(lab.phase(), LifecyclePhase::Injected);
    }
}
