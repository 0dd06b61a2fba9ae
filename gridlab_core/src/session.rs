//! Shared State Distribution - the read side of a lab session.
//!
//! The controller publishes a fresh [`LabView`] after every transition. A
//! view is never edited in place: readers holding an `Arc<LabView>` keep a
//! consistent picture while the next one is being built, and a reader that
//! looks mid-transition sees either the old view or the new one.
//!
//! Views rendered outside any session use [`view_or_default`], which yields
//! the idle view instead of failing.

use gridlab_env::{InferenceSummary, RunId};
use serde::Serialize;
use std::sync::{Arc, OnceLock};
use tokio::sync::watch;

use crate::attack::AttackSpec;
use crate::error::UnknownInferenceTarget;
use crate::graph::{GridEdge, GridNode, GridSnapshot};
use crate::lifecycle::{LabEvent, LifecyclePhase};
use crate::metrics::{HealthIndicators, LabMetrics, RunMetrics};

/// Everything a consuming view may read about the current run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabView {
    pub phase: LifecyclePhase,
    pub run_id: Option<RunId>,
    /// True while the controller waits on the inference engine
    pub awaiting_inference: bool,
    pub before: Option<Arc<GridSnapshot>>,
    pub after: Option<Arc<GridSnapshot>>,
    /// Present once the run has settled
    pub metrics: Option<RunMetrics>,
    pub attack: Option<AttackSpec>,
    pub inference: Option<InferenceSummary>,
    pub mitigations: Vec<&'static str>,
    pub ignored_targets: Vec<UnknownInferenceTarget>,
    pub events: Vec<LabEvent>,
}

impl Default for LabView {
    /// The idle view: no run, no snapshots, zeroed metrics.
    fn default() -> Self {
        Self {
            phase: LifecyclePhase::Idle,
            run_id: None,
            awaiting_inference: false,
            before: None,
            after: None,
            metrics: None,
            attack: None,
            inference: None,
            mitigations: Vec::new(),
            ignored_targets: Vec::new(),
            events: Vec::new(),
        }
    }
}

impl LabView {
    /// True while a run is in flight.
    pub fn is_running(&self) -> bool {
        matches!(self.phase, LifecyclePhase::Running | LifecyclePhase::Injected)
    }

    /// The most recent snapshot: `after` if present, else `before`.
    pub fn current(&self) -> Option<&GridSnapshot> {
        self.after.as_deref().or(self.before.as_deref())
    }

    /// Nodes of the current snapshot, empty when idle.
    pub fn nodes(&self) -> &[GridNode] {
        self.current().map(|s| s.nodes()).unwrap_or(&[])
    }

    /// Edges of the current snapshot, empty when idle.
    pub fn edges(&self) -> &[GridEdge] {
        self.current().map(|s| s.edges()).unwrap_or(&[])
    }

    /// Settled before-metrics, zeros otherwise.
    pub fn before_metrics(&self) -> LabMetrics {
        self.metrics.as_ref().map(|m| m.before).unwrap_or_default()
    }

    /// Settled after-metrics, zeros otherwise.
    pub fn after_metrics(&self) -> LabMetrics {
        self.metrics.as_ref().map(|m| m.after).unwrap_or_default()
    }

    /// Settled health indicators, the all-clear default otherwise.
    pub fn health(&self) -> HealthIndicators {
        self.metrics.as_ref().map(|m| m.after_health).unwrap_or_default()
    }
}

fn idle_view() -> Arc<LabView> {
    static IDLE: OnceLock<Arc<LabView>> = OnceLock::new();
    Arc::clone(IDLE.get_or_init(|| Arc::new(LabView::default())))
}

/// Write side, owned by the controller.
#[derive(Debug)]
pub(crate) struct LabPublisher {
    tx: watch::Sender<Arc<LabView>>,
}

impl LabPublisher {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(idle_view());
        Self { tx }
    }

    /// Replaces the published view. Works with zero subscribers.
    pub(crate) fn publish(&self, view: LabView) {
        self.tx.send_replace(Arc::new(view));
    }

    pub(crate) fn current(&self) -> Arc<LabView> {
        Arc::clone(&self.tx.borrow())
    }

    pub(crate) fn subscribe(&self) -> LabHandle {
        LabHandle {
            rx: self.tx.subscribe(),
        }
    }
}

/// Read-only handle onto a lab session. Cheap to clone.
#[derive(Debug, Clone)]
pub struct LabHandle {
    rx: watch::Receiver<Arc<LabView>>,
}

impl LabHandle {
    /// The latest published view.
    pub fn current(&self) -> Arc<LabView> {
        Arc::clone(&self.rx.borrow())
    }

    /// Waits for the next transition and returns the new view.
    ///
    /// Returns `None` once the session has ended; `current()` still
    /// yields the final view afterwards.
    pub async fn changed(&mut self) -> Option<Arc<LabView>> {
        self.rx.changed().await.ok()?;
        Some(Arc::clone(&self.rx.borrow_and_update()))
    }
}

/// The view for `handle`, or the idle view when no session is supplied.
pub fn view_or_default(handle: Option<&LabHandle>) -> Arc<LabView> {
    match handle {
        Some(handle) => handle.current(),
        None => idle_view(),
    }
}
