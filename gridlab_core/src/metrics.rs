//! GridLab Metrics Module
//! ======================
//!
//! Pure summary statistics over grid snapshots:
//! - **Lab metrics**: critical/warning counts and mean anomaly score
//! - **Deltas**: after minus before for a run
//! - **Health indicators**: security index, grid reliability, detection and
//!   false-alarm rates, derived from the above
//!
//! Nothing here can fail. Empty inputs have defined values.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::graph::{GridNode, GridSnapshot, NodeStatus};

/// Summary of one snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabMetrics {
    pub critical_count: usize,
    pub warning_count: usize,
    /// Mean anomaly score, 0 for an empty grid
    pub avg_anomaly_score: f64,
    pub node_count: usize,
}

/// Computes [`LabMetrics`] for a snapshot.
pub fn compute_metrics(snapshot: &GridSnapshot) -> LabMetrics {
    compute_node_metrics(snapshot.nodes())
}

/// Computes [`LabMetrics`] for a node slice.
pub fn compute_node_metrics(nodes: &[GridNode]) -> LabMetrics {
    let critical_count = nodes.iter().filter(|n| n.status() == NodeStatus::Critical).count();
    let warning_count = nodes.iter().filter(|n| n.status() == NodeStatus::Warning).count();
    let avg_anomaly_score = if nodes.is_empty() {
        0.0
    } else {
        nodes.iter().map(|n| n.anomaly_score()).sum::<f64>() / nodes.len() as f64
    };

    LabMetrics {
        critical_count,
        warning_count,
        avg_anomaly_score,
        node_count: nodes.len(),
    }
}

// =============================================================================
// DELTAS
// =============================================================================

/// After minus before, field by field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsDelta {
    pub critical_count: i64,
    pub warning_count: i64,
    pub avg_anomaly_score: f64,
}

impl MetricsDelta {
    pub fn between(before: &LabMetrics, after: &LabMetrics) -> Self {
        Self {
            critical_count: after.critical_count as i64 - before.critical_count as i64,
            warning_count: after.warning_count as i64 - before.warning_count as i64,
            avg_anomaly_score: after.avg_anomaly_score - before.avg_anomaly_score,
        }
    }
}

// =============================================================================
// DETECTION
// =============================================================================

/// How well the flagged set matches the injected attack.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionStats {
    /// Attacked nodes flagged warning or critical
    pub detected: Vec<String>,
    /// Attacked nodes left normal
    pub missed: Vec<String>,
    /// Flagged nodes that were not attacked
    pub false_alarms: Vec<String>,
    /// Percent of attacked nodes flagged
    pub detection_rate: f64,
    /// Percent of non-attacked nodes flagged
    pub false_alarm_rate: f64,
}

/// Scores the flagged nodes of `after` against the attacked set.
///
/// # Formula
/// ```text
/// detection_rate   = 100 * |flagged ∩ attacked| / |attacked|        (100 if nothing attacked)
/// false_alarm_rate = 100 * |flagged \ attacked| / |nodes \ attacked| (0 if no clean nodes)
/// ```
///
/// Attacked ids that are not in the snapshot are ignored.
pub fn detection_stats(after: &GridSnapshot, attacked: &[String]) -> DetectionStats {
    let attacked: HashSet<&str> = attacked
        .iter()
        .map(String::as_str)
        .filter(|id| after.contains(id))
        .collect();

    let mut stats = DetectionStats::default();
    for node in after.nodes() {
        let flagged = node.status().is_flagged();
        match (attacked.contains(node.id()), flagged) {
            (true, true) => stats.detected.push(node.id().to_string()),
            (true, false) => stats.missed.push(node.id().to_string()),
            (false, true) => stats.false_alarms.push(node.id().to_string()),
            (false, false) => {}
        }
    }

    stats.detection_rate = if attacked.is_empty() {
        100.0
    } else {
        100.0 * stats.detected.len() as f64 / attacked.len() as f64
    };

    let clean = after.len() - attacked.len();
    stats.false_alarm_rate = if clean == 0 {
        0.0
    } else {
        100.0 * stats.false_alarms.len() as f64 / clean as f64
    };

    stats
}

// =============================================================================
// HEALTH INDICATORS
// =============================================================================

/// Coarse band used to colour a health percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthBand {
    Healthy,
    Degraded,
    Critical,
}

impl HealthBand {
    /// Healthy at 90 and above, degraded at 70 and above.
    pub fn from_percent(score: f64) -> Self {
        if score >= 90.0 {
            HealthBand::Healthy
        } else if score >= 70.0 {
            HealthBand::Degraded
        } else {
            HealthBand::Critical
        }
    }
}

/// Dashboard-level aggregates, all percentages in [0, 100].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthIndicators {
    /// `100 * (1 - avg_anomaly_score)`
    pub security_index: f64,
    /// `100 * (1 - critical_count / node_count)`
    pub grid_reliability: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub false_alarm_rate: Option<f64>,
}

impl Default for HealthIndicators {
    fn default() -> Self {
        Self::from_metrics(&LabMetrics::default(), None)
    }
}

impl HealthIndicators {
    pub fn from_metrics(metrics: &LabMetrics, detection: Option<&DetectionStats>) -> Self {
        let security_index = (100.0 * (1.0 - metrics.avg_anomaly_score)).clamp(0.0, 100.0);
        let grid_reliability = if metrics.node_count == 0 {
            100.0
        } else {
            100.0 * (1.0 - metrics.critical_count as f64 / metrics.node_count as f64)
        };

        Self {
            security_index,
            grid_reliability,
            detection_rate: detection.map(|d| d.detection_rate),
            false_alarm_rate: detection.map(|d| d.false_alarm_rate),
        }
    }

    pub fn security_band(&self) -> HealthBand {
        HealthBand::from_percent(self.security_index)
    }

    pub fn reliability_band(&self) -> HealthBand {
        HealthBand::from_percent(self.grid_reliability)
    }
}

// =============================================================================
// RUN COMPARISON
// =============================================================================

/// Everything computed when a run settles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetrics {
    pub before: LabMetrics,
    pub after: LabMetrics,
    pub delta: MetricsDelta,
    pub before_health: HealthIndicators,
    pub after_health: HealthIndicators,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection: Option<DetectionStats>,
}

/// Compares the before/after snapshots of a run.
///
/// Detection statistics are only produced when the attacked set is known.
pub fn compare(before: &GridSnapshot, after: &GridSnapshot, attacked: Option<&[String]>) -> RunMetrics {
    let before_metrics = compute_metrics(before);
    let after_metrics = compute_metrics(after);
    let detection = attacked.map(|ids| detection_stats(after, ids));

    RunMetrics {
        before: before_metrics,
        after: after_metrics,
        delta: MetricsDelta::between(&before_metrics, &after_metrics),
        before_health: HealthIndicators::from_metrics(&before_metrics, None),
        after_health: HealthIndicators::from_metrics(&after_metrics, detection.as_ref()),
        detection,
    }
}

// =============================================================================
// TESTS
// =============================================================================
