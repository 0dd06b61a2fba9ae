//! Simulated GNN detector - a seeded stand-in for the anomaly model.
//!
//! # Behaviour
//!
//! ```text
//! affected node   : score 0.7 + U * 0.30, malicious
//! other node      : score       U * 0.10, benign
//! confidence      :       0.8 + U * 0.19
//! probability     :      0.85 + U * 0.14
//! inference time  :         8 + U * 10   ms
//! latency         :  base + U * base     (via LabContext::sleep)
//! ```
//!
//! Under partial observability only cyber-layer nodes and physical nodes
//! with a coupling edge are reported; attacks on unobserved nodes go unseen.

use async_trait::async_trait;
use gridlab_env::{
    Classification, EnvError, InferenceEngine, InferenceRequest, InferenceResult, InferenceSummary,
    LabContext, NodeLayer, NodeVerdict,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

/// Which nodes the detector can measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Observability {
    Full,
    Partial,
}

impl Observability {
    pub fn name(&self) -> &'static str {
        match self {
            Observability::Full => "full",
            Observability::Partial => "partial",
        }
    }
}

impl FromStr for Observability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" => Ok(Observability::Full),
            "partial" => Ok(Observability::Partial),
            _ => Err(format!("Unknown observability mode: {} (expected full or partial)", s)),
        }
    }
}

/// Seeded inference engine used by the simulator.
pub struct SimulatedDetector {
    ctx: Arc<dyn LabContext>,
    rng: Mutex<ChaCha8Rng>,
    observability: Observability,
    latency_ms: u64,
}

impl SimulatedDetector {
    /// Creates a detector whose randomness derives from the context seed.
    pub fn new(ctx: Arc<dyn LabContext>) -> Self {
        let seed = ctx.seed().wrapping_mul(0x9e37_79b9_7f4a_7c15);
        Self {
            ctx,
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
            observability: Observability::Full,
            latency_ms: 500,
        }
    }

    pub fn with_observability(mut self, observability: Observability) -> Self {
        self.observability = observability;
        self
    }

    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn observability(&self) -> Observability {
        self.observability
    }

    /// Scores the request synchronously. Returns the result and the latency to simulate.
    fn score(&self, request: &InferenceRequest) -> (InferenceResult, Duration) {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);

        let coupled: HashSet<&str> = request
            .edges
            .iter()
            .filter(|e| e.coupling)
            .flat_map(|e| [e.source.as_str(), e.target.as_str()])
            .collect();
        let affected: HashSet<&str> = request
            .attack
            .iter()
            .flat_map(|a| a.affected.iter().map(String::as_str))
            .collect();

        let mut result = InferenceResult::new();
        let mut caught = 0usize;

        for node in &request.nodes {
            let observed = match self.observability {
                Observability::Full => true,
                Observability::Partial => node.layer == NodeLayer::Cyber || coupled.contains(node.id.as_str()),
            };
            if !observed {
                continue;
            }

            let confidence = 0.8 + rng.gen::<f64>() * 0.19;
            let verdict = if affected.contains(node.id.as_str()) {
                caught += 1;
                NodeVerdict::malicious(0.7 + rng.gen::<f64>() * 0.3, confidence)
            } else {
                NodeVerdict::benign(rng.gen::<f64>() * 0.1, confidence)
            };
            result.insert(node.id.clone(), verdict);
        }

        let attack_type = request.attack.as_ref().filter(|_| caught > 0).map(|a| a.attack_type);
        let probability = 0.85 + rng.gen::<f64>() * 0.14;
        let summary = InferenceSummary {
            classification: if attack_type.is_some() {
                Classification::Malicious
            } else {
                Classification::Benign
            },
            probability: if attack_type.is_some() { probability } else { 1.0 - probability },
            attack_type,
            confidence_score: 0.8 + rng.gen::<f64>() * 0.19,
            inference_time_ms: 8.0 + rng.gen::<f64>() * 10.0,
        };

        let jitter = (rng.gen::<f64>() * self.latency_ms as f64) as u64;
        let latency = self.latency_ms.saturating_add(jitter);

        debug!(
            "{} detector scored {}/{} nodes, caught {}/{} affected",
            self.observability.name(),
            result.len(),
            request.nodes.len(),
            caught,
            affected.len()
        );

        (result.with_summary(summary), Duration::from_millis(latency))
    }
}

#[async_trait]
impl InferenceEngine for SimulatedDetector {
    async fn infer(&self, request: InferenceRequest) -> Result<InferenceResult, EnvError> {
        let (result, latency) = self.score(&request);
        self.ctx.sleep(latency).await;
        Ok(result)
    }

    fn name(&self) -> &str {
        "simulated-gnn"
    }
}
