//! Lab runner - drives one controller run per attack scenario.

use gridlab_core::{AttackSpec, LabConfig, LabController, LabView, RunMetrics};
use gridlab_env::{LabContext, RunId};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{info, warn};

use crate::config::SimConfig;
use crate::context::SimContext;
use crate::detector::SimulatedDetector;
use crate::error::SimError;
use crate::scenarios::AttackScenario;
use crate::topology::load_topology;

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Scenario that was run
    pub scenario: AttackScenario,

    /// Seed used
    pub seed: u64,

    pub run_id: RunId,

    /// Wall-clock time the run started, as reported by the lab context
    pub started_at: SystemTime,

    /// Whether the detection rate reached the configured floor
    pub passed: bool,

    /// Virtual time at settle, in milliseconds
    pub elapsed_ms: u64,

    pub metrics: RunMetrics,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Final published view of the run
    pub view: Arc<LabView>,
}

impl RunResult {
    /// Detection rate of the run in percent.
    pub fn detection_rate(&self) -> f64 {
        self.metrics
            .detection
            .as_ref()
            .map(|d| d.detection_rate)
            .unwrap_or(0.0)
    }
}

/// Runs attack scenarios against a fresh lab per run.
pub struct LabRunner {
    sim: SimConfig,
    lab: LabConfig,
}

impl LabRunner {
    pub fn new(sim: SimConfig, lab: LabConfig) -> Self {
        Self { sim, lab }
    }

    pub fn config(&self) -> &SimConfig {
        &self.sim
    }

    /// The scenario selected by the configuration.
    pub fn configured_scenario(&self) -> AttackScenario {
        match &self.sim.target {
            Some(target) => AttackScenario::new(self.sim.attack, target.clone()),
            None => AttackScenario::default_for(self.sim.attack),
        }
    }

    /// Runs a scenario: start, inject through the simulated detector, settle.
    pub async fn run(&self, scenario: AttackScenario) -> Result<RunResult, SimError> {
        self.run_seeded(scenario, self.sim.seed).await
    }

    /// Runs every attack type at its default target.
    ///
    /// Scenario `i` runs under `seed + i`, so each run gets its own id and
    /// detector stream.
    pub async fn run_all(&self) -> Vec<Result<RunResult, SimError>> {
        let mut results = Vec::new();
        for (index, scenario) in AttackScenario::all().into_iter().enumerate() {
            let seed = self.sim.seed.wrapping_add(index as u64);
            results.push(self.run_seeded(scenario, seed).await);
        }
        results
    }

    async fn run_seeded(&self, scenario: AttackScenario, seed: u64) -> Result<RunResult, SimError> {
        self.sim.validate()?;
        info!(
            "Starting scenario: {} on {} (seed={}, {} observability)",
            scenario,
            self.sim.topology,
            seed,
            self.sim.observability.name()
        );

        let ctx = SimContext::shared(seed);
        let started_at = ctx.system_time();
        let mut lab = LabController::new(ctx.clone(), self.lab.clone())?;
        let detector = SimulatedDetector::new(ctx.clone())
            .with_observability(self.sim.observability)
            .with_latency_ms(self.sim.latency_ms);

        let topology = load_topology(&self.sim.topology)?;
        let run_id = lab.start(&topology)?;

        let attack = AttackSpec::new(scenario.attack, scenario.target.clone());
        lab.run_attack(&detector, Some(attack)).await?;
        let metrics = lab.settle()?;

        let detection_rate = metrics
            .detection
            .as_ref()
            .map(|d| d.detection_rate)
            .unwrap_or(0.0);
        let passed = detection_rate >= self.sim.min_detection_rate;
        let failure_reason = if passed {
            None
        } else {
            warn!("{}: detection rate {:.1}% below floor", scenario, detection_rate);
            Some(format!(
                "Detection rate {:.1}% below {:.1}%",
                detection_rate, self.sim.min_detection_rate
            ))
        };

        Ok(RunResult {
            scenario,
            seed,
            run_id,
            started_at,
            passed,
            elapsed_ms: ctx.now().as_millis() as u64,
            metrics,
            failure_reason,
            view: lab.view(),
        })
    }
}
