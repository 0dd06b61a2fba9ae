//! GridLab Simulation Harness
//!
//! Runs the Virtual Lab core end to end without a browser or a real model:
//! - **Time**: virtual clock; detector latency advances it instead of waiting
//! - **Inference**: a seeded stand-in for the GNN detector
//! - **Topology**: IEEE-style presets or JSON files
//!
//! Everything random derives from one 64-bit seed, so a seed reproduces a run.
//!
//! # Usage
//!
//! ```ignore
//! use gridlab_sim::{AttackScenario, LabRunner, SimConfig};
//! use gridlab_core::LabConfig;
//! use gridlab_env::AttackType;
//!
//! let runner = LabRunner::new(SimConfig::default(), LabConfig::default());
//! let result = runner.run(AttackScenario::default_for(AttackType::Ransomware)).await?;
//! println!("detection rate {:.1}%", result.detection_rate());
//! ```

mod context;
mod error;
pub mod config;
pub mod detector;
pub mod exporter;
pub mod runner;
pub mod scenarios;
pub mod topology;

pub use config::{load_lab_config, SimConfig};
pub use context::SimContext;
pub use detector::{Observability, SimulatedDetector};
pub use error::SimError;
pub use exporter::RunExport;
pub use runner::{LabRunner, RunResult};
pub use scenarios::AttackScenario;
pub use topology::{load_topology, TopologyPreset};
