//! Error types for the simulation harness.

use gridlab_core::LabError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("Failed to read {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Invalid topology file {path}: {reason}")]
    TopologyParse { path: String, reason: String },

    #[error("Unknown topology: {0} (expected ieee14, ieee30 or a .json file)")]
    UnknownTopology(String),

    #[error("Unknown attack type: {0}")]
    UnknownAttack(String),

    #[error("Invalid simulation config: {0}")]
    InvalidConfig(String),

    #[error("Export failed: {0}")]
    Export(String),

    #[error(transparent)]
    Lab(#[from] LabError),
}

impl SimError {
    pub(crate) fn io(path: &str, err: std::io::Error) -> Self {
        SimError::Io {
            path: path.to_string(),
            reason: err.to_string(),
        }
    }
}
