//! JSON export of a finished lab run.

use gridlab_core::{LabView, RunMetrics};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use crate::error::SimError;
use crate::runner::RunResult;

/// Complete record of one run, suitable for offline inspection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunExport {
    /// Scenario name
    pub scenario: String,

    pub description: String,

    /// Seed used
    pub seed: u64,

    pub topology: String,

    pub observability: String,

    /// Run start, milliseconds since the Unix epoch
    pub started_at_ms: u64,

    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    /// Virtual time at settle, in milliseconds
    pub elapsed_ms: u64,

    pub metrics: RunMetrics,

    /// Snapshots, inference summary, mitigations and event log
    pub lab: Arc<LabView>,
}

impl RunExport {
    pub fn from_result(result: &RunResult, topology: &str, observability: &str) -> Self {
        Self {
            scenario: result.scenario.name(),
            description: result.scenario.description(),
            seed: result.seed,
            topology: topology.to_string(),
            observability: observability.to_string(),
            started_at_ms: result
                .started_at
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0),
            passed: result.passed,
            failure_reason: result.failure_reason.clone(),
            elapsed_ms: result.elapsed_ms,
            metrics: result.metrics.clone(),
            lab: Arc::clone(&result.view),
        }
    }

    pub fn to_json(&self) -> Result<String, SimError> {
        serde_json::to_string_pretty(self).map_err(|e| SimError::Export(e.to_string()))
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> Result<(), SimError> {
        let json = self.to_json()?;
        let mut file = File::create(path).map_err(|e| SimError::io(path, e))?;
        file.write_all(json.as_bytes()).map_err(|e| SimError::io(path, e))?;
        Ok(())
    }
}
