use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Summary of a finished deployment.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub tool_version: Option<String>,
    pub attempts: u32,
    pub apply_stdout: String,
    /// Output command stdout; `None` when it could not be read.
    pub outputs: Option<String>,
}

impl DeploymentReport {
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
