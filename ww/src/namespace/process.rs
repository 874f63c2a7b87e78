//! Processes bound to namespace nodes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessStatus {
    Running,
    Exited,
    Failed(String),
}

impl ProcessStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, ProcessStatus::Running)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub id: String,
    pub host: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: ProcessStatus,
}

impl ProcessRecord {
    pub fn start(host: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            host: host.to_string(),
            started_at: Utc::now(),
            finished_at: None,
            status: ProcessStatus::Running,
        }
    }

    pub fn finish(&mut self, status: ProcessStatus) {
        self.finished_at = Some(Utc::now());
        self.status = status;
    }
}
