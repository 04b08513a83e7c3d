use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Processing,
    Completed,
    Error,
    NotFound,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Error)
    }
}

/// Snapshot of one extraction request as seen by a polling client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskProgress {
    pub status: TaskStatus,
    pub percentage: u8,
    pub message: String,
    pub current: usize,
    pub total: usize,
}

impl TaskProgress {
    pub fn started() -> Self {
        Self {
            status: TaskStatus::Processing,
            percentage: 0,
            message: "Initializing...".to_string(),
            current: 0,
            total: 0,
        }
    }

    /// Sentinel returned for ids that were never registered or have expired.
    pub fn not_found() -> Self {
        Self {
            status: TaskStatus::NotFound,
            percentage: 0,
            message: "Task not found".to_string(),
            current: 0,
            total: 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
