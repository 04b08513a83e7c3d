use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::models::{TaskProgress, TaskStatus};

#[derive(Debug, Clone)]
struct Entry {
    generation: u64,
    progress: TaskProgress,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    next_generation: u64,
}

/// In-memory task progress keyed by the caller-supplied task id.
///
/// Every mutation replaces the whole record under the write lock, so a
/// poller never sees a status from one update next to a percentage from
/// another. Percentages never go down and terminal records are frozen.
#[derive(Debug, Clone)]
pub struct ProgressRegistry {
    inner: Arc<RwLock<Inner>>,
    retention: Duration,
}

impl ProgressRegistry {
    pub fn new(retention: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            retention,
        }
    }

    /// Starts (or restarts) tracking of `task_id` at 0%.
    pub async fn begin(&self, task_id: &str) {
        let mut inner = self.inner.write().await;
        inner.next_generation += 1;
        let generation = inner.next_generation;
        inner.entries.insert(
            task_id.to_string(),
            Entry {
                generation,
                progress: TaskProgress::started(),
            },
        );
    }

    pub async fn get(&self, task_id: &str) -> Option<TaskProgress> {
        let inner = self.inner.read().await;
        inner.entries.get(task_id).map(|e| e.progress.clone())
    }

    /// Like [`get`](Self::get) but returns the `not_found` sentinel.
    pub async fn snapshot(&self, task_id: &str) -> TaskProgress {
        self.get(task_id).await.unwrap_or_else(TaskProgress::not_found)
    }

    pub async fn remove(&self, task_id: &str) -> Option<TaskProgress> {
        let mut inner = self.inner.write().await;
        inner.entries.remove(task_id).map(|e| e.progress)
    }

    pub async fn advance(&self, task_id: &str, percentage: u8, message: impl Into<String>) {
        let message = message.into();
        self.update(task_id, |p| {
            p.percentage = p.percentage.max(percentage.min(100));
            p.message = message;
        })
        .await;
    }

    pub async fn set_total(&self, task_id: &str, total: usize, percentage: u8, message: impl Into<String>) {
        let message = message.into();
        self.update(task_id, |p| {
            p.total = total;
            p.percentage = p.percentage.max(percentage.min(100));
            p.message = message;
        })
        .await;
    }

    /// Records that `current` of `total` units are done.
    pub async fn record_completion(
        &self,
        task_id: &str,
        current: usize,
        total: usize,
        percentage: u8,
        message: impl Into<String>,
    ) {
        let message = message.into();
        self.update(task_id, |p| {
            p.current = p.current.max(current);
            p.total = total;
            p.percentage = p.percentage.max(percentage.min(100));
            p.message = message;
        })
        .await;
    }

    pub async fn complete(&self, task_id: &str, message: impl Into<String>) {
        let message = message.into();
        self.update(task_id, |p| {
            p.status = TaskStatus::Completed;
            p.percentage = 100;
            p.message = message;
        })
        .await;
    }

    /// Marks the task failed, keeping its last percentage. An unknown id gets
    /// a fresh error record at 0%.
    pub async fn fail(&self, task_id: &str, message: impl Into<String>) {
        let message = message.into();
        let mut inner = self.inner.write().await;
        if !inner.entries.contains_key(task_id) {
            inner.next_generation += 1;
            let generation = inner.next_generation;
            inner.entries.insert(
                task_id.to_string(),
                Entry {
                    generation,
                    progress: TaskProgress {
                        status: TaskStatus::Error,
                        percentage: 0,
                        message,
                        current: 0,
                        total: 0,
                    },
                },
            );
            return;
        }

        if let Some(entry) = inner.entries.get_mut(task_id) {
            if entry.progress.is_terminal() {
                return;
            }
            let mut next = entry.progress.clone();
            next.status = TaskStatus::Error;
            next.message = message;
            entry.progress = next;
        }
    }

    /// Drops the record after the retention delay, unless it was restarted
    /// in the meantime.
    pub async fn schedule_removal(&self, task_id: &str) -> tokio::task::JoinHandle<()> {
        let generation = {
            let inner = self.inner.read().await;
            inner.entries.get(task_id).map(|e| e.generation)
        };

        let registry = self.clone();
        let task_id = task_id.to_string();
        tokio::spawn(async move {
            let Some(generation) = generation else {
                return;
            };
            tokio::time::sleep(registry.retention).await;

            let mut inner = registry.inner.write().await;
            let expired = inner
                .entries
                .get(&task_id)
                .map(|e| e.generation == generation && e.progress.is_terminal())
                .unwrap_or(false);
            if expired {
                inner.entries.remove(&task_id);
                tracing::debug!(task_id = %task_id, "Expired progress record");
            }
        })
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Applies `f` to a copy of a live record and swaps it in whole.
    async fn update<F>(&self, task_id: &str, f: F)
    where
        F: FnOnce(&mut TaskProgress),
    {
        let mut inner = self.inner.write().await;
        if let Some(entry) = inner.entries.get_mut(task_id) {
            if entry.progress.is_terminal() {
                return;
            }
            let mut next = entry.progress.clone();
            f(&mut next);
            entry.progress = next;
        }
    }
}
