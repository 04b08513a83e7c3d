//! Fan-out of one render + extract pipeline per course group.
//!
//! `min(max_workers, groups)` blocking workers each own one browser engine
//! for their whole life and claim group indices from a shared counter.
//! Outcomes flow back over a channel and are folded in completion order by
//! the async side, which is also the only writer of scraping progress.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::browser::{EngineFactory, RenderEngine};
use crate::models::{Phase, ScrapeEntry, ScrapeResult};
use crate::progress::ProgressRegistry;
use crate::render_session::{RenderSession, SessionSettings};
use crate::table_extractor::TableExtractor;
use crate::utils::error::{AppError, Result};

/// Default ceiling on parallel browser workers.
pub const DEFAULT_MAX_WORKERS: usize = 5;

#[derive(Debug)]
struct GroupOutcome {
    index: usize,
    result: Result<Vec<ScrapeEntry>>,
}

#[derive(Clone)]
pub struct ScrapeCoordinator {
    factory: Arc<dyn EngineFactory>,
    extractor: Arc<TableExtractor>,
    settings: Arc<SessionSettings>,
    max_workers: usize,
    registry: ProgressRegistry,
}

impl ScrapeCoordinator {
    pub fn new(
        factory: Arc<dyn EngineFactory>,
        extractor: Arc<TableExtractor>,
        settings: SessionSettings,
        max_workers: usize,
        registry: ProgressRegistry,
    ) -> Self {
        Self {
            factory,
            extractor,
            settings: Arc::new(settings),
            max_workers: max_workers.max(1),
            registry,
        }
    }

    pub fn worker_count(&self, group_count: usize) -> usize {
        self.max_workers.min(group_count)
    }

    /// Scrapes groups `0..group_count` of `url`. Failed groups are logged and
    /// contribute nothing; the call only fails when no group yielded a row.
    /// The result is ordered by `(group_index, table_index)`.
    pub async fn run(&self, url: &str, group_count: usize, task_id: Option<&str>) -> Result<ScrapeResult> {
        let workers = self.worker_count(group_count);
        tracing::info!(url, groups = group_count, workers, "Starting parallel scrape");

        let next_index = Arc::new(AtomicUsize::new(0));
        let (tx, mut rx) = mpsc::unbounded_channel::<GroupOutcome>();

        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let worker = Worker {
                id: worker_id,
                factory: Arc::clone(&self.factory),
                extractor: Arc::clone(&self.extractor),
                settings: Arc::clone(&self.settings),
                url: url.to_string(),
                total: group_count,
                next_index: Arc::clone(&next_index),
                tx: tx.clone(),
            };
            handles.push(tokio::task::spawn_blocking(move || worker.run()));
        }
        drop(tx);

        let mut results: ScrapeResult = Vec::new();
        let mut completed = 0usize;
        let mut failed = 0usize;

        while let Some(outcome) = rx.recv().await {
            completed += 1;
            match outcome.result {
                Ok(entries) => {
                    tracing::debug!(group_index = outcome.index, tables = entries.len(), "Group scraped");
                    results.extend(entries);
                }
                Err(e) => {
                    failed += 1;
                    tracing::warn!(group_index = outcome.index, "Group scrape failed: {}", e);
                }
            }

            if let Some(task_id) = task_id {
                self.registry
                    .record_completion(
                        task_id,
                        completed,
                        group_count,
                        Phase::Scraping.percentage(completed, group_count),
                        format!("Scraped course {} of {}...", completed, group_count),
                    )
                    .await;
            }
        }

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("Scrape worker terminated abnormally: {}", e);
            }
        }

        results.sort_by_key(|entry| (entry.group_index, entry.table_index));

        tracing::info!(
            url,
            completed,
            failed,
            entries = results.len(),
            "Parallel scrape finished"
        );

        if results.iter().all(|entry| entry.rows.is_empty()) {
            return Err(AppError::AggregateEmpty);
        }
        Ok(results)
    }
}

struct Worker {
    id: usize,
    factory: Arc<dyn EngineFactory>,
    extractor: Arc<TableExtractor>,
    settings: Arc<SessionSettings>,
    url: String,
    total: usize,
    next_index: Arc<AtomicUsize>,
    tx: mpsc::UnboundedSender<GroupOutcome>,
}

impl Worker {
    fn run(self) {
        let engine = match self.factory.launch() {
            Ok(engine) => Some(engine),
            Err(e) => {
                tracing::error!(worker = self.id, "Browser launch failed: {}", e);
                None
            }
        };

        // Without an engine the worker still claims indices so that every
        // group is accounted for in the progress count.
        loop {
            let index = self.next_index.fetch_add(1, Ordering::SeqCst);
            if index >= self.total {
                break;
            }

            let result = match engine.as_deref() {
                Some(engine) => self.scrape_group(engine, index),
                None => Err(AppError::GroupTask {
                    index,
                    message: "browser engine unavailable".to_string(),
                }),
            };

            if self.tx.send(GroupOutcome { index, result }).is_err() {
                break;
            }
        }

        tracing::debug!(worker = self.id, "Scrape worker finished");
    }

    fn scrape_group(&self, engine: &dyn RenderEngine, index: usize) -> Result<Vec<ScrapeEntry>> {
        let attempt = catch_unwind(AssertUnwindSafe(|| -> Result<Vec<ScrapeEntry>> {
            let snapshot = RenderSession::new(engine, &self.settings).capture(&self.url, index)?;
            Ok(self.extractor.extract(&snapshot.html, &snapshot.group))
        }));

        match attempt {
            Ok(result) => result,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "panic during scrape".to_string());
                Err(AppError::GroupTask { index, message })
            }
        }
    }
}
