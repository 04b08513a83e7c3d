//! One extraction request from target name to finished archive.

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::browser::EngineFactory;
use crate::config::AppConfig;
use crate::coordinator::ScrapeCoordinator;
use crate::discovery::DiscoveryProbe;
use crate::export::{ExportBundle, ExportEvent, ExportPackager};
use crate::models::{Phase, ScrapeResult};
use crate::progress::ProgressRegistry;
use crate::render_session::SessionSettings;
use crate::table_extractor::TableExtractor;
use crate::targets::TargetCatalog;
use crate::utils::error::{AppError, Result};

/// Progress writes for a request that may or may not be tracked.
struct Tracker<'a> {
    registry: &'a ProgressRegistry,
    task_id: Option<&'a str>,
}

impl Tracker<'_> {
    async fn begin(&self) {
        if let Some(id) = self.task_id {
            self.registry.begin(id).await;
        }
    }

    async fn advance(&self, percentage: u8, message: impl Into<String>) {
        if let Some(id) = self.task_id {
            self.registry.advance(id, percentage, message).await;
        }
    }

    async fn set_total(&self, total: usize, percentage: u8, message: impl Into<String>) {
        if let Some(id) = self.task_id {
            self.registry.set_total(id, total, percentage, message).await;
        }
    }

    async fn complete(&self, message: impl Into<String>) {
        if let Some(id) = self.task_id {
            self.registry.complete(id, message).await;
        }
    }

    async fn fail(&self, message: impl Into<String>) {
        if let Some(id) = self.task_id {
            self.registry.fail(id, message).await;
        }
    }

    async fn schedule_removal(&self) {
        if let Some(id) = self.task_id {
            let _ = self.registry.schedule_removal(id).await;
        }
    }
}

#[derive(Clone)]
pub struct ExtractionService {
    catalog: Arc<TargetCatalog>,
    registry: ProgressRegistry,
    factory: Arc<dyn EngineFactory>,
    coordinator: ScrapeCoordinator,
    packager: Arc<ExportPackager>,
    settings: SessionSettings,
}

impl ExtractionService {
    pub fn new(
        config: &AppConfig,
        catalog: TargetCatalog,
        factory: Arc<dyn EngineFactory>,
        registry: ProgressRegistry,
    ) -> Result<Self> {
        let settings = SessionSettings::from(&config.scraper);
        let extractor = Arc::new(TableExtractor::fee_tables()?);
        let coordinator = ScrapeCoordinator::new(
            Arc::clone(&factory),
            extractor,
            settings.clone(),
            config.scraper.max_workers,
            registry.clone(),
        );

        Ok(Self {
            catalog: Arc::new(catalog),
            registry,
            factory,
            coordinator,
            packager: Arc::new(ExportPackager::new(&config.export)),
            settings,
        })
    }

    pub fn catalog(&self) -> &TargetCatalog {
        &self.catalog
    }

    pub fn registry(&self) -> &ProgressRegistry {
        &self.registry
    }

    /// Runs discovery, the parallel scrape and packaging for `college`.
    ///
    /// When `task_id` is given every phase is mirrored into the progress
    /// registry, and a failure leaves the same message there as the one
    /// carried by the returned error.
    ///
    /// The pipeline runs on its own task. Dropping the returned future does
    /// not cancel it, so a tracked request still reaches a terminal state and
    /// is scheduled for removal.
    pub async fn extract(&self, college: &str, task_id: Option<&str>) -> Result<ExportBundle> {
        let service = self.clone();
        let college = college.to_string();
        let task_id = task_id.map(str::to_string);

        tokio::spawn(async move { service.extract_tracked(&college, task_id.as_deref()).await }).await?
    }

    async fn extract_tracked(&self, college: &str, task_id: Option<&str>) -> Result<ExportBundle> {
        let tracker = Tracker {
            registry: &self.registry,
            task_id,
        };
        tracker.begin().await;

        let outcome = self.run(college, &tracker).await;

        match &outcome {
            Ok(bundle) => {
                tracker.complete("Download ready!").await;
                tracing::info!(
                    college,
                    archive = %bundle.archive_name,
                    files = bundle.file_names.len(),
                    "Extraction finished"
                );
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!(college, kind = e.kind(), "Extraction produced nothing: {}", e);
                tracker.fail(e.user_message()).await;
            }
            Err(e) => {
                tracing::error!(college, kind = e.kind(), "Extraction failed: {:?}", e);
                tracker.fail(e.user_message()).await;
            }
        }

        tracker.schedule_removal().await;
        outcome
    }

    async fn run(&self, college: &str, tracker: &Tracker<'_>) -> Result<ExportBundle> {
        let target = self.catalog.resolve(college)?;
        tracing::info!(college, url = target.url_str(), "Starting extraction");

        tracker.advance(Phase::Browser.start(), "Opening browser...").await;
        tracker.advance(Phase::Discovery.start(), "Counting courses...").await;

        let group_count = self.discover(target.url_str()).await?;
        if group_count == 0 {
            return Err(AppError::DiscoveryEmpty {
                url: target.url_str().to_string(),
            });
        }

        tracker
            .set_total(
                group_count,
                Phase::Discovery.end(),
                format!("Found {} courses. Starting parallel scraping...", group_count),
            )
            .await;

        let results = self
            .coordinator
            .run(target.url_str(), group_count, tracker.task_id)
            .await?;

        tracker.advance(Phase::Processing.start(), "Processing scraped data...").await;
        tracker.advance(Phase::Processing.end(), "Creating CSV files...").await;

        self.package(&target.name, results, tracker).await
    }

    async fn discover(&self, url: &str) -> Result<usize> {
        let factory = Arc::clone(&self.factory);
        let probe = DiscoveryProbe::new(self.settings.clone());
        let url = url.to_string();

        tokio::task::spawn_blocking(move || {
            let engine = factory.launch()?;
            probe.discover(engine.as_ref(), &url)
        })
        .await?
    }

    async fn package(&self, target: &str, results: ScrapeResult, tracker: &Tracker<'_>) -> Result<ExportBundle> {
        let packager = Arc::clone(&self.packager);
        let target = target.to_string();
        let (tx, mut rx) = mpsc::unbounded_channel::<ExportEvent>();

        let handle = tokio::task::spawn_blocking(move || {
            packager.package(&target, &results, |event| {
                let _ = tx.send(event);
            })
        });

        while let Some(event) = rx.recv().await {
            match event {
                ExportEvent::CsvWritten { created, total } => {
                    tracker
                        .advance(
                            Phase::Export.percentage(created, total),
                            format!("Created {} of {} CSV files...", created, total),
                        )
                        .await;
                }
                ExportEvent::Archiving => {
                    tracker.advance(Phase::Archive.start(), "Creating ZIP archive...").await;
                }
            }
        }

        handle.await?
    }
}
