// Integration tests for fee-harvester
// These tests drive the HTTP router against scripted browser engines

pub mod api_tests;

use axum::{
    body::Body,
    http::{Method, Request},
    response::Response,
    Router,
};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use fee_harvester::{
    browser::{BrowserPage, EngineFactory, RenderEngine},
    progress::ProgressRegistry,
    targets::TargetCatalog,
    web::{create_router, AppState},
    AppConfig, AppError, ExtractionService,
};

pub const FEE_TABLE: &str = r#"<html><body>
    <table class="jsx-2530098677 table-new table-responsive">
        <tr><th>Year</th><th>Fee</th></tr>
        <tr><td>1st Year</td><td>₹1,00,000 Check Details</td></tr>
    </table>
</body></html>"#;

pub const NO_TABLES: &str = "<html><body><p>Fees will be announced soon</p></body></html>";

/// A fake college site: every page shows `groups` course groups and the
/// same markup once a group is expanded.
#[derive(Clone)]
pub struct FakeSite {
    pub groups: usize,
    pub html: &'static str,
    pub launchable: bool,
}

impl FakeSite {
    pub fn with_groups(groups: usize) -> Self {
        Self {
            groups,
            html: FEE_TABLE,
            launchable: true,
        }
    }
}

impl EngineFactory for FakeSite {
    fn launch(&self) -> fee_harvester::Result<Box<dyn RenderEngine>> {
        if !self.launchable {
            return Err(AppError::browser("Failed to launch browser: no Chrome binary"));
        }
        Ok(Box::new(self.clone()))
    }
}

impl RenderEngine for FakeSite {
    fn open_page(&self) -> fee_harvester::Result<Box<dyn BrowserPage + '_>> {
        Ok(Box::new(FakePage { site: self.clone() }))
    }
}

struct FakePage {
    site: FakeSite,
}

impl BrowserPage for FakePage {
    fn navigate(&mut self, _url: &str, _timeout: Duration) -> fee_harvester::Result<()> {
        Ok(())
    }

    fn wait_for_network_idle(&mut self, _timeout: Duration) -> fee_harvester::Result<()> {
        Ok(())
    }

    fn count(&self, _selector: &str) -> fee_harvester::Result<usize> {
        Ok(self.site.groups)
    }

    fn click_nth(&self, _selector: &str, index: usize) -> fee_harvester::Result<()> {
        if index < self.site.groups {
            Ok(())
        } else {
            Err(AppError::browser(format!("Element {} not found", index)))
        }
    }

    fn inner_text_nth(&self, _selector: &str, index: usize, _child: &str) -> fee_harvester::Result<String> {
        Ok(format!("B.Tech Branch {}", index))
    }

    fn content(&self) -> fee_harvester::Result<String> {
        Ok(self.site.html.to_string())
    }

    fn pause(&self, _delay: Duration) {}

    fn close(&mut self) {}
}

/// Test configuration for integration tests
pub fn get_test_config(work_dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.server.host = "127.0.0.1".to_string();
    config.scraper.max_workers = 2;
    config.scraper.navigation_timeout_secs = 5;
    config.scraper.idle_timeout_secs = 1;
    config.scraper.settle_delay_ms = 0;
    config.export.work_dir = work_dir.to_string_lossy().into_owned();
    config
}

/// Create test app state with all components initialized
pub fn create_test_app_state(site: FakeSite, work_dir: &Path) -> anyhow::Result<AppState> {
    let config = get_test_config(work_dir);
    let catalog = TargetCatalog::new(
        BTreeMap::from([
            ("Test College".to_string(), "/college/1001-test-college".to_string()),
            ("Another Institute".to_string(), "/college/1002-another-institute".to_string()),
        ]),
        &config.targets,
    );
    let registry = ProgressRegistry::new(config.progress.retention());
    let service = ExtractionService::new(&config, catalog, Arc::new(site), registry)?;

    Ok(AppState {
        service: Arc::new(service),
        config,
    })
}

pub fn create_test_app(site: FakeSite, work_dir: &Path) -> anyhow::Result<Router> {
    Ok(create_router(create_test_app_state(site, work_dir)?))
}

/// Helper to make HTTP requests to the test app
pub async fn make_request(app: &Router, method: Method, uri: &str) -> anyhow::Result<Response> {
    let request = Request::builder().method(method).uri(uri).body(Body::empty())?;
    let response = app.clone().oneshot(request).await?;
    Ok(response)
}

pub async fn body_bytes(response: Response) -> anyhow::Result<Vec<u8>> {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok(bytes.to_vec())
}

pub async fn body_json(response: Response) -> anyhow::Result<serde_json::Value> {
    Ok(serde_json::from_slice(&body_bytes(response).await?)?)
}
