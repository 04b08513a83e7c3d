//! Page rendering capability.
//!
//! Discovery and the per-group render sessions only talk to these traits.
//! The production implementation drives a headless Chrome over CDP; tests
//! substitute scripted pages.

use headless_chrome::protocol::cdp::Target;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::ScraperConfig;
use crate::utils::error::{AppError, Result};

/// One isolated page (fresh browser context + tab).
#[cfg_attr(test, mockall::automock)]
pub trait BrowserPage: Send {
    /// Navigates and waits for the load event, bounded by `timeout`.
    fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()>;

    /// Waits until the page stops fetching resources or `timeout` elapses.
    fn wait_for_network_idle(&mut self, timeout: Duration) -> Result<()>;

    /// Number of elements matching `selector`. Zero is a value, not an error.
    fn count(&self, selector: &str) -> Result<usize>;

    /// Scrolls the `index`-th match of `selector` into view and clicks it.
    fn click_nth(&self, selector: &str, index: usize) -> Result<()>;

    /// Inner text of the first `child` inside the `index`-th match of `selector`.
    fn inner_text_nth(&self, selector: &str, index: usize, child: &str) -> Result<String>;

    /// Full rendered markup.
    fn content(&self) -> Result<String>;

    fn pause(&self, delay: Duration);

    /// Releases the tab and its context. Must be idempotent.
    fn close(&mut self);
}

/// A running browser engine owned by one pool worker.
pub trait RenderEngine: Send {
    fn open_page(&self) -> Result<Box<dyn BrowserPage + '_>>;
}

pub trait EngineFactory: Send + Sync {
    fn launch(&self) -> Result<Box<dyn RenderEngine>>;
}

/// Closes the page on every exit path.
pub struct PageGuard<'a> {
    page: Box<dyn BrowserPage + 'a>,
}

impl<'a> PageGuard<'a> {
    pub fn new(page: Box<dyn BrowserPage + 'a>) -> Self {
        Self { page }
    }
}

impl<'a> std::ops::Deref for PageGuard<'a> {
    type Target = dyn BrowserPage + 'a;

    fn deref(&self) -> &Self::Target {
        self.page.as_ref()
    }
}

impl<'a> std::ops::DerefMut for PageGuard<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.page.as_mut()
    }
}

impl Drop for PageGuard<'_> {
    fn drop(&mut self) {
        self.page.close();
    }
}

pub struct ChromeEngineFactory {
    config: ScraperConfig,
}

impl ChromeEngineFactory {
    pub fn new(config: ScraperConfig) -> Self {
        Self { config }
    }

    pub fn launch_chrome(&self) -> Result<ChromeEngine> {
        let mut launch_options = LaunchOptions::default_builder()
            .headless(self.config.headless)
            .sandbox(false) // Often needed in containerized environments
            .idle_browser_timeout(Duration::from_secs(
                self.config.navigation_timeout_secs.max(self.config.idle_timeout_secs) * 4,
            ))
            .args(vec![
                std::ffi::OsStr::new("--no-sandbox"),
                std::ffi::OsStr::new("--disable-dev-shm-usage"),
                std::ffi::OsStr::new("--disable-gpu"),
                std::ffi::OsStr::new("--disable-extensions"),
                std::ffi::OsStr::new("--disable-background-timer-throttling"),
                std::ffi::OsStr::new("--disable-backgrounding-occluded-windows"),
                std::ffi::OsStr::new("--disable-renderer-backgrounding"),
            ])
            .build()
            .map_err(|e| AppError::browser(format!("Failed to create launch options: {}", e)))?;

        if let Some(chrome_path) = &self.config.chrome_path {
            launch_options.path = Some(std::path::PathBuf::from(chrome_path));
        }

        let browser = Browser::new(launch_options)
            .map_err(|e| AppError::browser(format!("Failed to launch browser: {}", e)))?;

        let control = browser
            .new_tab()
            .map_err(|e| AppError::browser(format!("Failed to open control tab: {}", e)))?;

        tracing::debug!("Launched headless browser");
        Ok(ChromeEngine {
            browser,
            control,
            user_agent: self.config.user_agent.clone(),
        })
    }
}

impl EngineFactory for ChromeEngineFactory {
    fn launch(&self) -> Result<Box<dyn RenderEngine>> {
        Ok(Box::new(self.launch_chrome()?))
    }
}

/// Dropping the engine terminates the Chrome process.
///
/// `control` is a tab in the default context. Browser-level commands such as
/// disposing an incognito context are issued through it.
pub struct ChromeEngine {
    browser: Browser,
    control: Arc<Tab>,
    user_agent: Option<String>,
}

impl RenderEngine for ChromeEngine {
    fn open_page(&self) -> Result<Box<dyn BrowserPage + '_>> {
        let context = self
            .browser
            .new_context()
            .map_err(|e| AppError::browser(format!("Failed to create browser context: {}", e)))?;
        let context_id = context.get_id().to_string();

        let tab = match context.new_tab() {
            Ok(tab) => tab,
            Err(e) => {
                dispose_context(&self.control, &context_id);
                return Err(AppError::browser(format!("Failed to create tab: {}", e)));
            }
        };

        let mut page = ChromePage {
            control: &self.control,
            context_id,
            tab,
            closed: false,
        };

        if let Some(user_agent) = &self.user_agent {
            if let Err(e) = page.tab.set_user_agent(user_agent, None, None) {
                page.close();
                return Err(AppError::browser(format!("Failed to set user agent: {}", e)));
            }
        }

        Ok(Box::new(page))
    }
}

fn dispose_context(control: &Tab, context_id: &str) {
    let result = control.call_method(Target::DisposeBrowserContext {
        browser_context_id: context_id.to_string(),
    });
    if let Err(e) = result {
        tracing::debug!(context_id, "Failed to dispose browser context: {}", e);
    }
}

pub struct ChromePage<'a> {
    control: &'a Tab,
    context_id: String,
    tab: Arc<Tab>,
    closed: bool,
}

impl ChromePage<'_> {
    fn evaluate(&self, expression: &str) -> Result<serde_json::Value> {
        let remote = self
            .tab
            .evaluate(expression, false)
            .map_err(|e| AppError::browser(format!("Script evaluation failed: {}", e)))?;
        Ok(remote.value.unwrap_or(serde_json::Value::Null))
    }

    fn resource_count(&self) -> Result<u64> {
        let value = self.evaluate("performance.getEntriesByType('resource').length")?;
        Ok(value.as_u64().unwrap_or(0))
    }

    fn nth_element(&self, selector: &str, index: usize) -> Result<headless_chrome::Element<'_>> {
        let mut elements = self
            .tab
            .find_elements(selector)
            .map_err(|e| AppError::browser(format!("Selector '{}' failed: {}", selector, e)))?;
        if index >= elements.len() {
            return Err(AppError::browser(format!(
                "Element {} of '{}' not found ({} present)",
                index,
                selector,
                elements.len()
            )));
        }
        Ok(elements.swap_remove(index))
    }
}

impl BrowserPage for ChromePage<'_> {
    fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()> {
        self.tab.set_default_timeout(timeout);
        self.tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map_err(|e| AppError::browser(format!("Navigation to {} failed: {}", url, e)))?;
        Ok(())
    }

    fn wait_for_network_idle(&mut self, timeout: Duration) -> Result<()> {
        const POLL: Duration = Duration::from_millis(250);
        const QUIET_POLLS: u32 = 2;

        let deadline = Instant::now() + timeout;
        let mut last = self.resource_count()?;
        let mut quiet = 0;

        while Instant::now() < deadline {
            std::thread::sleep(POLL);
            let current = self.resource_count()?;
            if current == last {
                quiet += 1;
                if quiet >= QUIET_POLLS {
                    return Ok(());
                }
            } else {
                quiet = 0;
                last = current;
            }
        }

        tracing::debug!(resources = last, "Network did not go idle before timeout");
        Ok(())
    }

    fn count(&self, selector: &str) -> Result<usize> {
        let quoted = serde_json::to_string(selector)?;
        let value = self.evaluate(&format!("document.querySelectorAll({}).length", quoted))?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    fn click_nth(&self, selector: &str, index: usize) -> Result<()> {
        let element = self.nth_element(selector, index)?;
        element
            .scroll_into_view()
            .map_err(|e| AppError::browser(format!("Scroll to '{}'[{}] failed: {}", selector, index, e)))?;
        element
            .click()
            .map_err(|e| AppError::browser(format!("Click on '{}'[{}] failed: {}", selector, index, e)))?;
        Ok(())
    }

    fn inner_text_nth(&self, selector: &str, index: usize, child: &str) -> Result<String> {
        let element = self.nth_element(selector, index)?;
        let inner = element
            .find_element(child)
            .map_err(|e| AppError::browser(format!("'{}' inside '{}'[{}] not found: {}", child, selector, index, e)))?;
        inner
            .get_inner_text()
            .map_err(|e| AppError::browser(format!("Failed to read text: {}", e)))
    }

    fn content(&self) -> Result<String> {
        self.tab
            .get_content()
            .map_err(|e| AppError::browser(format!("Failed to get page content: {}", e)))
    }

    fn pause(&self, delay: Duration) {
        std::thread::sleep(delay);
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.tab.close(true) {
            tracing::debug!("Failed to close tab: {}", e);
        }
        dispose_context(self.control, &self.context_id);
    }
}

impl Drop for ChromePage<'_> {
    fn drop(&mut self) {
        self.close();
    }
}
