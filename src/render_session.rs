use std::time::Duration;

use crate::browser::{PageGuard, RenderEngine};
use crate::config::ScraperConfig;
use crate::models::GroupRecord;
use crate::utils::error::Result;

/// Expand arrow of one course group.
pub const GROUP_TRIGGER_SELECTOR: &str =
    "span[class='jsx-3955509628 icon icon-20 clg-sprite arrow-d-blue-20 mr-1 ']";

/// Detail block whose link carries the course name.
pub const GROUP_DETAIL_SELECTOR: &str =
    r#"div[class="jsx-3955509628 course-detail d-flex justify-content-between"]"#;

pub const GROUP_LABEL_CHILD: &str = "a";

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub navigation_timeout: Duration,
    pub idle_timeout: Duration,
    pub settle_delay: Duration,
}

impl From<&ScraperConfig> for SessionSettings {
    fn from(config: &ScraperConfig) -> Self {
        Self {
            navigation_timeout: config.navigation_timeout(),
            idle_timeout: config.idle_timeout(),
            settle_delay: config.settle_delay(),
        }
    }
}

/// Rendered markup of the page with one group expanded.
#[derive(Debug, Clone)]
pub struct GroupSnapshot {
    pub group: GroupRecord,
    pub html: String,
}

pub struct RenderSession<'e> {
    engine: &'e dyn RenderEngine,
    settings: &'e SessionSettings,
}

impl<'e> RenderSession<'e> {
    pub fn new(engine: &'e dyn RenderEngine, settings: &'e SessionSettings) -> Self {
        Self { engine, settings }
    }

    /// Opens a fresh page, expands group `index` and snapshots the result.
    /// The page is released on every path out of this function.
    pub fn capture(&self, url: &str, index: usize) -> Result<GroupSnapshot> {
        let mut page = PageGuard::new(self.engine.open_page()?);

        page.navigate(url, self.settings.navigation_timeout)?;
        page.click_nth(GROUP_TRIGGER_SELECTOR, index)?;
        page.pause(self.settings.settle_delay);

        let html = page.content()?;
        let label = page
            .inner_text_nth(GROUP_DETAIL_SELECTOR, index, GROUP_LABEL_CHILD)?
            .trim()
            .to_string();

        tracing::debug!(group_index = index, label = %label, bytes = html.len(), "Captured group");

        Ok(GroupSnapshot {
            group: GroupRecord { index, label },
            html,
        })
    }
}
