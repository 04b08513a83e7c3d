use crate::browser::{BrowserPage, PageGuard, RenderEngine};
use crate::render_session::SessionSettings;
use crate::utils::error::Result;

/// A structural query used to count expandable course groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructuralQuery {
    pub name: &'static str,
    pub selector: &'static str,
}

/// Most specific first. The first query with a nonzero count wins.
pub const COURSE_GROUP_QUERIES: &[StructuralQuery] = &[
    StructuralQuery {
        name: "exact trigger class",
        selector: "span[class='jsx-3955509628 icon icon-20 clg-sprite arrow-d-blue-20 mr-1 ']",
    },
    StructuralQuery {
        name: "trigger sprite classes",
        selector: "span.icon-20.clg-sprite.arrow-d-blue-20",
    },
    StructuralQuery {
        name: "trigger arrow class",
        selector: "span.arrow-d-blue-20",
    },
    StructuralQuery {
        name: "collapsed buttons",
        selector: "button[aria-expanded='false']",
    },
    StructuralQuery {
        name: "course detail class",
        selector: ".course-detail",
    },
    StructuralQuery {
        name: "course detail containers",
        selector: r#"div[class*="course-detail"]"#,
    },
];

/// Outcome of a successful probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupCount {
    pub count: usize,
    pub query: StructuralQuery,
}

pub struct DiscoveryProbe {
    queries: Vec<StructuralQuery>,
    settings: SessionSettings,
}

impl DiscoveryProbe {
    pub fn new(settings: SessionSettings) -> Self {
        Self::with_queries(COURSE_GROUP_QUERIES.to_vec(), settings)
    }

    pub fn with_queries(queries: Vec<StructuralQuery>, settings: SessionSettings) -> Self {
        Self { queries, settings }
    }

    /// Runs the queries in order against an already settled page. A query
    /// that errors counts as a miss.
    pub fn probe(&self, page: &dyn BrowserPage) -> Option<GroupCount> {
        self.queries.iter().find_map(|query| match page.count(query.selector) {
            Ok(0) => None,
            Ok(count) => Some(GroupCount { count, query: *query }),
            Err(e) => {
                tracing::debug!(query = query.name, "Structural query failed: {}", e);
                None
            }
        })
    }

    /// Opens `url`, lets asynchronous content settle and counts the groups.
    /// Zero means "target unavailable or structure changed"; navigation
    /// failures are reported the same way.
    pub fn discover(&self, engine: &dyn RenderEngine, url: &str) -> Result<usize> {
        let mut page = PageGuard::new(engine.open_page()?);

        if let Err(e) = page.navigate(url, self.settings.navigation_timeout) {
            tracing::warn!(url, "Discovery navigation failed: {}", e);
            return Ok(0);
        }
        if let Err(e) = page.wait_for_network_idle(self.settings.idle_timeout) {
            tracing::debug!(url, "Idle wait failed: {}", e);
        }
        page.pause(self.settings.settle_delay);

        match self.probe(&*page) {
            Some(found) => {
                tracing::info!(url, count = found.count, query = found.query.name, "Discovered course groups");
                Ok(found.count)
            }
            None => {
                tracing::warn!(url, "No course groups matched any structural query");
                Ok(0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::MockBrowserPage;
    use crate::utils::error::AppError;
    use mockall::predicate::eq;
    use std::time::Duration;

    fn settings() -> SessionSettings {
        SessionSettings {
            navigation_timeout: Duration::from_secs(1),
            idle_timeout: Duration::from_millis(1),
            settle_delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_first_nonzero_query_wins() {
        let mut page = MockBrowserPage::new();
        page.expect_count()
            .with(eq(COURSE_GROUP_QUERIES[0].selector))
            .returning(|_| Ok(0));
        page.expect_count()
            .with(eq(COURSE_GROUP_QUERIES[1].selector))
            .returning(|_| Err(AppError::browser("detached")));
        page.expect_count()
            .with(eq(COURSE_GROUP_QUERIES[2].selector))
            .returning(|_| Ok(7));
        // Later queries must never be evaluated
        page.expect_count().times(0);

        let found = DiscoveryProbe::new(settings()).probe(&page).unwrap();
        assert_eq!(found.count, 7);
        assert_eq!(found.query, COURSE_GROUP_QUERIES[2]);
    }

    #[test]
    fn test_all_queries_zero() {
        let mut page = MockBrowserPage::new();
        page.expect_count()
            .times(COURSE_GROUP_QUERIES.len())
            .returning(|_| Ok(0));

        assert!(DiscoveryProbe::new(settings()).probe(&page).is_none());
    }

    #[test]
    fn test_container_fallback() {
        let mut page = MockBrowserPage::new();
        page.expect_count().returning(|selector| {
            if selector == r#"div[class*="course-detail"]"# {
                Ok(2)
            } else {
                Ok(0)
            }
        });

        let found = DiscoveryProbe::new(settings()).probe(&page).unwrap();
        assert_eq!(found.count, 2);
        assert_eq!(found.query.name, "course detail containers");
    }
}
