use std::collections::BTreeMap;
use std::path::Path;

use crate::config::TargetsConfig;
use crate::models::TargetDescriptor;
use crate::utils::error::{AppError, Result};

/// Lookup table from a college name to the site-relative path of its page.
#[derive(Debug, Clone, Default)]
pub struct TargetCatalog {
    links: BTreeMap<String, String>,
    base_url: String,
    page_suffix: String,
}

impl TargetCatalog {
    pub fn new(links: BTreeMap<String, String>, config: &TargetsConfig) -> Self {
        Self {
            links,
            base_url: config.base_url.clone(),
            page_suffix: config.page_suffix.clone(),
        }
    }

    pub fn from_json(json: &str, config: &TargetsConfig) -> Result<Self> {
        let links: BTreeMap<String, String> = serde_json::from_str(json)?;
        Ok(Self::new(links, config))
    }

    /// Loads the catalog file. A missing or unreadable file yields an empty
    /// catalog so the service can still start and answer `/colleges`.
    pub fn load(config: &TargetsConfig) -> Self {
        let path = Path::new(&config.catalog_path);
        match std::fs::read_to_string(path) {
            Ok(json) => match Self::from_json(&json, config) {
                Ok(catalog) => {
                    tracing::info!(path = %path.display(), targets = catalog.len(), "Loaded target catalog");
                    catalog
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), "Target catalog is not valid JSON: {}", e);
                    Self::new(BTreeMap::new(), config)
                }
            },
            Err(e) => {
                tracing::warn!(path = %path.display(), "Target catalog unavailable: {}", e);
                Self::new(BTreeMap::new(), config)
            }
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.links.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn resolve(&self, name: &str) -> Result<TargetDescriptor> {
        let path = self
            .links
            .get(name)
            .ok_or_else(|| AppError::TargetUnknown { name: name.to_string() })?;

        TargetDescriptor::resolve(name, &self.base_url, path, &self.page_suffix)
            .map_err(|e| AppError::internal(format!("invalid URL for '{}': {}", name, e)))
    }
}
