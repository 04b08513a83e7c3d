use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::models::Phase;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub targets: TargetsConfig,
    pub scraper: ScraperConfig,
    pub progress: ProgressConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetsConfig {
    /// JSON object mapping a college name to its site-relative path.
    pub catalog_path: String,
    pub base_url: String,
    pub page_suffix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    /// Upper bound on parallel browser workers for one request.
    pub max_workers: usize,
    pub navigation_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub settle_delay_ms: u64,
    pub headless: bool,
    pub chrome_path: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressConfig {
    /// How long a finished task stays visible to pollers.
    pub retention_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    pub work_dir: String,
    pub max_name_len: usize,
    pub max_label_len: usize,
    pub max_file_name_len: usize,
}

impl ScraperConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl ProgressConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }
}

impl ExportConfig {
    pub fn work_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
            },
            targets: TargetsConfig {
                catalog_path: "college_links.json".to_string(),
                base_url: "https://collegedunia.com".to_string(),
                page_suffix: "/courses-fees".to_string(),
            },
            scraper: ScraperConfig {
                max_workers: 5,
                navigation_timeout_secs: 60,
                idle_timeout_secs: 30,
                settle_delay_ms: 3000,
                headless: true,
                chrome_path: None,
                user_agent: None,
            },
            progress: ProgressConfig { retention_secs: 300 },
            export: ExportConfig {
                work_dir: ".".to_string(),
                max_name_len: 50,
                max_label_len: 60,
                max_file_name_len: 100,
            },
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        let defaults = AppConfig::default();

        let s = Config::builder()
            // Built-in defaults so the service runs without any config files
            .set_default("server.host", defaults.server.host)?
            .set_default("server.port", defaults.server.port as i64)?
            .set_default("targets.catalog_path", defaults.targets.catalog_path)?
            .set_default("targets.base_url", defaults.targets.base_url)?
            .set_default("targets.page_suffix", defaults.targets.page_suffix)?
            .set_default("scraper.max_workers", defaults.scraper.max_workers as i64)?
            .set_default(
                "scraper.navigation_timeout_secs",
                defaults.scraper.navigation_timeout_secs as i64,
            )?
            .set_default("scraper.idle_timeout_secs", defaults.scraper.idle_timeout_secs as i64)?
            .set_default("scraper.settle_delay_ms", defaults.scraper.settle_delay_ms as i64)?
            .set_default("scraper.headless", defaults.scraper.headless)?
            .set_default("progress.retention_secs", defaults.progress.retention_secs as i64)?
            .set_default("export.work_dir", defaults.export.work_dir)?
            .set_default("export.max_name_len", defaults.export.max_name_len as i64)?
            .set_default("export.max_label_len", defaults.export.max_label_len as i64)?
            .set_default("export.max_file_name_len", defaults.export.max_file_name_len as i64)?
            .add_source(File::with_name("config/default").required(false))
            // Add environment-specific config
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local config (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with prefix "FEES_"
            .add_source(Environment::with_prefix("FEES").separator("__"))
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;

        // Add Chrome path from environment if not set
        if config.scraper.chrome_path.is_none() {
            config.scraper.chrome_path = env::var("CHROME_PATH").ok();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Message("Server port must be greater than 0".into()));
        }

        if self.targets.catalog_path.trim().is_empty() {
            return Err(ConfigError::Message("targets.catalog_path must not be empty".into()));
        }

        if Url::parse(&self.targets.base_url).is_err() {
            return Err(ConfigError::Message("Invalid targets.base_url format".into()));
        }

        if self.scraper.max_workers == 0 {
            return Err(ConfigError::Message("Scraper max_workers must be greater than 0".into()));
        }

        if self.scraper.navigation_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "Scraper navigation_timeout_secs must be greater than 0".into(),
            ));
        }

        if !Self::phases_are_monotonic() {
            return Err(ConfigError::Message("Progress phase ranges must be ordered within 0..=100".into()));
        }

        // `_` + `_` + ordinal + ".csv" must still fit after both components
        let reserved = 2 + 1 + ".csv".len();
        if self.export.max_name_len == 0
            || self.export.max_name_len + reserved >= self.export.max_file_name_len
        {
            return Err(ConfigError::Message(
                "export.max_name_len leaves no room for a label within max_file_name_len".into(),
            ));
        }

        if self.export.max_label_len == 0 {
            return Err(ConfigError::Message("export.max_label_len must be greater than 0".into()));
        }

        Ok(())
    }

    fn phases_are_monotonic() -> bool {
        let phases = [
            Phase::Init,
            Phase::Browser,
            Phase::Discovery,
            Phase::Scraping,
            Phase::Processing,
            Phase::Export,
            Phase::Archive,
        ];
        phases.iter().all(|p| p.start() <= p.end() && p.end() <= 100)
            && phases.windows(2).all(|w| w[0].end() <= w[1].start())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation_invalid_port() {
        let mut config = AppConfig::default();
        config.server.port = 0;

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("port must be greater than 0"));
    }

    #[test]
    fn test_config_validation_invalid_base_url() {
        let mut config = AppConfig::default();
        config.targets.base_url = "not-a-valid-url".to_string();

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid targets.base_url"));
    }

    #[test]
    fn test_config_validation_zero_workers() {
        let mut config = AppConfig::default();
        config.scraper.max_workers = 0;

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("max_workers"));
    }

    #[test]
    fn test_config_validation_name_budget() {
        let mut config = AppConfig::default();
        config.export.max_name_len = 99;

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("leaves no room"));
    }

    #[test]
    fn test_config_validation_name_budget_boundary() {
        // Labels are truncated separately, so their budget may exceed the file limit
        let mut config = AppConfig::default();
        assert!(config.export.max_name_len + config.export.max_label_len > config.export.max_file_name_len);
        assert!(config.validate().is_ok());

        config.export.max_name_len = 94;
        assert!(config.validate().is_ok());

        config.export.max_name_len = 95;
        assert!(config.validate().is_err());

        config.export.max_name_len = 50;
        config.export.max_label_len = 0;
        assert!(config.validate().unwrap_err().to_string().contains("max_label_len"));
    }

    #[test]
    fn test_config_validation_empty_catalog() {
        let mut config = AppConfig::default();
        config.targets.catalog_path = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_durations() {
        let config = AppConfig::default();
        assert_eq!(config.scraper.navigation_timeout(), Duration::from_secs(60));
        assert_eq!(config.scraper.settle_delay(), Duration::from_millis(3000));
        assert_eq!(config.progress.retention(), Duration::from_secs(300));
        assert_eq!(config.bind_address(), "0.0.0.0:8000");
    }
}
