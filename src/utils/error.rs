use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("College not found: {name}")]
    TargetUnknown { name: String },

    #[error("No courses found on the page. The page structure may have changed or this college may not have course information available. URL: {url}")]
    DiscoveryEmpty { url: String },

    #[error("No data found after scraping")]
    AggregateEmpty,

    #[error("Group {index} failed: {message}")]
    GroupTask { index: usize, message: String },

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn browser(err: impl std::fmt::Display) -> Self {
        AppError::Browser(err.to_string())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }

    /// Short variant name used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::TargetUnknown { .. } => "TargetUnknown",
            AppError::DiscoveryEmpty { .. } => "DiscoveryEmpty",
            AppError::AggregateEmpty => "AggregateEmpty",
            AppError::GroupTask { .. } => "GroupTask",
            AppError::Browser(_) => "Browser",
            AppError::Config(_) => "Config",
            AppError::Serialization(_) => "Serialization",
            AppError::Io(_) => "Io",
            AppError::Csv(_) => "Csv",
            AppError::Zip(_) => "Zip",
            AppError::Internal(_) => "Internal",
        }
    }

    /// Expected "nothing to deliver" outcomes, as opposed to failures.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AppError::TargetUnknown { .. } | AppError::DiscoveryEmpty { .. } | AppError::AggregateEmpty
        )
    }

    /// Message shown to both the HTTP caller and the progress poller.
    /// Never empty.
    pub fn user_message(&self) -> String {
        match self {
            AppError::TargetUnknown { .. } => "College not found".to_string(),
            AppError::DiscoveryEmpty { .. } | AppError::AggregateEmpty => self.to_string(),
            other => {
                let details = match other.detail() {
                    d if d.trim().is_empty() => "No error message available".to_string(),
                    d => d,
                };
                format!("Unexpected error ({}): {}", other.kind(), details)
            }
        }
    }

    fn detail(&self) -> String {
        match self {
            AppError::Browser(msg) | AppError::Internal(msg) => msg.clone(),
            AppError::GroupTask { message, .. } => message.clone(),
            AppError::Config(e) => e.to_string(),
            AppError::Serialization(e) => e.to_string(),
            AppError::Io(e) => e.to_string(),
            AppError::Csv(e) => e.to_string(),
            AppError::Zip(e) => e.to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("background task failed: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
