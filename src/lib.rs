pub mod browser;
pub mod config;
pub mod coordinator;
pub mod discovery;
pub mod export;
pub mod models;
pub mod progress;
pub mod render_session;
pub mod service;
pub mod table_extractor;
pub mod targets;
pub mod utils;
pub mod web;

// Re-export commonly used types
pub use config::AppConfig;
pub use service::ExtractionService;
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
