use axum::{middleware::from_fn, routing::get, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::service::ExtractionService;
use crate::AppConfig;

pub mod handlers;
pub mod middleware;
pub mod responses;

pub use handlers::{get_progress, health_check, list_colleges, scrape};
pub use responses::*;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ExtractionService>,
    pub config: AppConfig,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/colleges", get(list_colleges))
        .route("/scrape", get(scrape))
        .route("/progress/:task_id", get(get_progress))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(CorsLayer::permissive())
                .layer(from_fn(middleware::request_logging)),
        )
        .with_state(state)
}

pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let address = state.config.bind_address();
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!("Server starting on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down...");
        })
        .await?;

    Ok(())
}
