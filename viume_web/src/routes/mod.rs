mod health;
mod metrics;
mod pages;
pub mod scanner;

use crate::server::SharedState;
use axum::{extract::DefaultBodyLimit, routing::get, Router};

pub fn api_routes(max_upload_bytes: usize) -> Router<SharedState> {
    Router::new()
        .route("/", get(pages::page))
        .route(
            "/scanner",
            get(pages::scanner_page).post(scanner::scan_upload),
        )
        .route("/health", get(health::healthcheck))
        .route("/metrics", get(metrics::metrics_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}
