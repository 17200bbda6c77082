use crate::{page::Page, server::SharedState, views};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;
use tracing::instrument;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    page: Option<String>,
}

#[instrument(skip(state))]
pub async fn page(State(state): State<SharedState>, Query(query): Query<PageQuery>) -> Response {
    state.metrics.record_request("page");

    let Some(slug) = query.page else {
        return Html(Page::default().render()).into_response();
    };

    match Page::from_slug(&slug) {
        Some(page) => Html(page.render()).into_response(),
        None => (StatusCode::NOT_FOUND, Html(views::not_found(&slug))).into_response(),
    }
}

#[instrument(skip(state))]
pub async fn scanner_page(State(state): State<SharedState>) -> Html<String> {
    state.metrics.record_request("page");
    Html(Page::Scanner.render())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        scanner::{tests::MockDetector, ScanService},
        telemetry::Metrics,
    };
    use axum::body::to_bytes;
    use std::sync::Arc;
    use viume_annotator::ClassRegistry;

    fn state() -> SharedState {
        let metrics = Arc::new(Metrics::new().unwrap());
        let scan_service = ScanService::new(
            Arc::new(MockDetector::new(vec![])),
            ClassRegistry::cervical_cells(),
            metrics.clone(),
        )
        .unwrap();

        SharedState {
            scan_service,
            metrics,
        }
    }

    async fn get(slug: Option<&str>) -> (StatusCode, String) {
        let query = PageQuery {
            page: slug.map(str::to_string),
        };
        let response = page(State(state()), Query(query)).await;
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_defaults_to_home() {
        let (status, body) = get(None).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("DIGITAL PATHOLOGY PLATFORM FOR CERVICAL CANCER DETECTION"));
    }

    #[tokio::test]
    async fn test_dispatches_on_page_parameter() {
        let (_, scanner) = get(Some("scanner")).await;
        assert!(scanner.contains(r#"enctype="multipart/form-data""#));

        let (_, contact) = get(Some("contact")).await;
        assert!(contact.contains("info.viume@gmail.com"));
    }

    #[tokio::test]
    async fn test_unknown_page_is_not_found() {
        let (status, body) = get(Some("<admin>")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("&lt;admin&gt;"));
    }
}
