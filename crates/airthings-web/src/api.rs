//! HTTP handlers

use crate::{AppState, PROMETHEUS_CONTENT_TYPE};
use airthings_core::{ScrapeBuffer, EXPORTER_VERSION};
use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Json},
};
use std::sync::Arc;

/// Run a scrape and render it with the exporter self-metrics
///
/// Always answers 200; a failed scrape shows up as missing device
/// series and in `airthings_exporter_scrape_errors_total`.
pub async fn get_metrics_prometheus(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut buffer = ScrapeBuffer::new();
    let report = state.pipeline.collect(&mut buffer).await;
    report.record_into(&state.stats);

    let mut body = buffer.to_prometheus();
    body.push_str(&state.stats.to_prometheus());

    ([(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], body)
}

pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(state.stats.to_json())
}

/// Health check endpoint for Docker/Kubernetes liveness checks
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "airthings-exporter",
        "version": EXPORTER_VERSION
    }))
}

#[cfg(test)]
mod tests {
    use crate::{router, AppState};
    use airthings_cloud::{CloudClient, CloudConfig, CollectionPipeline};
    use airthings_core::{ExporterStats, ScrapeStage, EXPORTER_VERSION};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn state_for(server: &MockServer) -> Arc<AppState> {
        let mut config = CloudConfig::new("id", "secret").with_endpoints(
            format!("{}/v1/token", server.uri()),
            format!("{}/v1", server.uri()),
        );
        config.follow_pagination = false;
        let client = Arc::new(CloudClient::new(config).unwrap());
        Arc::new(AppState::new(
            Arc::new(CollectionPipeline::new(client)),
            Arc::new(ExporterStats::new()),
        ))
    }

    async fn get(state: Arc<AppState>, uri: &str) -> (StatusCode, Option<String>, String) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = router(state).oneshot(request).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(bytes.to_vec()).unwrap();
        (status, content_type, body)
    }

    async fn mount_json(server: &MockServer, verb: &str, route: &str, body: serde_json::Value) {
        Mock::given(method(verb))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    async fn mount_account(server: &MockServer) {
        let token = serde_json::json!({
            "access_token": "tok",
            "token_type": "Bearer",
            "expires_in": 3600
        });
        let devices = serde_json::json!({
            "devices": [{"id": "2930000001", "deviceType": "WAVE_PLUS"}]
        });
        let sample = serde_json::json!({
            "data": {"battery": 85, "co2": 612.0, "humidity": 41.5, "temp": 21.5}
        });

        mount_json(server, "POST", "/v1/token", token).await;
        mount_json(server, "GET", "/v1/devices", devices).await;
        mount_json(server, "GET", "/v1/devices/2930000001/latest-samples", sample).await;
    }

    #[tokio::test]
    async fn test_metrics_endpoint_renders_scrape() {
        let server = MockServer::start().await;
        mount_account(&server).await;
        let state = state_for(&server);

        let (status, content_type, body) = get(state.clone(), "/metrics").await;

        assert_eq!(status, StatusCode::OK);
        assert!(content_type.unwrap().starts_with("text/plain; version=0.0.4"));
        assert!(body.contains("# TYPE airthings_device_battery_percent gauge"));
        let battery = r#"airthings_device_battery_percent{device_serial="2930000001"} 85"#;
        let humidity = r#"airthings_device_humidity_perecent{device_serial="2930000001"} 41.5"#;
        assert!(body.contains(battery));
        assert!(body.contains(humidity));
        assert!(!body.contains("airthings_device_voc_ppb"));
        assert!(body.contains("airthings_exporter_scrapes_total 1"));
        assert_eq!(state.stats.scrapes_total(), 1);
    }

    #[tokio::test]
    async fn test_metrics_endpoint_on_auth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/token"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        let state = state_for(&server);

        let (status, _, body) = get(state.clone(), "/metrics").await;

        assert_eq!(status, StatusCode::OK);
        assert!(!body.contains("airthings_device_"));
        assert!(body.contains(r#"airthings_exporter_scrape_errors_total{stage="auth"} 1"#));
        assert_eq!(state.stats.errors_total(ScrapeStage::Auth), 1);
    }

    #[tokio::test]
    async fn test_stats_and_health() {
        let server = MockServer::start().await;
        let state = state_for(&server);

        let (status, _, body) = get(state.clone(), "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        let health: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(health["status"], "healthy");
        assert_eq!(health["version"], EXPORTER_VERSION);

        let (status, _, body) = get(state, "/api/stats").await;
        assert_eq!(status, StatusCode::OK);
        let stats: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(stats["scrapes_total"], 0);
        assert!(stats["last_scrape"].is_null());
    }
}
