//! HTTP API for the control service.
//!
//! Provides endpoints for:
//! - Tenant management (create, get, list, delete)
//! - Health checks
//! - Prometheus metrics

mod tenants;

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;

use crate::error::ControlResult;
use crate::tenant::TenantManager;

pub use tenants::CreateTenantRequest;

/// Shared application state for the control service.
#[derive(Clone)]
pub struct AppState {
    /// Tenant manager for orchestrating tenant lifecycle.
    pub manager: Arc<TenantManager>,
    /// When the service started, for uptime reporting.
    pub started_at: Instant,
}

impl AppState {
    /// Create application state starting the uptime clock now.
    #[must_use]
    pub fn new(manager: Arc<TenantManager>) -> Self {
        Self {
            manager,
            started_at: Instant::now(),
        }
    }
}

/// Creates the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/tenants",
            get(tenants::list_tenants).post(tenants::create_tenant),
        )
        .route(
            "/tenants/{id}",
            get(tenants::get_tenant).delete(tenants::delete_tenant),
        )
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Health check endpoint.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now().to_rfc3339(),
        uptime: state.started_at.elapsed().as_secs(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Metrics endpoint.
async fn metrics(State(state): State<AppState>) -> ControlResult<String> {
    let counts = state.manager.registry().counts_by_status()?;
    let mut output = String::new();

    output.push_str("# HELP tenancy_tenants_total Number of tenants by deployment status\n");
    output.push_str("# TYPE tenancy_tenants_total gauge\n");

    for (status, count) in counts {
        let _ = writeln!(
            output,
            "tenancy_tenants_total{{deployment_status=\"{status}\"}} {count}"
        );
    }

    Ok(output)
}

/// Health response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
    /// Whole seconds since startup.
    uptime: u64,
    version: &'static str,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::TenantConfig;
    use crate::platform::{MockPlatform, PlatformGateway};
    use crate::registry::TenantRegistry;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn make_app_state() -> AppState {
        let platform: Arc<dyn PlatformGateway> = Arc::new(MockPlatform::new());
        let manager = Arc::new(TenantManager::new(
            Arc::new(TenantRegistry::new()),
            platform,
            TenantConfig::default(),
        ));
        AppState::new(manager)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn create_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/tenants")
            .header("content-type", "application/json")
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let app = router(make_app_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert!(body["uptime"].is_u64());
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn create_then_get() {
        let app = router(make_app_state());

        let response = app
            .clone()
            .oneshot(create_request(r#"{"id":"acme","name":"Acme Corp"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = body_json(response).await;
        assert_eq!(body["id"], "acme");
        assert_eq!(body["namespace"], "tenant-acme");
        assert_eq!(body["status"], "active");
        assert_eq!(body["deploymentStatus"], "creating");
        assert!(body["createdAt"].is_string());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/tenants/acme")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn create_rejects_malformed_id() {
        let app = router(make_app_state());

        let response = app
            .oneshot(create_request(r#"{"id":"Not_Valid","name":"x"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["statusCode"], 400);
        assert_eq!(body["error"], "invalid_tenant_id");
    }

    #[tokio::test]
    async fn create_rejects_empty_name() {
        let app = router(make_app_state());

        let response = app
            .oneshot(create_request(r#"{"id":"acme","name":"  "}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn create_rejects_body_missing_name() {
        let app = router(make_app_state());

        let response = app
            .oneshot(create_request(r#"{"id":"acme"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["statusCode"], 400);
        assert_eq!(body["error"], "invalid_request");
        assert!(body["message"].as_str().unwrap().contains("name"));
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn create_rejects_unparseable_body() {
        let app = router(make_app_state());

        let response = app
            .oneshot(create_request(r#"{"id":"acme","#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["statusCode"], 400);
        assert_eq!(body["error"], "invalid_request");
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let app = router(make_app_state());

        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/tenants/ghost")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn metrics_endpoint() {
        let app = router(make_app_state());

        app.clone()
            .oneshot(create_request(r#"{"id":"acme","name":"Acme"}"#))
            .await
            .unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("# TYPE tenancy_tenants_total gauge"));
        assert!(text.contains("tenancy_tenants_total{deployment_status=\"creating\"} 1"));
        assert!(text.contains("tenancy_tenants_total{deployment_status=\"error\"} 0"));
    }
}
