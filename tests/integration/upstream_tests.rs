//! Upstream relay integration tests for `/api/object_info`.

use axum::http::StatusCode;
use axum::routing::get as get_route;
use axum::Router;

use comfy_frontend::preview::PreviewService;

use super::test_utils::{
    body_bytes, body_json, get, header, spawn_object_info_upstream, spawn_upstream, TestEnv,
};

const CATALOGUE: &str = r#"{"KSampler":{"input":{"required":{"seed":["INT"]}},"category":"sampling"}}"#;

#[tokio::test]
async fn test_object_info_relayed_verbatim() {
    let env = TestEnv::new();
    let endpoint = spawn_object_info_upstream(CATALOGUE).await;
    let router = env.router_with(PreviewService::new(env.roots()), &endpoint);

    let response = get(router, "/api/object_info").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-type"), Some("application/json"));
    assert_eq!(body_bytes(response).await, CATALOGUE.as_bytes());
}

#[tokio::test]
async fn test_object_info_endpoint_with_trailing_slash() {
    let env = TestEnv::new();
    let endpoint = spawn_object_info_upstream(CATALOGUE).await;
    let router = env.router_with(
        PreviewService::new(env.roots()),
        &format!("{}/", endpoint),
    );

    let response = get(router, "/api/object_info").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_object_info_unreachable_upstream() {
    let env = TestEnv::new();

    let response = get(env.router(), "/api/object_info").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({"error": "Failed to get object info"})
    );
}

#[tokio::test]
async fn test_object_info_upstream_error_status() {
    let env = TestEnv::new();
    let endpoint = spawn_upstream(Router::new().route(
        "/object_info",
        get_route(|| async { (StatusCode::SERVICE_UNAVAILABLE, "busy") }),
    ))
    .await;
    let router = env.router_with(PreviewService::new(env.roots()), &endpoint);

    let response = get(router, "/api/object_info").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"], "Failed to get object info");
}

#[tokio::test]
async fn test_object_info_upstream_not_json() {
    let env = TestEnv::new();
    let endpoint = spawn_upstream(Router::new().route(
        "/object_info",
        get_route(|| async { "<html>proxy error</html>" }),
    ))
    .await;
    let router = env.router_with(PreviewService::new(env.roots()), &endpoint);

    let response = get(router, "/api/object_info").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_object_info_gzip_when_requested() {
    let env = TestEnv::new();
    let large: &'static str = Box::leak(
        format!(
            "{{\"nodes\":[{}]}}",
            vec!["\"CheckpointLoaderSimple\""; 500].join(",")
        )
        .into_boxed_str(),
    );
    let endpoint = spawn_object_info_upstream(large).await;
    let router = env.router_with(PreviewService::new(env.roots()), &endpoint);

    let request = axum::http::Request::builder()
        .uri("/api/object_info")
        .header("accept-encoding", "gzip")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(router, request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-encoding"), Some("gzip"));
}
