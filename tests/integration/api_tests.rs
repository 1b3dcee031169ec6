//! API integration tests for image previews and the UI endpoints.
//!
//! Tests verify:
//! - Preview generation, cache hits and the fallback path
//! - Error cases (missing image, unconfigured folder, traversal)
//! - Workflow listing, endpoint reporting and static files

use std::time::Duration;

use axum::http::StatusCode;
use clap::Parser;

use comfy_frontend::config::{Cli, Command};
use comfy_frontend::preview::{PreviewService, StorageRoots};

use super::test_utils::{
    body_bytes, body_json, create_corrupt_png, create_rgba_png, get, header, is_valid_jpeg,
    CountingTranscoder, TestEnv, UNREACHABLE_ENDPOINT,
};

// =============================================================================
// Image Previews
// =============================================================================

#[tokio::test]
async fn test_get_image_generates_preview() {
    let env = TestEnv::new();
    env.put_output("render.png", &create_rgba_png(64, 48));

    let response = get(env.router(), "/api/get_image?filename=render.png&type=output").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-type"), Some("image/jpeg"));
    assert_eq!(header(&response, "x-preview-cache"), Some("miss"));

    let body = body_bytes(response).await;
    assert!(is_valid_jpeg(&body), "Response should be a valid JPEG");

    // The artifact lands in the temp folder, not next to the original
    let derived = env.temp.join("render_minify.png");
    assert!(derived.is_file());
    assert_eq!(std::fs::read(&derived).unwrap(), body);
    assert!(!env.output.join("render_minify.png").exists());
}

#[tokio::test]
async fn test_get_image_preview_has_no_alpha() {
    let env = TestEnv::new();
    env.put_temp("mask.png", &create_rgba_png(32, 32));

    let response = get(env.router(), "/api/get_image?filename=mask.png&type=temp").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_bytes(response).await;
    let decoded = image::load_from_memory(&body).unwrap();
    assert!(!decoded.color().has_alpha());

    // Half-transparent red over white
    let pixel = decoded.to_rgb8().get_pixel(2, 16).0;
    assert!(pixel[0] > 230, "red channel {}", pixel[0]);
    assert!(pixel[1] > 100 && pixel[1] < 160, "green channel {}", pixel[1]);
}

#[tokio::test]
async fn test_get_image_second_request_is_cache_hit() {
    let env = TestEnv::new();
    env.put_output("render.png", &create_rgba_png(32, 32));
    let router = env.router();
    let uri = "/api/get_image?filename=render.png&type=output";

    let first = get(router.clone(), uri).await;
    assert_eq!(header(&first, "x-preview-cache"), Some("miss"));
    let first_body = body_bytes(first).await;

    let derived = env.temp.join("render_minify.png");
    let modified = std::fs::metadata(&derived).unwrap().modified().unwrap();

    let second = get(router, uri).await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(header(&second, "x-preview-cache"), Some("hit"));
    assert_eq!(body_bytes(second).await, first_body);

    // Served from disk, not rewritten
    assert_eq!(
        std::fs::metadata(&derived).unwrap().modified().unwrap(),
        modified
    );
}

#[tokio::test]
async fn test_get_image_serves_existing_artifact_verbatim() {
    let env = TestEnv::new();
    env.put_output("render.png", &create_rgba_png(8, 8));
    env.put_temp("render_minify.png", b"previously generated");

    let response = get(env.router(), "/api/get_image?filename=render.png&type=output").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "x-preview-cache"), Some("hit"));
    assert_eq!(body_bytes(response).await, b"previously generated");
}

#[tokio::test]
async fn test_get_image_fallback_serves_original() {
    let env = TestEnv::new();
    let original = create_corrupt_png();
    env.put_output("broken.png", &original);

    let response = get(env.router(), "/api/get_image?filename=broken.png&type=output").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-type"), Some("image/jpeg"));
    assert_eq!(header(&response, "x-preview-cache"), Some("fallback"));
    let expected_length = original.len().to_string();
    assert_eq!(
        header(&response, "content-length"),
        Some(expected_length.as_str())
    );
    assert_eq!(body_bytes(response).await, original);

    // No artifact, partial or otherwise
    assert!(!env.temp.join("broken_minify.png").exists());
    assert_eq!(std::fs::read_dir(&env.temp).unwrap().count(), 0);
}

#[tokio::test]
async fn test_get_image_large_fallback_streams_whole_file() {
    let env = TestEnv::new();
    let mut original = create_corrupt_png();
    original.extend((0..3_000_000u32).map(|i| (i % 251) as u8));
    env.put_output("huge.png", &original);

    let response = get(env.router(), "/api/get_image?filename=huge.png&type=output").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "x-preview-cache"), Some("fallback"));
    assert_eq!(body_bytes(response).await, original);
}

#[tokio::test]
async fn test_default_quality_reaches_transcoder() {
    let env = TestEnv::new();
    env.put_output("render.png", &create_rgba_png(16, 16));

    let serve = match Cli::parse_from(["comfy-frontend"]).into_command() {
        Command::Serve(serve) => serve,
        other => panic!("expected serve, got {:?}", other),
    };
    let transcoder = CountingTranscoder::new(Duration::ZERO);
    let preview = PreviewService::with_transcoder(env.roots(), transcoder.clone(), serve.quality);
    let router = env.router_with(preview, UNREACHABLE_ENDPOINT);

    let response = get(router, "/api/get_image?filename=render.png&type=output").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(transcoder.qualities(), vec![85]);
}

#[tokio::test]
async fn test_get_image_unknown_type_means_output() {
    let env = TestEnv::new();
    env.put_output("render.png", &create_rgba_png(8, 8));

    let response = get(env.router(), "/api/get_image?filename=render.png&type=input").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_get_image_subfolder_filename() {
    let env = TestEnv::new();
    env.put_output("batch/render.png", &create_rgba_png(8, 8));

    let response = get(
        env.router(),
        "/api/get_image?filename=batch%2Frender.png&type=output",
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(env.temp.join("render_minify.png").is_file());
}

// =============================================================================
// Image Errors
// =============================================================================

#[tokio::test]
async fn test_get_image_not_found() {
    let env = TestEnv::new();

    let response = get(env.router(), "/api/get_image?filename=missing.png&type=output").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(header(&response, "content-type")
        .unwrap()
        .starts_with("text/plain"));
    assert_eq!(body_bytes(response).await, b"Image not found");

    // Nothing was generated for a missing source
    assert_eq!(std::fs::read_dir(&env.temp).unwrap().count(), 0);
}

#[tokio::test]
async fn test_get_image_directory_is_not_an_image() {
    let env = TestEnv::new();
    std::fs::create_dir_all(env.output.join("folder.png")).unwrap();

    let response = get(env.router(), "/api/get_image?filename=folder.png&type=output").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_image_unconfigured_temp_folder() {
    let env = TestEnv::new();
    env.put_output("render.png", &create_rgba_png(8, 8));

    let roots = StorageRoots::new(None, Some(env.output.clone()));
    let router = env.router_with(PreviewService::new(roots), UNREACHABLE_ENDPOINT);

    let response = get(router, "/api/get_image?filename=render.png&type=output").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({"error": "Folder configuration not found for type: temp"})
    );
}

#[tokio::test]
async fn test_get_image_unconfigured_output_folder() {
    let env = TestEnv::new();

    let roots = StorageRoots::new(Some(env.temp.clone()), None);
    let router = env.router_with(PreviewService::new(roots), UNREACHABLE_ENDPOINT);

    let response = get(router, "/api/get_image?filename=render.png&type=output").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await["error"],
        "Folder configuration not found for type: output"
    );
}

#[tokio::test]
async fn test_get_image_rejects_traversal() {
    let env = TestEnv::new();
    env.put_output("render.png", &create_rgba_png(8, 8));

    for filename in ["..%2Foutput%2Frender.png", "%2Fetc%2Fpasswd", ""] {
        let uri = format!("/api/get_image?filename={}&type=temp", filename);
        let response = get(env.router(), &uri).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", filename);
    }
}

#[cfg(unix)]
#[tokio::test]
async fn test_get_image_rejects_symlink_escape() {
    let env = TestEnv::new();
    let outside = env.dist.join("private.png");
    std::fs::write(&outside, create_rgba_png(8, 8)).unwrap();
    std::os::unix::fs::symlink(&outside, env.output.join("link.png")).unwrap();

    let response = get(env.router(), "/api/get_image?filename=link.png&type=output").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!env.temp.join("link_minify.png").exists());
}

#[tokio::test]
async fn test_get_image_missing_query_parameters() {
    let env = TestEnv::new();

    let response = get(env.router(), "/api/get_image?filename=render.png").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// UI Endpoints
// =============================================================================

#[tokio::test]
async fn test_workflows_sorted_json_only() {
    let env = TestEnv::new();
    env.put_workflow("txt2img.json");
    env.put_workflow("img2img.json");
    env.put_workflow("notes.txt");

    let response = get(env.router(), "/api/workflows").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        serde_json::json!(["img2img", "txt2img"])
    );
}

#[tokio::test]
async fn test_workflows_missing_directory_is_empty() {
    let env = TestEnv::new();

    let response = get(env.router(), "/api/workflows").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!([]));
}

#[tokio::test]
async fn test_comfyui_endpoint_verbatim() {
    let env = TestEnv::new();
    let router = env.router_with(
        PreviewService::new(env.roots()),
        "http://gpu-box.local:8188/",
    );

    let response = get(router, "/api/comfyui_endpoint").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({"endpoint": "http://gpu-box.local:8188/"})
    );
}

#[tokio::test]
async fn test_schemeless_endpoint_only_breaks_relay() {
    let env = TestEnv::new();
    env.put_output("render.png", &create_rgba_png(8, 8));
    let router = env.router_with(PreviewService::new(env.roots()), "127.0.0.1:8188");

    let response = get(
        router.clone(),
        "/api/get_image?filename=render.png&type=output",
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = get(router.clone(), "/api/comfyui_endpoint").await;
    assert_eq!(
        body_json(response).await,
        serde_json::json!({"endpoint": "127.0.0.1:8188"})
    );

    let response = get(router, "/api/object_info").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"], "Failed to get object info");
}

#[tokio::test]
async fn test_static_index_served() {
    let env = TestEnv::new();
    std::fs::write(env.dist.join("index.html"), "<html>ComfyUI</html>").unwrap();
    std::fs::write(env.dist.join("app.js"), "console.log(1)").unwrap();

    let response = get(env.router(), "/").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"<html>ComfyUI</html>");

    let response = get(env.router(), "/app.js").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_static_path_not_found() {
    let env = TestEnv::new();

    let response = get(env.router(), "/does/not/exist.js").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
