// API 集成测试
//
// 通过 tower::ServiceExt::oneshot 直接驱动路由

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use image_compression_backend::api::{router, AppState};
use image_compression_backend::{CompressionConfig, ImageCompressor};
use serde_json::Value;
use std::io::Cursor;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;
use url::Url;

fn app(temp_dir: &TempDir) -> axum::Router {
    let config = CompressionConfig {
        compressed_dir: temp_dir.path().join("compressed_imgs"),
        ..CompressionConfig::default()
    };
    let compressor = Arc::new(ImageCompressor::new(config).unwrap());
    router(AppState { compressor })
}

fn jpeg_source(temp_dir: &TempDir) -> String {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([120, 60, 30])));
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Jpeg)
        .unwrap();

    let path = temp_dir.path().join("photo.jpg");
    std::fs::write(&path, buffer).unwrap();
    Url::from_file_path(&path).unwrap().to_string()
}

async fn call(app: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn compress_uri(origin: &str) -> String {
    format!(
        "/api/compress?origin_img_url={}",
        urlencoding::encode(origin)
    )
}

#[tokio::test]
async fn test_compress_success_envelope() {
    let temp_dir = TempDir::new().unwrap();
    let origin = jpeg_source(&temp_dir);

    let request = Request::get(compress_uri(&origin)).body(Body::empty()).unwrap();
    let (status, body) = call(app(&temp_dir), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "image compressed");
    assert_eq!(body["data"][0], origin.as_str());
    assert!(temp_dir.path().join("compressed_imgs/photo.jpg").exists());
}

#[tokio::test]
async fn test_second_request_reports_still_fresh() {
    let temp_dir = TempDir::new().unwrap();
    let origin = jpeg_source(&temp_dir);
    let app = app(&temp_dir);

    let first = Request::get(compress_uri(&origin)).body(Body::empty()).unwrap();
    call(app.clone(), first).await;

    let second = Request::get(compress_uri(&origin)).body(Body::empty()).unwrap();
    let (status, body) = call(app, second).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["type"], "still_fresh");
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("unable to compress image: image still within lifetime"));
}

#[tokio::test]
async fn test_gif_is_rejected() {
    let temp_dir = TempDir::new().unwrap();

    let request = Request::get(compress_uri("https://example.com/a.gif"))
        .body(Body::empty())
        .unwrap();
    let (status, body) = call(app(&temp_dir), request).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["type"], "unsupported_source");
    assert_eq!(body["data"][0], "https://example.com/a.gif");
}

#[tokio::test]
async fn test_invalid_quality_is_bad_request() {
    let temp_dir = TempDir::new().unwrap();
    let uri = format!("{}&quality=150", compress_uri("https://example.com/a.jpg"));

    let request = Request::get(uri).body(Body::empty()).unwrap();
    let (status, body) = call(app(&temp_dir), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "bad_request");
}

#[tokio::test]
async fn test_missing_origin_is_bad_request() {
    let temp_dir = TempDir::new().unwrap();

    let request = Request::get("/api/compress").body(Body::empty()).unwrap();
    let (status, body) = call(app(&temp_dir), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_lookup_without_origin_is_bad_request() {
    let temp_dir = TempDir::new().unwrap();

    for uri in ["/api/compress/lookup", "/api/compress/lookup?origin_img_url=%20"] {
        let request = Request::get(uri).body(Body::empty()).unwrap();
        let (status, body) = call(app(&temp_dir), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["type"], "bad_request");
    }
}

#[tokio::test]
async fn test_form_post_compresses() {
    let temp_dir = TempDir::new().unwrap();
    let origin = jpeg_source(&temp_dir);
    let form = format!(
        "origin_img_url={}&quality=70&additional_dir=posted",
        urlencoding::encode(&origin)
    );

    let request = Request::post("/api/compress")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(form))
        .unwrap();
    let (status, body) = call(app(&temp_dir), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(temp_dir
        .path()
        .join("compressed_imgs/posted/photo.jpg")
        .exists());
}

#[tokio::test]
async fn test_lookup_and_health() {
    let temp_dir = TempDir::new().unwrap();
    let origin = jpeg_source(&temp_dir);
    let app = app(&temp_dir);

    let uri = format!(
        "/api/compress/lookup?origin_img_url={}",
        urlencoding::encode(&origin)
    );
    let (status, body) = call(app.clone(), Request::get(uri).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["exists"], false);

    let (status, body) = call(app, Request::get("/api/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["lifetime"], "6 hours");
}
