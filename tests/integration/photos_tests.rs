//! Google Photos and OAuth route tests.
//!
//! The router is wired to real clients pointed at a mock server.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::json;
use tower::ServiceExt;
use url::Url;
use wiremock::matchers::{header as header_eq, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use image_relay::generation::GenerationAdapter;
use image_relay::oauth::GoogleOAuth;
use image_relay::photos::PhotosClient;
use image_relay::pipeline::TransformPipeline;
use image_relay::server::{create_router, AppState, RouterConfig};

use super::test_utils::{MockChunks, MockStorage, MockTransform};

const BOUNDARY: &str = "relay-test-boundary";

fn router(server: &MockServer) -> Router {
    let http = reqwest::Client::new();
    let base = Url::parse(&server.uri()).unwrap();

    let adapter = GenerationAdapter::new(
        Arc::new(MockTransform::with_chunks(Vec::new())),
        Arc::new(MockChunks::new(Vec::new())),
    );
    let pipeline = TransformPipeline::new(MockStorage::new(), Arc::new(adapter));

    let oauth = GoogleOAuth::new(
        http.clone(),
        "client-1",
        "secret-1",
        &Url::parse("https://api.gallery.example").unwrap(),
        Url::parse("https://gallery.example").unwrap(),
    )
    .unwrap()
    .with_endpoints(
        Url::parse(&format!("{}/o/oauth2/v2/auth", server.uri())).unwrap(),
        Url::parse(&format!("{}/token", server.uri())).unwrap(),
    );

    let state = AppState::new(pipeline)
        .with_photos(PhotosClient::new(http, &base))
        .with_oauth(oauth);
    create_router(state, RouterConfig::new().with_tracing(false))
}

fn multipart_body(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, file_name, content) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match file_name {
            Some(file_name) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: image/jpeg\r\n\r\n",
                    name, file_name
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
            ),
        }
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn upload_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// =============================================================================
// Albums
// =============================================================================

#[tokio::test]
async fn test_create_album_route() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/albums"))
        .and(header_eq("authorization", "Bearer ya29.token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "album-9"})))
        .expect(1)
        .mount(&server)
        .await;

    let request = Request::builder()
        .method("POST")
        .uri("/create-album")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            r#"{"accessToken":"ya29.token","albumTitle":"Summer"}"#,
        ))
        .unwrap();

    let response = router(&server).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"id": "album-9"}));
}

#[tokio::test]
async fn test_create_album_missing_fields() {
    let server = MockServer::start().await;
    let request = Request::builder()
        .method("POST")
        .uri("/create-album")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"albumTitle":"Summer"}"#))
        .unwrap();

    let response = router(&server).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_album_api_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/albums"))
        .respond_with(ResponseTemplate::new(403).set_body_string("insufficient scopes"))
        .mount(&server)
        .await;

    let request = Request::builder()
        .method("POST")
        .uri("/create-album")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"accessToken":"t","albumTitle":"Summer"}"#))
        .unwrap();

    let response = router(&server).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"], "Album creation failed");
}

// =============================================================================
// Upload
// =============================================================================

#[tokio::test]
async fn test_upload_route() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/uploads"))
        .and(header_eq("x-goog-upload-file-name", "beach.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_string("tok-1"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/mediaItems:batchCreate"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"newMediaItemResults": []})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let body = multipart_body(&[
        ("image", Some("beach.jpg"), &b"\xff\xd8\xff\xe0jpeg"[..]),
        ("accessToken", None, &b"ya29.token"[..]),
        ("albumId", None, &b"album-1"[..]),
    ]);

    let response = router(&server).oneshot(upload_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"newMediaItemResults": []}));
}

#[tokio::test]
async fn test_upload_missing_token() {
    let server = MockServer::start().await;
    let body = multipart_body(&[("image", Some("beach.jpg"), &b"jpeg"[..])]);

    let response = router(&server).oneshot(upload_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_api_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/uploads"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let body = multipart_body(&[
        ("image", Some("beach.jpg"), &b"jpeg"[..]),
        ("accessToken", None, &b"expired"[..]),
    ]);

    let response = router(&server).oneshot(upload_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"], "Upload failed");
}

// =============================================================================
// OAuth
// =============================================================================

#[tokio::test]
async fn test_google_auth_redirect() {
    let server = MockServer::start().await;
    let request = Request::builder()
        .uri("/auth/google")
        .body(Body::empty())
        .unwrap();

    let response = router(&server).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);

    let location = response.headers().get(header::LOCATION).unwrap().to_str().unwrap();
    let location = Url::parse(location).unwrap();
    assert_eq!(location.path(), "/o/oauth2/v2/auth");
    let pairs: Vec<(String, String)> = location.query_pairs().into_owned().collect();
    assert!(pairs.contains(&("access_type".to_string(), "offline".to_string())));
    assert!(pairs.contains(&(
        "redirect_uri".to_string(),
        "https://api.gallery.example/auth/google/callback".to_string()
    )));
}

#[tokio::test]
async fn test_google_callback_redirects_with_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"access_token": "ya29.new"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let request = Request::builder()
        .uri("/auth/google/callback?code=abc")
        .body(Body::empty())
        .unwrap();

    let response = router(&server).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "https://gallery.example/?access_token=ya29.new"
    );
}

#[tokio::test]
async fn test_google_callback_without_code() {
    let server = MockServer::start().await;
    let request = Request::builder()
        .uri("/auth/google/callback")
        .body(Body::empty())
        .unwrap();

    let response = router(&server).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_google_callback_exchange_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
        .mount(&server)
        .await;

    let request = Request::builder()
        .uri("/auth/google/callback?code=stale")
        .body(Body::empty())
        .unwrap();

    let response = router(&server).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}
