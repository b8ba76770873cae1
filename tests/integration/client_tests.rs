//! Outbound client tests against mocked HTTP services.
//!
//! Covers the storage REST client, the Replicate and Gemini providers, and
//! the Google Photos and OAuth clients.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use futures::StreamExt;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use image_relay::error::{GenerationError, OAuthError, PhotosError, StorageError};
use image_relay::generation::{
    drain_byte_stream, ChunkSource, GeminiProvider, ReplicateProvider, StreamChunk,
    TransformInput, TransformProvider,
};
use image_relay::identity::Credential;
use image_relay::oauth::GoogleOAuth;
use image_relay::photos::PhotosClient;
use image_relay::storage::{ObjectStore, RestStorage, StorageFactory, StorageObject};

fn server_url(server: &MockServer) -> Url {
    Url::parse(&server.uri()).unwrap()
}

// =============================================================================
// REST Storage
// =============================================================================

fn scoped_client(server: &MockServer, token: &str) -> impl ObjectStore {
    let storage = RestStorage::new(
        reqwest::Client::new(),
        &server_url(server),
        "anon-key",
        "user-images",
    );
    storage.for_caller(&Credential::from_authorization(Some(format!("Bearer {token}").as_str())).unwrap())
}

fn object(path: &str) -> StorageObject {
    StorageObject {
        path: path.to_string(),
        bytes: Bytes::from_static(&[1, 2]),
        content_type: "image/jpeg".to_string(),
        cache_max_age: 3600,
    }
}

#[tokio::test]
async fn test_storage_probe_sends_caller_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/storage/v1/object/list/user-images"))
        .and(header("authorization", "Bearer caller-token"))
        .and(header("apikey", "anon-key"))
        .and(body_json(json!({"prefix": "", "limit": 1, "offset": 0})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    scoped_client(&server, "caller-token").probe().await.unwrap();
}

#[tokio::test]
async fn test_storage_probe_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/storage/v1/object/list/user-images"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "invalid JWT"})),
        )
        .mount(&server)
        .await;

    match scoped_client(&server, "expired").probe().await {
        Err(StorageError::Api { status, message }) => {
            assert_eq!(status, 401);
            assert_eq!(message, "invalid JWT");
        }
        other => panic!("expected Api error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_storage_put_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/storage/v1/object/user-images/u1/transform-1-a.jpg"))
        .and(header("authorization", "Bearer caller-token"))
        .and(header("content-type", "image/jpeg"))
        .and(header("cache-control", "max-age=3600"))
        .and(header("x-upsert", "false"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"Key": "user-images/u1/transform-1-a.jpg"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = scoped_client(&server, "caller-token");
    client.put_object(object("u1/transform-1-a.jpg")).await.unwrap();
    assert_eq!(
        client.public_url("u1/transform-1-a.jpg"),
        format!(
            "{}/storage/v1/object/public/user-images/u1/transform-1-a.jpg",
            server.uri()
        )
    );
}

#[tokio::test]
async fn test_storage_put_duplicate() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/storage/v1/object/user-images/u1/dup.jpg"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "statusCode": "409",
            "error": "Duplicate",
            "message": "The resource already exists"
        })))
        .mount(&server)
        .await;

    let result = scoped_client(&server, "t").put_object(object("u1/dup.jpg")).await;
    assert!(matches!(result, Err(StorageError::AlreadyExists(ref p)) if p == "u1/dup.jpg"));
}

// =============================================================================
// Replicate
// =============================================================================

fn replicate(server: &MockServer) -> ReplicateProvider {
    ReplicateProvider::new(
        reqwest::Client::new(),
        &server_url(server),
        "owner/model",
        "r8_token",
    )
    .with_poll_interval(Duration::from_millis(10))
}

#[tokio::test]
async fn test_replicate_polls_until_succeeded() {
    let server = MockServer::start().await;
    let uri = server.uri();

    Mock::given(method("POST"))
        .and(path("/v1/models/owner/model/predictions"))
        .and(header("authorization", "Bearer r8_token"))
        .and(header("prefer", "wait"))
        .and(body_string_contains("make it night"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "p1",
            "status": "processing",
            "urls": {"get": format!("{uri}/v1/predictions/p1")}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/predictions/p1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "p1",
            "status": "succeeded",
            "output": format!("{uri}/output/p1.jpg")
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/output/p1.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x01, 0x02, 0x03]))
        .expect(1)
        .mount(&server)
        .await;

    let stream = replicate(&server)
        .run(&TransformInput::new("https://images.example/cat.jpg", "make it night"))
        .await
        .unwrap();
    let bytes = drain_byte_stream(stream).await.unwrap();
    assert_eq!(bytes.as_ref(), &[0x01, 0x02, 0x03]);
}

#[tokio::test]
async fn test_replicate_failed_prediction() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/models/owner/model/predictions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "p2",
            "status": "failed",
            "error": "NSFW content detected"
        })))
        .mount(&server)
        .await;

    let result = replicate(&server)
        .run(&TransformInput::new("https://images.example/cat.jpg", "p"))
        .await;
    match result {
        Err(GenerationError::Provider(message)) => assert_eq!(message, "NSFW content detected"),
        Err(other) => panic!("expected Provider error, got {:?}", other),
        Ok(_) => panic!("expected failure"),
    }
}

#[tokio::test]
async fn test_replicate_rejected_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/models/owner/model/predictions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthenticated"))
        .mount(&server)
        .await;

    let result = replicate(&server)
        .run(&TransformInput::new("https://images.example/cat.jpg", "p"))
        .await;
    assert!(matches!(result, Err(GenerationError::Provider(ref m)) if m.contains("Unauthenticated")));
}

// =============================================================================
// Gemini
// =============================================================================

fn sse_event(parts: serde_json::Value) -> String {
    let payload = json!({"candidates": [{"content": {"role": "model", "parts": parts}}]});
    format!("data: {}\r\n\r\n", payload)
}

#[tokio::test]
async fn test_gemini_stream_decodes_parts() {
    let server = MockServer::start().await;
    let image = STANDARD.encode(b"png-bytes");
    let body = format!(
        "{}{}",
        sse_event(json!([{"text": "Here is "}, {"text": "your image"}])),
        sse_event(json!([{"inlineData": {"mimeType": "image/png", "data": image}}]))
    );

    Mock::given(method("POST"))
        .and(path("/v1beta/models/test-model:streamGenerateContent"))
        .and(query_param("alt", "sse"))
        .and(header("x-goog-api-key", "gemini-key"))
        .and(body_string_contains("responseModalities"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let provider = GeminiProvider::new(
        reqwest::Client::new(),
        &server_url(&server),
        "test-model",
        "gemini-key",
    );
    let chunks: Vec<StreamChunk> = provider
        .stream_chunks("a lighthouse")
        .await
        .unwrap()
        .map(|chunk| chunk.unwrap())
        .collect()
        .await;

    assert_eq!(
        chunks,
        vec![
            StreamChunk::Text {
                text: "Here is ".to_string()
            },
            StreamChunk::Text {
                text: "your image".to_string()
            },
            StreamChunk::Image {
                mime_type: "image/png".to_string(),
                bytes: Bytes::from_static(b"png-bytes"),
            },
        ]
    );
}

#[tokio::test]
async fn test_gemini_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/test-model:streamGenerateContent"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"code": 429, "message": "Resource has been exhausted"}
        })))
        .mount(&server)
        .await;

    let provider = GeminiProvider::new(
        reqwest::Client::new(),
        &server_url(&server),
        "test-model",
        "gemini-key",
    );
    match provider.stream_chunks("p").await {
        Err(GenerationError::Provider(message)) => {
            assert!(message.contains("Resource has been exhausted"))
        }
        Err(other) => panic!("expected Provider error, got {:?}", other),
        Ok(_) => panic!("expected failure"),
    }
}

// =============================================================================
// Google Photos
// =============================================================================

#[tokio::test]
async fn test_photos_create_album() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/albums"))
        .and(header("authorization", "Bearer ya29.token"))
        .and(body_json(json!({"album": {"title": "Trips"}})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "album-1", "title": "Trips"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let photos = PhotosClient::new(reqwest::Client::new(), &server_url(&server));
    let id = photos.create_album("ya29.token", "Trips").await.unwrap();
    assert_eq!(id, "album-1");
}

#[tokio::test]
async fn test_photos_create_album_without_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/albums"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let photos = PhotosClient::new(reqwest::Client::new(), &server_url(&server));
    let result = photos.create_album("ya29.token", "Trips").await;
    assert!(matches!(result, Err(PhotosError::MissingAlbumId)));
}

#[tokio::test]
async fn test_photos_upload_two_steps() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/uploads"))
        .and(header("x-goog-upload-protocol", "raw"))
        .and(header("x-goog-upload-file-name", "cat.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_string("upload-token-1"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/mediaItems:batchCreate"))
        .and(body_json(json!({
            "albumId": "album-1",
            "newMediaItems": [{
                "description": "Uploaded from Gallery App",
                "simpleMediaItem": {"uploadToken": "upload-token-1"}
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "newMediaItemResults": [{"uploadToken": "upload-token-1", "status": {"message": "Success"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let photos = PhotosClient::new(reqwest::Client::new(), &server_url(&server));
    let result = photos
        .upload_to_album(
            "ya29.token",
            Some("album-1"),
            "cat.jpg",
            Bytes::from_static(b"jpeg"),
        )
        .await
        .unwrap();
    assert_eq!(
        result["newMediaItemResults"][0]["status"]["message"],
        "Success"
    );
}

// =============================================================================
// Google OAuth
// =============================================================================

fn oauth(server: &MockServer) -> GoogleOAuth {
    GoogleOAuth::new(
        reqwest::Client::new(),
        "client-1",
        "secret-1",
        &Url::parse("http://localhost:5000").unwrap(),
        Url::parse("http://localhost:3000").unwrap(),
    )
    .unwrap()
    .with_endpoints(
        Url::parse(&format!("{}/o/oauth2/v2/auth", server.uri())).unwrap(),
        Url::parse(&format!("{}/token", server.uri())).unwrap(),
    )
}

#[tokio::test]
async fn test_oauth_exchange_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("code=auth-code"))
        .and(body_string_contains("grant_type=authorization_code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.fresh",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let token = oauth(&server).exchange_code("auth-code").await.unwrap();
    assert_eq!(token, "ya29.fresh");
}

#[tokio::test]
async fn test_oauth_exchange_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})),
        )
        .mount(&server)
        .await;

    let result = oauth(&server).exchange_code("stale").await;
    assert!(matches!(result, Err(OAuthError::Exchange(ref m)) if m.contains("invalid_grant")));
}
