use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use bytes::Bytes;
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::Value;
use tower::ServiceExt;

use vid2audio::app::create_app;
use vid2audio::config::settings::GatewaySettings;
use vid2audio::infrastructure::queue::MemoryBroker;
use vid2audio::infrastructure::storage::{BlobId, MemoryBlobStore};
use vid2audio::middleware::auth::TokenClaims;
use vid2audio::modules::conversion::JobMessage;
use vid2audio::modules::media::service::Producer;
use vid2audio::state::AppState;

const SECRET: &str = "test-secret";
const BOUNDARY: &str = "----vid2audio-boundary";

struct Gateway {
    app: Router,
    videos: MemoryBlobStore,
    results: MemoryBlobStore,
    broker: MemoryBroker,
}

fn gateway_with_limit(max_upload_bytes: usize) -> Gateway {
    let videos = MemoryBlobStore::new();
    let results = MemoryBlobStore::new();
    let broker = MemoryBroker::new();

    let settings = GatewaySettings {
        server_port: 0,
        jwt_secret: SECRET.to_string(),
        max_upload_bytes,
    };
    let producer = Producer::new(Arc::new(videos.clone()), Arc::new(broker.clone()), "video");
    let state = AppState::new(settings, producer, Arc::new(results.clone()));

    Gateway {
        app: create_app(state),
        videos,
        results,
        broker,
    }
}

fn gateway() -> Gateway {
    gateway_with_limit(1024 * 1024)
}

fn token(username: &str, admin: bool, secret: &str) -> String {
    let exp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as usize
        + 3600;
    let claims = TokenClaims {
        username: username.to_string(),
        admin,
        exp,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

fn multipart(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, data) in files {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}.mp4\"\r\n",
                name, name
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: video/mp4\r\n\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn upload_request(bearer: Option<&str>, body: Vec<u8>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/v1/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body)).unwrap()
}

fn download_request(bearer: &str, query: &str) -> Request<Body> {
    Request::builder()
        .uri(format!("/api/v1/download{}", query))
        .header(header::AUTHORIZATION, format!("Bearer {}", bearer))
        .body(Body::empty())
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let gw = gateway();

    let response = gw
        .app
        .oneshot(Request::builder().uri("/api/v1/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_upload_stores_video_and_enqueues_job() {
    let gw = gateway();
    let admin = token("alice", true, SECRET);

    let response = gw
        .app
        .oneshot(upload_request(
            Some(&admin),
            multipart(&[("video", &b"fake mp4 bytes"[..])]),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    assert_eq!(body["status"], "success");
    let video_ref = BlobId::from(body["data"]["video_ref"].as_str().unwrap());

    assert!(gw.videos.contains(&video_ref).await);

    let published = gw.broker.stats("video").await.published;
    assert_eq!(published.len(), 1);
    let job = JobMessage::parse(&published[0]).unwrap();
    assert_eq!(job.video_ref, video_ref);
    assert_eq!(job.owner, "alice");
    assert_eq!(job.result_ref, None);
}

#[tokio::test]
async fn test_upload_without_token_is_unauthorized() {
    let gw = gateway();

    let response = gw
        .app
        .oneshot(upload_request(None, multipart(&[("video", &b"bytes"[..])])))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(gw.videos.is_empty().await);
}

#[tokio::test]
async fn test_upload_with_forged_token_is_unauthorized() {
    let gw = gateway();
    let forged = token("mallory", true, "some-other-secret");

    let response = gw
        .app
        .oneshot(upload_request(Some(&forged), multipart(&[("video", &b"bytes"[..])])))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_upload_requires_admin() {
    let gw = gateway();
    let user = token("bob", false, SECRET);

    let response = gw
        .app
        .oneshot(upload_request(Some(&user), multipart(&[("video", &b"bytes"[..])])))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(gw.videos.is_empty().await);
}

#[tokio::test]
async fn test_upload_requires_exactly_one_file() {
    let gw = gateway();
    let admin = token("alice", true, SECRET);

    let none = gw
        .app
        .clone()
        .oneshot(upload_request(Some(&admin), multipart(&[])))
        .await
        .unwrap();
    assert_eq!(none.status(), StatusCode::BAD_REQUEST);

    let two = gw
        .app
        .oneshot(upload_request(
            Some(&admin),
            multipart(&[("a", &b"one"[..]), ("b", &b"two"[..])]),
        ))
        .await
        .unwrap();
    assert_eq!(two.status(), StatusCode::BAD_REQUEST);

    assert!(gw.broker.stats("video").await.published.is_empty());
}

#[tokio::test]
async fn test_upload_over_limit_is_rejected() {
    let gw = gateway_with_limit(16);
    let admin = token("alice", true, SECRET);

    let body = multipart(&[("video", &[0u8; 64][..])]);
    let mut request = upload_request(Some(&admin), body.clone());
    request
        .headers_mut()
        .insert(header::CONTENT_LENGTH, body.len().into());

    let response = gw.app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(gw.videos.is_empty().await);
}

#[tokio::test]
async fn test_upload_rolls_back_when_queue_refuses() {
    let gw = gateway();
    gw.broker.fail_publishes("video", true).await;
    let admin = token("alice", true, SECRET);

    let response = gw
        .app
        .oneshot(upload_request(Some(&admin), multipart(&[("video", &b"bytes"[..])])))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(gw.videos.is_empty().await);
}

#[tokio::test]
async fn test_download_returns_audio() {
    let gw = gateway();
    gw.results.insert("r1", Bytes::from_static(b"ID3 audio")).await;
    let admin = token("alice", true, SECRET);

    let response = gw
        .app
        .oneshot(download_request(&admin, "?fid=r1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mpeg");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"r1.mp3\""
    );
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"ID3 audio");
}

#[tokio::test]
async fn test_download_unknown_fid_is_not_found() {
    let gw = gateway();
    let admin = token("alice", true, SECRET);

    let response = gw
        .app
        .oneshot(download_request(&admin, "?fid=missing"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_download_requires_fid() {
    let gw = gateway();
    let admin = token("alice", true, SECRET);

    let response = gw
        .app
        .oneshot(download_request(&admin, ""))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["status"], "error");
}
