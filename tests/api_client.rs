use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use attendance_kiosk_lib::api::{ApiClient, ApiError, EndSessionProof};

#[derive(Clone, Default)]
struct Backend {
    recognition_bodies: Arc<Mutex<Vec<Value>>>,
    end_bodies: Arc<Mutex<Vec<(String, Value)>>>,
}

async fn live_recognition(
    State(backend): State<Backend>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let image = body["image"].as_str().unwrap_or_default().to_string();
    backend.recognition_bodies.lock().await.push(body);

    if image.ends_with("match") {
        (
            StatusCode::OK,
            Json(json!({
                "matched": true,
                "student_id": 17,
                "name": "Ada Lovelace",
                "image_filename": "capture_17.jpg",
                "qr_code": "iVBORw0KGgo/42",
                "message": "New session started"
            })),
        )
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "matched": false, "error": "No face detected" })),
        )
    }
}

async fn end_session(
    State(backend): State<Backend>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    backend.end_bodies.lock().await.push((id.clone(), body.clone()));

    match (id.as_str(), body["password"].as_str()) {
        ("42", Some("s3cret")) => (
            StatusCode::OK,
            Json(json!({ "success": true, "message": "Session ended successfully" })),
        ),
        ("42", _) => (
            StatusCode::OK,
            Json(json!({ "success": false, "error": "Invalid credentials" })),
        ),
        _ => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Session not found" })),
        ),
    }
}

async fn sessions() -> Json<Value> {
    Json(json!([
        { "id": 42, "student_id": "17", "start_time": "2024-05-06T09:00:00",
          "end_time": null, "class_id": 3 }
    ]))
}

async fn broken_students() -> impl IntoResponse {
    (StatusCode::SERVICE_UNAVAILABLE, "database offline")
}

async fn spawn_backend() -> (String, Backend) {
    let backend = Backend::default();
    let app = Router::new()
        .route("/api/live-recognition", post(live_recognition))
        .route("/api/end-session/:id", post(end_session))
        .route("/api/sessions", get(sessions))
        .route("/api/students", get(broken_students))
        .with_state(backend.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind backend");
    let addr = listener.local_addr().expect("backend addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve backend");
    });

    (format!("http://{addr}"), backend)
}

fn client(base_url: &str) -> ApiClient {
    ApiClient::new(base_url, Duration::from_secs(5)).expect("client")
}

#[tokio::test]
async fn live_recognition_decodes_matches_and_error_bodies() {
    let (base_url, backend) = spawn_backend().await;
    let api = client(&base_url);

    let hit = api
        .live_recognition("data:image/jpeg;base64,match")
        .await
        .expect("match response");
    assert!(hit.matched);
    assert_eq!(hit.student_id.as_deref(), Some("17"));
    assert_eq!(hit.matched_image(), Some("capture_17.jpg"));
    assert_eq!(hit.qr_code.as_deref(), Some("iVBORw0KGgo/42"));

    let miss = api
        .live_recognition("data:image/jpeg;base64,nobody")
        .await
        .expect("500 with a no-match body is a no-match");
    assert!(!miss.matched);
    assert_eq!(miss.error.as_deref(), Some("No face detected"));
    assert_eq!(miss.matched_image(), None);

    let bodies = backend.recognition_bodies.lock().await;
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0], json!({ "image": "data:image/jpeg;base64,match" }));
}

#[tokio::test]
async fn end_session_maps_success_rejection_and_status() {
    let (base_url, backend) = spawn_backend().await;
    let api = client(&base_url);

    let ok = api
        .end_session_request("42", &EndSessionProof::credentials("ops", "s3cret"))
        .await
        .expect("session ended");
    assert_eq!(ok.success, Some(true));
    assert_eq!(ok.message.as_deref(), Some("Session ended successfully"));

    let rejected = api
        .end_session_request("42", &EndSessionProof::credentials("ops", "wrong"))
        .await
        .unwrap_err();
    match rejected {
        ApiError::Rejected(reason) => assert_eq!(reason, "Invalid credentials"),
        other => panic!("expected rejection, got {other:?}"),
    }

    let missing = api
        .end_session_request("7", &EndSessionProof::credentials("ops", "s3cret"))
        .await
        .unwrap_err();
    match missing {
        ApiError::UnexpectedStatus { status, body } => {
            assert_eq!(status, reqwest::StatusCode::NOT_FOUND);
            assert!(body.contains("Session not found"));
        }
        other => panic!("expected status error, got {other:?}"),
    }

    let bodies = backend.end_bodies.lock().await;
    assert_eq!(bodies[0].0, "42");
    assert_eq!(
        bodies[0].1,
        json!({ "username": "ops", "password": "s3cret" })
    );
}

#[tokio::test]
async fn collections_decode_or_surface_status() {
    let (base_url, _backend) = spawn_backend().await;
    let api = client(&base_url);

    let sessions = api.sessions().await.expect("sessions");
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].id, "42");
    assert!(sessions[0].is_open());

    let err = api.students().await.unwrap_err();
    assert!(matches!(
        err,
        ApiError::UnexpectedStatus { status, .. } if status == reqwest::StatusCode::SERVICE_UNAVAILABLE
    ));
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let api = client(&format!("http://{addr}"));
    let err = api
        .live_recognition("data:image/jpeg;base64,match")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Http(_)));
}

/// Answers one request with a 404 whose body stops short of its
/// `Content-Length`.
async fn spawn_truncating_backend() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.expect("read request");
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&request);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if request.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }
        socket
            .write_all(
                b"HTTP/1.1 404 Not Found\r\ncontent-type: application/json\r\ncontent-length: 64\r\n\r\n{\"err",
            )
            .await
            .expect("write response");
        socket.shutdown().await.ok();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn end_session_surfaces_a_broken_error_body() {
    let base_url = spawn_truncating_backend().await;
    let api = client(&base_url);

    let err = api
        .end_session_request("42", &EndSessionProof::credentials("ops", "s3cret"))
        .await
        .unwrap_err();
    assert!(
        matches!(err, ApiError::Http(_)),
        "body read failure should not become an empty status body: {err:?}"
    );
}
