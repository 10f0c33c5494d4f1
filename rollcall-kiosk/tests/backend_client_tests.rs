//! HTTP backend and camera clients against an in-process mock server

use axum::{
    body::Bytes,
    extract::Query,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use rollcall_kiosk::backend::{
    BackendError, HttpBackend, PresenceBackend, PresenceStatus, RecognitionBackend,
    RecognitionReply,
};
use rollcall_kiosk::camera::{Frame, FrameSource, HttpSnapshotCamera};
use rollcall_kiosk::identity::{resolve, IdentityMethod, IdentityToken};

fn token(raw: &str) -> IdentityToken {
    resolve(IdentityMethod::Manual, raw).unwrap()
}

fn frame() -> Frame {
    Frame::jpeg(vec![0xFF, 0xD8, 0xFF, 0xD9])
}

#[derive(Deserialize)]
struct RollQuery {
    roll_no: String,
}

/// Mimics the attendance backend
///
/// The submitted roll number selects the reply shape.
async fn attendance(headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    let is_multipart = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"));
    let body = String::from_utf8_lossy(&body);

    if !is_multipart || !body.contains("name=\"image\"") || !body.contains("face.jpg") {
        return (StatusCode::BAD_REQUEST, "missing multipart image").into_response();
    }

    let roll = ["42", "43", "44", "45"]
        .into_iter()
        .find(|roll| body.contains(&format!("\r\n\r\n{}\r\n", roll)));

    match roll {
        Some("42") => Json(json!({"message": "Attendance marked for A. Sharma"})).into_response(),
        Some("43") => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "No face detected in image"})),
        )
            .into_response(),
        Some("44") => (
            StatusCode::BAD_REQUEST,
            Json(json!({"message": "Attendance already marked for today"})),
        )
            .into_response(),
        Some("45") => (StatusCode::BAD_GATEWAY, "<html>upstream down</html>").into_response(),
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Face does not match roll number"})),
        )
            .into_response(),
    }
}

async fn attendance_status(Query(query): Query<RollQuery>) -> impl IntoResponse {
    match query.roll_no.as_str() {
        "42" => Json(json!({"alreadyMarked": true, "name": "A. Sharma"})).into_response(),
        "7" => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        "9" => "not json".into_response(),
        _ => Json(json!({"alreadyMarked": false})).into_response(),
    }
}

async fn slow() -> &'static str {
    tokio::time::sleep(Duration::from_secs(5)).await;
    "{}"
}

async fn spawn_mock() -> String {
    let app = Router::new()
        .route("/attendance/", post(attendance))
        .route("/api/attendanceStatus/", get(attendance_status))
        .route("/slow/attendance/", post(slow))
        .route(
            "/snapshot.jpg",
            get(|| async { ([(header::CONTENT_TYPE, "image/jpeg")], vec![0xFFu8, 0xD8, 0xFF, 0xD9]) }),
        )
        .route("/empty.jpg", get(|| async { Vec::<u8>::new() }))
        .route("/offline.jpg", get(|| async { StatusCode::SERVICE_UNAVAILABLE }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn client(base_url: &str) -> HttpBackend {
    HttpBackend::new(base_url, Duration::from_secs(2)).unwrap()
}

#[tokio::test]
async fn test_submit_translates_reply_shapes() {
    let backend = client(&spawn_mock().await);

    assert_eq!(
        backend.submit(&token("42"), frame()).await.unwrap(),
        RecognitionReply::Matched {
            name: Some("A. Sharma".to_string())
        }
    );
    assert_eq!(
        backend.submit(&token("43"), frame()).await.unwrap(),
        RecognitionReply::NoFace
    );
    assert!(matches!(
        backend.submit(&token("44"), frame()).await.unwrap(),
        RecognitionReply::AlreadyRecorded { .. }
    ));
    assert_eq!(
        backend.submit(&token("45"), frame()).await.unwrap(),
        RecognitionReply::Rejected {
            reason: "Unrecognized response (HTTP 502)".to_string()
        }
    );
    assert_eq!(
        backend.submit(&token("99"), frame()).await.unwrap(),
        RecognitionReply::Rejected {
            reason: "Face does not match roll number".to_string()
        }
    );
}

#[tokio::test]
async fn test_presence_query() {
    let backend = client(&spawn_mock().await);

    assert_eq!(
        backend.check_presence(&token("42")).await.unwrap(),
        PresenceStatus::AlreadyRecorded {
            name: Some("A. Sharma".to_string())
        }
    );
    assert_eq!(
        backend.check_presence(&token("8")).await.unwrap(),
        PresenceStatus::NotRecorded
    );
    assert_eq!(
        backend.check_presence(&token("7")).await,
        Err(BackendError::Status(500))
    );
    assert!(matches!(
        backend.check_presence(&token("9")).await,
        Err(BackendError::Parse(_))
    ));
}

#[tokio::test]
async fn test_submit_timeout() {
    let base_url = spawn_mock().await;
    let backend = HttpBackend::new(&format!("{}/slow", base_url), Duration::from_millis(200)).unwrap();

    assert_eq!(
        backend.submit(&token("42"), frame()).await,
        Err(BackendError::Timeout)
    );
}

#[tokio::test]
async fn test_unreachable_backend_is_network_error() {
    // Bind then release a port so nothing is listening on it
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let backend = client(&format!("http://{}", addr));
    assert!(matches!(
        backend.check_presence(&token("42")).await,
        Err(BackendError::Network(_))
    ));
    assert!(matches!(
        backend.submit(&token("42"), frame()).await,
        Err(BackendError::Network(_))
    ));
}

#[tokio::test]
async fn test_snapshot_camera() {
    let base_url = spawn_mock().await;
    let camera = |path: &str| {
        HttpSnapshotCamera::new(&format!("{}{}", base_url, path), Duration::from_secs(2)).unwrap()
    };

    let frame = camera("/snapshot.jpg").capture().await.expect("frame");
    assert_eq!(frame.content_type, "image/jpeg");
    assert_eq!(frame.bytes, vec![0xFF, 0xD8, 0xFF, 0xD9]);

    assert!(camera("/empty.jpg").capture().await.is_none());
    assert!(camera("/offline.jpg").capture().await.is_none());
    assert!(camera("/missing.jpg").capture().await.is_none());
}
