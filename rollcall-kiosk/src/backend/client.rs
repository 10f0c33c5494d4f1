//! HTTP client for the attendance backend

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use super::reply::translate_body;
use super::{BackendError, PresenceBackend, PresenceStatus, RecognitionBackend, RecognitionReply};
use crate::camera::Frame;
use crate::identity::IdentityToken;

const USER_AGENT: &str = concat!("rollcall-kiosk/", env!("CARGO_PKG_VERSION"));
const SUBMIT_PATH: &str = "/attendance/";
const PRESENCE_PATH: &str = "/api/attendanceStatus/";
const IMAGE_FILE_NAME: &str = "face.jpg";

/// Presence endpoint response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PresenceResponse {
    already_marked: bool,
    #[serde(default)]
    name: Option<String>,
}

/// Attendance backend reached over HTTP
pub struct HttpBackend {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    /// Create a client; every request is bounded by `request_timeout`
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, BackendError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(request_timeout)
            .build()
            .map_err(|e| BackendError::Setup(e.to_string()))?;

        info!("Attendance backend client initialized for {}", base_url);

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn transport_error(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Timeout
    } else {
        BackendError::Network(e.to_string())
    }
}

#[async_trait]
impl RecognitionBackend for HttpBackend {
    async fn submit(
        &self,
        identity: &IdentityToken,
        frame: Frame,
    ) -> Result<RecognitionReply, BackendError> {
        let image = reqwest::multipart::Part::bytes(frame.bytes)
            .file_name(IMAGE_FILE_NAME)
            .mime_str(&frame.content_type)
            .map_err(|e| BackendError::Setup(e.to_string()))?;

        let form = reqwest::multipart::Form::new()
            .text("roll_no", identity.as_str().to_string())
            .part("image", image);

        let response = self
            .http_client
            .post(self.url(SUBMIT_PATH))
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport_error)?;

        let reply = translate_body(&body, status);
        debug!(identity = %identity, status, reply = ?reply, "Recognition reply");
        Ok(reply)
    }
}

#[async_trait]
impl PresenceBackend for HttpBackend {
    async fn check_presence(&self, identity: &IdentityToken) -> Result<PresenceStatus, BackendError> {
        let response = self
            .http_client
            .get(self.url(PRESENCE_PATH))
            .query(&[("roll_no", identity.as_str())])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status(status.as_u16()));
        }

        let presence: PresenceResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))?;

        Ok(if presence.already_marked {
            PresenceStatus::AlreadyRecorded {
                name: presence.name.filter(|n| !n.trim().is_empty()),
            }
        } else {
            PresenceStatus::NotRecorded
        })
    }
}
