//! Camera frame capture
//!
//! The kiosk does not drive a camera device directly. Frames come from a
//! snapshot endpoint (one JPEG per request), and QR payloads are pushed to
//! the control API by the external decoder. A device that is not ready
//! simply yields no frame.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::backend::BackendError;

const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

/// One still image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl Frame {
    pub fn jpeg(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
        }
    }
}

/// Source of still frames
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Capture one frame; `None` when the device is not ready
    async fn capture(&self) -> Option<Frame>;
}

/// Frame source backed by an HTTP snapshot URL
pub struct HttpSnapshotCamera {
    http_client: reqwest::Client,
    snapshot_url: String,
}

impl HttpSnapshotCamera {
    pub fn new(snapshot_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Setup(e.to_string()))?;

        Ok(Self {
            http_client,
            snapshot_url: snapshot_url.to_string(),
        })
    }
}

#[async_trait]
impl FrameSource for HttpSnapshotCamera {
    async fn capture(&self) -> Option<Frame> {
        let response = match self.http_client.get(&self.snapshot_url).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!("Camera not ready: {}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            debug!("Camera snapshot returned HTTP {}", response.status());
            return None;
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();

        match response.bytes().await {
            Ok(bytes) if !bytes.is_empty() => Some(Frame {
                bytes: bytes.to_vec(),
                content_type,
            }),
            Ok(_) => {
                debug!("Camera snapshot was empty");
                None
            }
            Err(e) => {
                debug!("Failed to read camera snapshot: {}", e);
                None
            }
        }
    }
}
