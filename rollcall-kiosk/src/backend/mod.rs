//! Attendance backend boundary
//!
//! The kiosk talks to two backend endpoints:
//! - recognition submission (identity + face image → classification)
//! - presence pre-check (identity → already recorded today?)
//!
//! Both are expressed as traits so the orchestrator can run against the HTTP
//! client in production and scripted fakes in tests. Raw response text never
//! leaves this module: submissions are translated into [`RecognitionReply`]
//! by [`reply::translate`].

use async_trait::async_trait;
use thiserror::Error;

use crate::camera::Frame;
use crate::identity::IdentityToken;

pub mod client;
pub mod reply;

pub use client::HttpBackend;
pub use reply::RecognitionReply;

/// Transport-level backend errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Client setup error: {0}")]
    Setup(String),
}

/// Result of the presence pre-check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceStatus {
    /// An attendance event already exists for the current period
    AlreadyRecorded { name: Option<String> },
    NotRecorded,
}

/// Face recognition submission endpoint
#[async_trait]
pub trait RecognitionBackend: Send + Sync {
    /// Submit one frame for the identity
    ///
    /// `Err` means no reply was received at all (timeout, connection
    /// failure). Any reply that was received, whatever its HTTP status,
    /// comes back as `Ok`.
    async fn submit(
        &self,
        identity: &IdentityToken,
        frame: Frame,
    ) -> Result<RecognitionReply, BackendError>;
}

/// Read-only presence query endpoint
#[async_trait]
pub trait PresenceBackend: Send + Sync {
    async fn check_presence(&self, identity: &IdentityToken) -> Result<PresenceStatus, BackendError>;
}
