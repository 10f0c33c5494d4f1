//! Error types for rollcall-kiosk
//!
//! Only configuration and startup errors are fatal. Everything raised inside
//! a capture session has a defined recovery path and is reported back to the
//! caller of the offending command.

use thiserror::Error;

use crate::backend::BackendError;

/// Main error type for rollcall-kiosk
#[derive(Error, Debug)]
pub enum KioskError {
    /// Identity input was empty after trimming; the caller re-prompts
    #[error("Invalid identity: input is empty")]
    InvalidIdentity,

    /// Command not valid in the current session step or mode
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration file loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Recognition backend, presence endpoint, or camera client errors
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Orchestrator task has stopped and no longer accepts commands
    #[error("Orchestrator stopped")]
    OrchestratorStopped,

    /// Admin view requested while the access gate is locked
    #[error("Access denied")]
    AccessDenied,

    /// Shared library errors
    #[error(transparent)]
    Common(#[from] rollcall_common::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using KioskError
pub type Result<T> = std::result::Result<T, KioskError>;
