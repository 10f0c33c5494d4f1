//! Identity resolution
//!
//! Turns a decoded QR payload or typed text into the canonical roll number
//! used for the rest of the session.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::error::{KioskError, Result};

/// How the identity was supplied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityMethod {
    /// Decoded from a QR code by the camera feed
    Qr,
    /// Typed by the user
    Manual,
}

impl fmt::Display for IdentityMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityMethod::Qr => write!(f, "qr"),
            IdentityMethod::Manual => write!(f, "manual"),
        }
    }
}

/// Canonical, non-empty identity (roll number) of the session subject
///
/// Only [`resolve`] constructs one, so holding an `IdentityToken` proves the
/// value is trimmed and non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct IdentityToken(String);

impl IdentityToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for IdentityToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Resolve raw input into an [`IdentityToken`]
///
/// Both methods share the same rule: surrounding whitespace is removed and an
/// empty result is rejected with [`KioskError::InvalidIdentity`].
pub fn resolve(method: IdentityMethod, raw: &str) -> Result<IdentityToken> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        debug!(%method, "Rejected empty identity input");
        return Err(KioskError::InvalidIdentity);
    }
    Ok(IdentityToken(trimmed.to_string()))
}
