//! Presence pre-check
//!
//! Asks the backend whether the identity already has attendance recorded
//! for the current period before the camera starts probing.
//!
//! The pre-check is an optimization, not a correctness gate: the recognition
//! endpoint itself refuses duplicate recording. When the presence query
//! fails, the session proceeds to probing instead of blocking.

use tracing::{debug, warn};

use crate::backend::{PresenceBackend, PresenceStatus};
use crate::identity::IdentityToken;

/// What the orchestrator should do after the pre-check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreCheckDecision {
    /// Attendance already exists; show the duplicate result
    Duplicate { prior_name: Option<String> },
    /// Start probing. `fallback` carries the failure reason when the presence
    /// query could not be answered.
    Proceed { fallback: Option<String> },
}

/// Run the presence query and apply the fallback policy
pub async fn precheck(backend: &dyn PresenceBackend, identity: &IdentityToken) -> PreCheckDecision {
    match backend.check_presence(identity).await {
        Ok(PresenceStatus::AlreadyRecorded { name }) => {
            debug!(identity = %identity, "Pre-check: already recorded");
            PreCheckDecision::Duplicate { prior_name: name }
        }
        Ok(PresenceStatus::NotRecorded) => {
            debug!(identity = %identity, "Pre-check: not recorded");
            PreCheckDecision::Proceed { fallback: None }
        }
        Err(e) => {
            warn!(identity = %identity, "Pre-check unavailable, proceeding to face probe: {}", e);
            PreCheckDecision::Proceed {
                fallback: Some(e.to_string()),
            }
        }
    }
}
