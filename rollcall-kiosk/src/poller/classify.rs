//! Probe response classification
//!
//! Maps one submission result to either "keep polling" or a terminal
//! outcome. The error policy is an explicit parameter so both modes can be
//! exercised independently.

use crate::backend::{BackendError, RecognitionReply};
use crate::identity::IdentityToken;
use crate::session::{Mode, Outcome};

/// Failure reason reported when no reply was received (strict policy)
pub const NETWORK_ERROR_REASON: &str = "Network error";

/// How non-definitive anomalies are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Manual mode: any anomaly ends the activation with a failure
    Strict,
    /// Auto mode: anomalies are logged and polling continues
    Tolerant,
}

impl From<Mode> for ErrorPolicy {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Auto => ErrorPolicy::Tolerant,
            Mode::Manual => ErrorPolicy::Strict,
        }
    }
}

/// Why a probe did not end the activation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransientReason {
    /// Expected and frequent; never surfaced
    NoFace,
    /// Application-level rejection tolerated by policy
    Application(String),
    /// No reply received, tolerated by policy
    Network(String),
}

/// Classification of one probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeVerdict {
    Continue(TransientReason),
    Stop(Outcome),
}

/// Classify one submission result
pub fn classify(
    identity: &IdentityToken,
    result: Result<RecognitionReply, BackendError>,
    policy: ErrorPolicy,
) -> ProbeVerdict {
    match result {
        Ok(RecognitionReply::Matched { name }) => ProbeVerdict::Stop(Outcome::Success {
            name: name.unwrap_or_else(|| identity.to_string()),
            identity: identity.clone(),
        }),
        Ok(RecognitionReply::AlreadyRecorded { .. }) => ProbeVerdict::Stop(Outcome::Duplicate {
            identity: identity.clone(),
            prior_name: None,
        }),
        Ok(RecognitionReply::NoFace) => ProbeVerdict::Continue(TransientReason::NoFace),
        Ok(RecognitionReply::Rejected { reason }) => match policy {
            ErrorPolicy::Strict => ProbeVerdict::Stop(Outcome::Failure { reason }),
            ErrorPolicy::Tolerant => ProbeVerdict::Continue(TransientReason::Application(reason)),
        },
        Err(e) => match policy {
            ErrorPolicy::Strict => ProbeVerdict::Stop(Outcome::Failure {
                reason: NETWORK_ERROR_REASON.to_string(),
            }),
            ErrorPolicy::Tolerant => ProbeVerdict::Continue(TransientReason::Network(e.to_string())),
        },
    }
}
