//! Capture session state
//!
//! `SessionState` is the single mutable record of the kiosk. It is owned
//! exclusively by the orchestrator task; everything else sees it through
//! [`SessionSnapshot`] copies.
//!
//! Invariants upheld by every transition method:
//! - `identity` is present whenever the step is `PreChecking`, `Probing`, or `Result`
//! - `outcome` is present only when the step is `Result`
//! - `scanning` is true only when the step is `Probing`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::identity::{IdentityMethod, IdentityToken};

/// Operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Kiosk operation: QR scanning on startup, self-reset after every result,
    /// tolerant of backend hiccups while probing
    Auto,
    /// Single-subject operation: explicit method choice and result actions,
    /// anomalies surface immediately
    Manual,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Auto => write!(f, "auto"),
            Mode::Manual => write!(f, "manual"),
        }
    }
}

/// Session step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "step", content = "method", rename_all = "snake_case")]
pub enum Step {
    /// Choose-method screen (manual mode)
    Idle,
    Identifying(IdentityMethod),
    PreChecking,
    Probing,
    Result,
}

impl Step {
    pub fn requires_identity(&self) -> bool {
        matches!(self, Step::PreChecking | Step::Probing | Step::Result)
    }
}

/// Terminal outcome of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Success {
        name: String,
        identity: IdentityToken,
    },
    Duplicate {
        identity: IdentityToken,
        prior_name: Option<String>,
    },
    Failure {
        reason: String,
    },
}

impl Outcome {
    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Success { .. } => "success",
            Outcome::Duplicate { .. } => "duplicate",
            Outcome::Failure { .. } => "failure",
        }
    }

    /// One-line text for the result screen
    pub fn summary(&self) -> String {
        match self {
            Outcome::Success { name, identity } => {
                format!("Attendance marked for {} ({})", name, identity)
            }
            Outcome::Duplicate {
                identity,
                prior_name: Some(name),
            } => format!("Attendance already marked for {} ({})", name, identity),
            Outcome::Duplicate {
                identity,
                prior_name: None,
            } => format!("Attendance already marked for {}", identity),
            Outcome::Failure { reason } => format!("Face scan failed: {}", reason),
        }
    }
}

/// Explicit user actions available on the result screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultAction {
    /// Back to the mode's entry step, identity cleared
    StartOver,
    /// Probe again for the same identity
    RescanFace,
    /// Identity cleared, scan a new QR code
    RescanQr,
    /// Identity cleared, type a new roll number
    ReEnter,
}

/// Most recent terminal outcome, kept across resets for display only
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LastOutcome {
    pub outcome: Outcome,
    pub recorded_at: DateTime<Utc>,
}

/// Activation counter
///
/// Every asynchronous activation (pre-check, probe activation, dwell timer)
/// is stamped with the generation current when it started. A completion is
/// applied only if its generation is still current.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Generation(u64);

impl Generation {
    pub fn next(self) -> Self {
        Generation(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The orchestrator-owned session record
#[derive(Debug, Clone)]
pub struct SessionState {
    step: Step,
    identity: Option<IdentityToken>,
    outcome: Option<Outcome>,
    mode: Mode,
    scanning: bool,
    session_id: Option<Uuid>,
}

impl SessionState {
    /// Fresh session positioned at the mode's entry step
    pub fn new(mode: Mode) -> Self {
        Self {
            step: Self::entry_step(mode),
            identity: None,
            outcome: None,
            mode,
            scanning: false,
            session_id: None,
        }
    }

    /// Auto mode starts scanning QR codes immediately; manual mode starts at
    /// the choose-method screen
    pub fn entry_step(mode: Mode) -> Step {
        match mode {
            Mode::Auto => Step::Identifying(IdentityMethod::Qr),
            Mode::Manual => Step::Idle,
        }
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn identity(&self) -> Option<&IdentityToken> {
        self.identity.as_ref()
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn scanning(&self) -> bool {
        self.scanning
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    /// Clear identity and outcome and return to the mode's entry step
    pub fn reset(&mut self) {
        let step = Self::entry_step(self.mode);
        self.go_to_identification(step);
    }

    /// Switch mode; always resets
    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
        self.reset();
    }

    /// Enter an identification method, discarding any previous identity
    pub fn begin_identifying(&mut self, method: IdentityMethod) {
        self.go_to_identification(Step::Identifying(method));
    }

    /// Return to the choose-method screen
    pub fn choose_method(&mut self) {
        self.go_to_identification(Step::Idle);
    }

    /// Identity accepted; pre-check begins
    pub fn accept_identity(&mut self, identity: IdentityToken) {
        self.identity = Some(identity);
        self.outcome = None;
        self.scanning = false;
        self.session_id = Some(Uuid::new_v4());
        self.step = Step::PreChecking;
        debug_assert!(self.invariants_hold());
    }

    /// Enter probing for the current identity
    ///
    /// Callers must only invoke this while an identity is present.
    pub fn enter_probing(&mut self, scanning: bool) {
        debug_assert!(self.identity.is_some());
        self.outcome = None;
        self.scanning = scanning;
        self.step = Step::Probing;
        debug_assert!(self.invariants_hold());
    }

    /// Mark the poller as running (manual "start scan")
    pub fn start_scanning(&mut self) {
        debug_assert_eq!(self.step, Step::Probing);
        self.scanning = true;
    }

    /// Record a terminal outcome
    pub fn finish(&mut self, outcome: Outcome) {
        debug_assert!(self.identity.is_some());
        self.outcome = Some(outcome);
        self.scanning = false;
        self.step = Step::Result;
        debug_assert!(self.invariants_hold());
    }

    fn go_to_identification(&mut self, step: Step) {
        self.step = step;
        self.identity = None;
        self.outcome = None;
        self.scanning = false;
        self.session_id = None;
        debug_assert!(self.invariants_hold());
    }

    /// Check the documented invariants
    pub fn invariants_hold(&self) -> bool {
        let identity_ok = !self.step.requires_identity() || self.identity.is_some();
        let outcome_ok = self.outcome.is_none() || self.step == Step::Result;
        let scanning_ok = !self.scanning || self.step == Step::Probing;
        identity_ok && outcome_ok && scanning_ok
    }

    /// Read-only copy for API handlers and observers
    pub fn snapshot(&self, last_outcome: Option<&LastOutcome>) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id,
            step: self.step,
            mode: self.mode,
            identity: self.identity.clone(),
            outcome: self.outcome.clone(),
            scanning: self.scanning,
            last_outcome: last_outcome.cloned(),
        }
    }
}

/// Point-in-time copy of the session published by the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Option<Uuid>,
    #[serde(flatten)]
    pub step: Step,
    pub mode: Mode,
    pub identity: Option<IdentityToken>,
    pub outcome: Option<Outcome>,
    pub scanning: bool,
    pub last_outcome: Option<LastOutcome>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::resolve;

    fn token(raw: &str) -> IdentityToken {
        resolve(IdentityMethod::Manual, raw).unwrap()
    }

    #[test]
    fn test_entry_steps() {
        assert_eq!(
            SessionState::new(Mode::Auto).step(),
            Step::Identifying(IdentityMethod::Qr)
        );
        assert_eq!(SessionState::new(Mode::Manual).step(), Step::Idle);
    }

    #[test]
    fn test_full_lifecycle_keeps_invariants() {
        let mut state = SessionState::new(Mode::Manual);
        state.begin_identifying(IdentityMethod::Manual);
        assert!(state.invariants_hold());

        state.accept_identity(token("42"));
        assert_eq!(state.step(), Step::PreChecking);
        assert!(state.session_id().is_some());

        state.enter_probing(false);
        assert!(!state.scanning());
        state.start_scanning();
        assert!(state.scanning());

        state.finish(Outcome::Failure {
            reason: "Network error".to_string(),
        });
        assert_eq!(state.step(), Step::Result);
        assert!(!state.scanning());
        assert!(state.invariants_hold());

        state.reset();
        assert_eq!(state.step(), Step::Idle);
        assert!(state.identity().is_none());
        assert!(state.outcome().is_none());
        assert!(state.session_id().is_none());
    }

    #[test]
    fn test_set_mode_resets_to_entry_step() {
        let mut state = SessionState::new(Mode::Manual);
        state.begin_identifying(IdentityMethod::Manual);
        state.accept_identity(token("7"));

        state.set_mode(Mode::Auto);
        assert_eq!(state.step(), Step::Identifying(IdentityMethod::Qr));
        assert!(state.identity().is_none());

        state.set_mode(Mode::Manual);
        assert_eq!(state.step(), Step::Idle);
    }

    #[test]
    fn test_outcome_summaries() {
        let success = Outcome::Success {
            name: "A. Sharma".to_string(),
            identity: token("42"),
        };
        assert_eq!(success.kind(), "success");
        assert_eq!(success.summary(), "Attendance marked for A. Sharma (42)");

        let duplicate = Outcome::Duplicate {
            identity: token("42"),
            prior_name: None,
        };
        assert_eq!(duplicate.summary(), "Attendance already marked for 42");
    }

    #[test]
    fn test_snapshot_serialization_shape() {
        let mut state = SessionState::new(Mode::Auto);
        state.accept_identity(token("42"));
        let json = serde_json::to_value(state.snapshot(None)).unwrap();

        assert_eq!(json["step"], "pre_checking");
        assert_eq!(json["mode"], "auto");
        assert_eq!(json["identity"], "42");
        assert!(json["outcome"].is_null());

        let state = SessionState::new(Mode::Auto);
        let json = serde_json::to_value(state.snapshot(None)).unwrap();
        assert_eq!(json["step"], "identifying");
        assert_eq!(json["method"], "qr");
    }
}
