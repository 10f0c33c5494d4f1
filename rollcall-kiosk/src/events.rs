//! Kiosk event types
//!
//! Broadcast on the shared [`EventBus`](rollcall_common::EventBus) and
//! serialized for SSE transmission.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::identity::{IdentityMethod, IdentityToken};
use crate::session::{Mode, Outcome, Step};

/// Default broadcast capacity for kiosk events
pub const EVENT_BUS_CAPACITY: usize = 256;

pub type KioskEventBus = rollcall_common::EventBus<KioskEvent>;

/// Kiosk event types
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum KioskEvent {
    /// Session moved to a new step
    StepChanged {
        old_step: Step,
        new_step: Step,
        session_id: Option<Uuid>,
        timestamp: DateTime<Utc>,
    },

    /// Operating mode switched (always accompanied by a session reset)
    ModeChanged {
        old_mode: Mode,
        new_mode: Mode,
        timestamp: DateTime<Utc>,
    },

    /// Identity input was empty after trimming; the step did not change
    IdentityRejected {
        method: IdentityMethod,
        timestamp: DateTime<Utc>,
    },

    /// Presence query failed; probing started anyway
    PreCheckFallback {
        identity: IdentityToken,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Session reached a terminal outcome
    OutcomeRecorded {
        session_id: Option<Uuid>,
        outcome: Outcome,
        /// Result screen text
        summary: String,
        timestamp: DateTime<Utc>,
    },

    /// Admin access gate locked or unlocked
    GateChanged {
        unlocked: bool,
        timestamp: DateTime<Utc>,
    },
}

impl KioskEvent {
    /// Get event type as string for SSE event names and filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            KioskEvent::StepChanged { .. } => "StepChanged",
            KioskEvent::ModeChanged { .. } => "ModeChanged",
            KioskEvent::IdentityRejected { .. } => "IdentityRejected",
            KioskEvent::PreCheckFallback { .. } => "PreCheckFallback",
            KioskEvent::OutcomeRecorded { .. } => "OutcomeRecorded",
            KioskEvent::GateChanged { .. } => "GateChanged",
        }
    }
}
