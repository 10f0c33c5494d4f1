//! # Rollcall Kiosk
//!
//! Attendance capture kiosk: identifies a subject by roll number (QR code or
//! typed entry), confirms physical presence with repeated face probes sent to
//! the recognition backend, and records the terminal outcome.
//!
//! Components, leaves first:
//! - [`identity`]: roll number resolution
//! - [`precheck`]: presence query with network fallback
//! - [`poller`]: fixed-interval face probing with a single in-flight lease
//! - [`orchestrator`]: session state machine and operating modes
//! - [`gate`]: admin view PIN gate
//! - [`api`]: HTTP control surface and SSE stream

pub mod api;
pub mod backend;
pub mod camera;
pub mod config;
pub mod error;
pub mod events;
pub mod gate;
pub mod identity;
pub mod orchestrator;
pub mod poller;
pub mod precheck;
pub mod session;

pub use error::{KioskError, Result};
pub use orchestrator::{spawn, Collaborators, OrchestratorHandle, TimingPolicy};
pub use session::{Mode, Outcome, ResultAction, SessionSnapshot, Step};
