//! Kiosk control API
//!
//! HTTP surface over the capture orchestrator: session commands, snapshots,
//! the SSE event stream, and the admin access gate.

pub mod handlers;
pub mod health;
pub mod server;
pub mod sse;

pub use server::{build_router, run, AdminInfo, AppContext};
