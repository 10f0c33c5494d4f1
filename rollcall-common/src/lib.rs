//! # Rollcall Common Library
//!
//! Shared code for the rollcall attendance services including:
//! - Error types
//! - TOML configuration resolution and logging settings
//! - Broadcast event bus
//! - Timestamp and display-time helpers

pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
pub use events::EventBus;
