//! Admin access gate
//!
//! A convenience gate in front of the admin view: one shared PIN compared in
//! full, no lockout and no rate limiting. The only state is the unlocked
//! flag, cleared whenever the admin view is exited.

use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct AccessGate {
    pin: String,
    unlocked: bool,
}

impl AccessGate {
    pub fn new(pin: impl Into<String>) -> Self {
        Self {
            pin: pin.into(),
            unlocked: false,
        }
    }

    /// Unlock when `attempt` equals the configured PIN exactly
    ///
    /// A wrong PIN reports failure even when the gate is already unlocked.
    pub fn try_unlock(&mut self, attempt: &str) -> bool {
        let ok = attempt == self.pin;
        if ok {
            self.unlocked = true;
            info!("Admin view unlocked");
        } else {
            warn!("Admin unlock attempt with wrong PIN");
        }
        ok
    }

    pub fn lock(&mut self) {
        if self.unlocked {
            info!("Admin view locked");
        }
        self.unlocked = false;
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }
}
