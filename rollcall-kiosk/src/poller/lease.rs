//! Polling lease
//!
//! Mutual exclusion for in-flight probe submissions. A [`LeaseSlot`] belongs
//! to one probing activation and hands out at most one [`PollingLease`] at a
//! time. The lease is released when dropped, so release happens on every
//! path: processed reply, transport error, panic, or task abort.
//!
//! The slot also observes the activation's cancellation token: once the
//! activation is cancelled no new lease is issued.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Issues leases for one probing activation
#[derive(Debug, Clone)]
pub struct LeaseSlot {
    held: Arc<AtomicBool>,
    issued: Arc<AtomicU64>,
    cancel: CancellationToken,
}

impl LeaseSlot {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            held: Arc::new(AtomicBool::new(false)),
            issued: Arc::new(AtomicU64::new(0)),
            cancel,
        }
    }

    /// Acquire the lease if it is free and the activation is still live
    pub fn try_acquire(&self) -> Option<PollingLease> {
        if self.cancel.is_cancelled() {
            return None;
        }

        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;

        let sequence = self.issued.fetch_add(1, Ordering::Relaxed) + 1;
        Some(PollingLease {
            held: Arc::clone(&self.held),
            sequence,
        })
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }

    /// Total leases issued so far
    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::Relaxed)
    }
}

/// Proof that the holder owns the single in-flight submission
#[derive(Debug)]
pub struct PollingLease {
    held: Arc<AtomicBool>,
    sequence: u64,
}

impl PollingLease {
    /// 1-based submission number within the activation
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl Drop for PollingLease {
    fn drop(&mut self) {
        self.held.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_holder() {
        let slot = LeaseSlot::new(CancellationToken::new());

        let first = slot.try_acquire().expect("slot starts free");
        assert!(slot.is_held());
        assert!(slot.try_acquire().is_none());

        drop(first);
        assert!(!slot.is_held());

        let second = slot.try_acquire().expect("released lease can be re-acquired");
        assert_eq!(second.sequence(), 2);
        assert_eq!(slot.issued(), 2);
    }

    #[test]
    fn test_cancelled_slot_issues_nothing() {
        let cancel = CancellationToken::new();
        let slot = LeaseSlot::new(cancel.clone());

        cancel.cancel();
        assert!(slot.try_acquire().is_none());
        assert_eq!(slot.issued(), 0);
    }

    #[test]
    fn test_release_on_panic_unwind() {
        let slot = LeaseSlot::new(CancellationToken::new());
        let cloned = slot.clone();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _lease = cloned.try_acquire().unwrap();
            panic!("submission blew up");
        }));

        assert!(result.is_err());
        assert!(!slot.is_held());
    }
}
