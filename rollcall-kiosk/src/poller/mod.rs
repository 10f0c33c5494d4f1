//! Face-probe poller
//!
//! Drives the fixed-interval sampling loop of one probing activation:
//! capture a frame, submit it, classify the reply, and either keep polling
//! or end with exactly one terminal outcome.
//!
//! # Per-tick state machine
//! IDLE → CAPTURING → SUBMITTING (lease held) → IDLE (lease released)
//!
//! - A tick while the lease is held is refused; the ticker keeps running.
//! - No frame from the camera is a no-op tick; no lease is taken.
//! - The lease is released only after the reply has been classified, so
//!   submission N+1 never starts before submission N is fully processed.
//!
//! The poller never touches session state. It reads the identity and error
//! policy it was activated with, and reports through a single `FnOnce`
//! callback, which makes "at most one terminal outcome" a type-level fact.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::backend::{BackendError, RecognitionBackend, RecognitionReply};
use crate::camera::FrameSource;
use crate::identity::IdentityToken;
use crate::session::{Generation, Outcome};

pub mod classify;
pub mod lease;

pub use classify::{classify, ErrorPolicy, ProbeVerdict, TransientReason, NETWORK_ERROR_REASON};
pub use lease::{LeaseSlot, PollingLease};

/// Everything one activation needs, fixed for its lifetime
#[derive(Debug, Clone)]
pub struct ProbeActivation {
    pub generation: Generation,
    pub identity: IdentityToken,
    pub policy: ErrorPolicy,
}

/// Tick accounting for one activation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeStats {
    /// Timer ticks observed
    pub ticks: u32,
    /// Ticks refused because a submission was in flight
    pub refused_ticks: u32,
    /// Ticks where the camera had no frame
    pub empty_ticks: u32,
    /// Submissions dispatched
    pub submissions: u32,
    /// Replies that kept polling alive
    pub transient: u32,
}

/// Terminal report of one activation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub generation: Generation,
    pub outcome: Outcome,
    pub stats: ProbeStats,
}

/// Receives the single terminal report of an activation
pub type OutcomeCallback = Box<dyn FnOnce(ProbeReport) + Send + 'static>;

type Submission = Pin<Box<dyn Future<Output = (PollingLease, Result<RecognitionReply, BackendError>)> + Send>>;

/// Starts probing activations against the configured collaborators
#[derive(Clone)]
pub struct FaceProbePoller {
    recognition: Arc<dyn RecognitionBackend>,
    camera: Arc<dyn FrameSource>,
    interval: Duration,
}

impl FaceProbePoller {
    pub fn new(
        recognition: Arc<dyn RecognitionBackend>,
        camera: Arc<dyn FrameSource>,
        interval: Duration,
    ) -> Self {
        Self {
            recognition,
            camera,
            interval,
        }
    }

    /// Start an activation on the current tokio runtime
    pub fn activate(&self, activation: ProbeActivation, on_outcome: OutcomeCallback) -> PollerHandle {
        let cancel = CancellationToken::new();
        let generation = activation.generation;

        info!(
            generation = %generation,
            identity = %activation.identity,
            policy = ?activation.policy,
            "Face probe activated ({}ms interval)",
            self.interval.as_millis()
        );

        let task = tokio::spawn(probe_loop(
            Arc::clone(&self.recognition),
            Arc::clone(&self.camera),
            self.interval,
            activation,
            cancel.clone(),
            on_outcome,
        ));

        PollerHandle {
            generation,
            cancel,
            task,
        }
    }
}

/// Owner's handle on a running activation
///
/// Deactivation is synchronous: after [`PollerHandle::deactivate`] returns
/// no further lease is issued and the callback is never invoked. Dropping
/// the handle deactivates as well.
#[derive(Debug)]
pub struct PollerHandle {
    generation: Generation,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PollerHandle {
    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn deactivate(&self) {
        if !self.cancel.is_cancelled() {
            debug!(generation = %self.generation, "Face probe deactivated");
        }
        self.cancel.cancel();
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.deactivate();
    }
}

async fn probe_loop(
    recognition: Arc<dyn RecognitionBackend>,
    camera: Arc<dyn FrameSource>,
    interval: Duration,
    activation: ProbeActivation,
    cancel: CancellationToken,
    on_outcome: OutcomeCallback,
) {
    let slot = LeaseSlot::new(cancel.clone());
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut stats = ProbeStats::default();
    let mut in_flight: Option<Submission> = None;

    let outcome = loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!(generation = %activation.generation, "Probe loop stopped by cancellation");
                return;
            }

            (lease, result) = next_reply(&mut in_flight), if in_flight.is_some() =>
            {
                in_flight = None;
                let verdict = classify(&activation.identity, result, activation.policy);
                trace!(sequence = lease.sequence(), "Releasing polling lease");
                drop(lease);

                match verdict {
                    ProbeVerdict::Stop(outcome) => break outcome,
                    ProbeVerdict::Continue(reason) => {
                        stats.transient += 1;
                        match reason {
                            TransientReason::NoFace => {
                                trace!(generation = %activation.generation, "No face in frame, continuing");
                            }
                            TransientReason::Application(reason) => {
                                warn!(generation = %activation.generation, "Probe rejected, continuing: {}", reason);
                            }
                            TransientReason::Network(reason) => {
                                warn!(generation = %activation.generation, "Probe network error, continuing: {}", reason);
                            }
                        }
                    }
                }
            }

            _ = ticker.tick() => {
                stats.ticks += 1;

                if slot.is_held() {
                    stats.refused_ticks += 1;
                    trace!("Tick refused, submission in flight");
                    continue;
                }

                let Some(frame) = camera.capture().await else {
                    stats.empty_ticks += 1;
                    trace!("No frame available, skipping tick");
                    continue;
                };

                let Some(lease) = slot.try_acquire() else {
                    stats.refused_ticks += 1;
                    continue;
                };

                stats.submissions += 1;
                debug!(
                    generation = %activation.generation,
                    sequence = lease.sequence(),
                    "Submitting face probe"
                );

                let recognition = Arc::clone(&recognition);
                let identity = activation.identity.clone();
                in_flight = Some(Box::pin(async move {
                    let result = recognition.submit(&identity, frame).await;
                    (lease, result)
                }));
            }
        }
    };

    // Cancelled between classification and here: the owner has moved on
    if cancel.is_cancelled() {
        return;
    }

    info!(
        generation = %activation.generation,
        outcome = outcome.kind(),
        submissions = stats.submissions,
        transient = stats.transient,
        "Face probe finished"
    );

    on_outcome(ProbeReport {
        generation: activation.generation,
        outcome,
        stats,
    });
}

async fn next_reply(
    in_flight: &mut Option<Submission>,
) -> (PollingLease, Result<RecognitionReply, BackendError>) {
    match in_flight {
        Some(submission) => submission.await,
        None => std::future::pending().await,
    }
}
