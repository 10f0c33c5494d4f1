//! Capture orchestrator
//!
//! Top-level session state machine:
//!
//! ```text
//! Idle → Identifying → PreChecking → Probing → Result → (reset)
//! ```
//!
//! The orchestrator runs as a single tokio task that exclusively owns the
//! [`SessionState`]. User commands arrive through [`OrchestratorHandle`]
//! over a bounded channel; asynchronous completions (pre-check decision,
//! probe report, dwell expiry) arrive on an internal channel. Every state
//! mutation happens on the orchestrator task, one message at a time.
//!
//! Each activation is stamped with the current [`Generation`]. Any
//! transition bumps the generation, deactivates the running poller, and
//! aborts the pending pre-check or dwell task, so a completion that arrives
//! late never mutates the session.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::{PresenceBackend, RecognitionBackend};
use crate::camera::FrameSource;
use crate::error::{KioskError, Result};
use crate::events::{KioskEvent, KioskEventBus};
use crate::identity::{self, IdentityMethod};
use crate::poller::{ErrorPolicy, FaceProbePoller, PollerHandle, ProbeActivation, ProbeReport};
use crate::precheck::{precheck, PreCheckDecision};
use crate::session::{
    Generation, LastOutcome, Mode, Outcome, ResultAction, SessionSnapshot, SessionState, Step,
};

/// Bounded depth of the command channel
const COMMAND_CHANNEL_CAPACITY: usize = 32;

/// Timer settings for the session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingPolicy {
    /// Face probe tick period
    pub probe_interval: Duration,
    /// How long an automatic-mode result stays on screen before reset
    pub result_dwell: Duration,
}

impl Default for TimingPolicy {
    fn default() -> Self {
        Self {
            probe_interval: Duration::from_millis(1000),
            result_dwell: Duration::from_millis(2000),
        }
    }
}

/// External collaborators the orchestrator drives
#[derive(Clone)]
pub struct Collaborators {
    pub recognition: Arc<dyn RecognitionBackend>,
    pub presence: Arc<dyn PresenceBackend>,
    pub camera: Arc<dyn FrameSource>,
}

type Reply = oneshot::Sender<Result<SessionSnapshot>>;

/// User commands
enum Command {
    ChooseMethod { method: IdentityMethod, reply: Reply },
    Back { reply: Reply },
    SubmitIdentity { method: IdentityMethod, raw: String, reply: Reply },
    StartScan { reply: Reply },
    ResultAction { action: ResultAction, reply: Reply },
    SetMode { mode: Mode, reply: Reply },
}

/// Asynchronous completions reported back to the orchestrator task
#[derive(Debug)]
enum Completion {
    PreCheckFinished {
        generation: Generation,
        decision: PreCheckDecision,
    },
    ProbeFinished(ProbeReport),
    DwellElapsed {
        generation: Generation,
    },
}

/// Spawn the orchestrator task
///
/// The task stops when [`OrchestratorHandle::shutdown`] is called or when
/// every handle has been dropped; either way the poller and any pending
/// timer are cancelled first.
pub fn spawn(
    initial_mode: Mode,
    collaborators: Collaborators,
    timing: TimingPolicy,
    events: KioskEventBus,
) -> (OrchestratorHandle, JoinHandle<()>) {
    let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
    let (completion_tx, completion_rx) = mpsc::unbounded_channel();

    let state = SessionState::new(initial_mode);
    let (snapshot_tx, snapshot_rx) = watch::channel(state.snapshot(None));
    let shutdown = CancellationToken::new();

    let orchestrator = CaptureOrchestrator {
        state,
        generation: Generation::default(),
        last_outcome: None,
        poller: FaceProbePoller::new(
            collaborators.recognition,
            collaborators.camera,
            timing.probe_interval,
        ),
        presence: collaborators.presence,
        result_dwell: timing.result_dwell,
        active_probe: None,
        pending: None,
        completion_tx,
        snapshot_tx,
        events: events.clone(),
    };

    info!(
        mode = %initial_mode,
        "Capture orchestrator starting (probe interval {}ms, result dwell {}ms)",
        timing.probe_interval.as_millis(),
        timing.result_dwell.as_millis()
    );

    let task = tokio::spawn(orchestrator.run(command_rx, completion_rx, shutdown.clone()));

    let handle = OrchestratorHandle {
        commands: command_tx,
        snapshots: snapshot_rx,
        events,
        shutdown,
    };

    (handle, task)
}

struct CaptureOrchestrator {
    state: SessionState,
    generation: Generation,
    last_outcome: Option<LastOutcome>,
    poller: FaceProbePoller,
    presence: Arc<dyn PresenceBackend>,
    result_dwell: Duration,
    /// Running face probe, if any
    active_probe: Option<PollerHandle>,
    /// Pending pre-check or dwell timer task
    pending: Option<JoinHandle<()>>,
    completion_tx: mpsc::UnboundedSender<Completion>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    events: KioskEventBus,
}

impl CaptureOrchestrator {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut completions: mpsc::UnboundedReceiver<Completion>,
        shutdown: CancellationToken,
    ) {
        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Capture orchestrator shutdown requested");
                    break;
                }

                Some(completion) = completions.recv() => {
                    self.handle_completion(completion);
                }

                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        info!("All orchestrator handles dropped");
                        break;
                    }
                },
            }
        }

        self.invalidate();
        info!("Capture orchestrator stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::ChooseMethod { method, reply } => {
                let result = self.choose_method(method);
                let _ = reply.send(result);
            }
            Command::Back { reply } => {
                let result = self.back();
                let _ = reply.send(result);
            }
            Command::SubmitIdentity { method, raw, reply } => {
                let result = self.submit_identity(method, &raw);
                let _ = reply.send(result);
            }
            Command::StartScan { reply } => {
                let result = self.start_scan();
                let _ = reply.send(result);
            }
            Command::ResultAction { action, reply } => {
                let result = self.result_action(action);
                let _ = reply.send(result);
            }
            Command::SetMode { mode, reply } => {
                let result = Ok(self.set_mode(mode));
                let _ = reply.send(result);
            }
        }
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::PreCheckFinished {
                generation,
                decision,
            } => {
                if generation != self.generation || self.state.step() != Step::PreChecking {
                    debug!(stale = %generation, current = %self.generation, "Discarding stale pre-check result");
                    return;
                }
                self.apply_precheck(decision);
            }
            Completion::ProbeFinished(report) => {
                if report.generation != self.generation
                    || self.state.step() != Step::Probing
                    || !self.state.scanning()
                {
                    debug!(stale = %report.generation, current = %self.generation, "Discarding stale probe outcome");
                    return;
                }
                debug!(
                    ticks = report.stats.ticks,
                    refused = report.stats.refused_ticks,
                    empty = report.stats.empty_ticks,
                    "Probe statistics"
                );
                self.record_outcome(report.outcome);
            }
            Completion::DwellElapsed { generation } => {
                if generation != self.generation
                    || self.state.step() != Step::Result
                    || self.state.mode() != Mode::Auto
                {
                    debug!(stale = %generation, current = %self.generation, "Discarding stale dwell timer");
                    return;
                }
                let old_step = self.state.step();
                self.invalidate();
                self.state.reset();
                info!("Result dwell elapsed, session reset");
                self.publish(old_step);
            }
        }
    }

    fn choose_method(&mut self, method: IdentityMethod) -> Result<SessionSnapshot> {
        self.require_mode(Mode::Manual, "choosing an identification method")?;
        match self.state.step() {
            Step::Idle | Step::Identifying(_) => {}
            step => return Err(invalid_in(step, "choosing an identification method")),
        }

        let old_step = self.state.step();
        self.invalidate();
        self.state.begin_identifying(method);
        Ok(self.publish(old_step))
    }

    fn back(&mut self) -> Result<SessionSnapshot> {
        self.require_mode(Mode::Manual, "going back")?;
        let old_step = self.state.step();
        if !matches!(old_step, Step::Identifying(_)) {
            return Err(invalid_in(old_step, "going back"));
        }

        self.invalidate();
        self.state.choose_method();
        Ok(self.publish(old_step))
    }

    fn submit_identity(&mut self, method: IdentityMethod, raw: &str) -> Result<SessionSnapshot> {
        let old_step = self.state.step();
        match old_step {
            Step::Identifying(current) if current == method => {}
            Step::Identifying(current) => {
                return Err(KioskError::InvalidState(format!(
                    "expecting {} input, got {}",
                    current, method
                )));
            }
            step => return Err(invalid_in(step, "submitting an identity")),
        }

        let token = match identity::resolve(method, raw) {
            Ok(token) => token,
            Err(e) => {
                self.events.emit_lossy(KioskEvent::IdentityRejected {
                    method,
                    timestamp: rollcall_common::time::now(),
                });
                return Err(e);
            }
        };

        let generation = self.invalidate();
        info!(identity = %token, %method, "Identity accepted, running pre-check");
        self.state.accept_identity(token.clone());

        let presence = Arc::clone(&self.presence);
        let completion_tx = self.completion_tx.clone();
        self.pending = Some(tokio::spawn(async move {
            let decision = precheck(presence.as_ref(), &token).await;
            let _ = completion_tx.send(Completion::PreCheckFinished {
                generation,
                decision,
            });
        }));

        Ok(self.publish(old_step))
    }

    fn start_scan(&mut self) -> Result<SessionSnapshot> {
        let old_step = self.state.step();
        if old_step != Step::Probing || self.state.scanning() {
            return Err(KioskError::InvalidState(
                "no face scan is waiting to start".to_string(),
            ));
        }

        let generation = self.invalidate();
        self.state.start_scanning();
        self.activate_probe(generation)?;
        Ok(self.publish(old_step))
    }

    fn result_action(&mut self, action: ResultAction) -> Result<SessionSnapshot> {
        let old_step = self.state.step();
        if old_step != Step::Result {
            return Err(invalid_in(old_step, "a result action"));
        }

        let generation = self.invalidate();
        info!(?action, "Result action");

        match action {
            ResultAction::StartOver => self.state.reset(),
            ResultAction::RescanFace => {
                self.state.enter_probing(true);
                self.activate_probe(generation)?;
            }
            ResultAction::RescanQr => self.state.begin_identifying(IdentityMethod::Qr),
            ResultAction::ReEnter => self.state.begin_identifying(IdentityMethod::Manual),
        }

        Ok(self.publish(old_step))
    }

    fn set_mode(&mut self, mode: Mode) -> SessionSnapshot {
        let old_step = self.state.step();
        let old_mode = self.state.mode();

        self.invalidate();
        self.state.set_mode(mode);
        info!("Mode switched: {} → {}", old_mode, mode);

        self.events.emit_lossy(KioskEvent::ModeChanged {
            old_mode,
            new_mode: mode,
            timestamp: rollcall_common::time::now(),
        });

        self.publish(old_step)
    }

    fn apply_precheck(&mut self, decision: PreCheckDecision) {
        let old_step = self.state.step();
        let Some(identity) = self.state.identity().cloned() else {
            warn!("Pre-check finished without an identity; resetting session");
            self.invalidate();
            self.state.reset();
            self.publish(old_step);
            return;
        };

        match decision {
            PreCheckDecision::Duplicate { prior_name } => {
                info!(identity = %identity, "Attendance already recorded, skipping face probe");
                self.record_outcome(Outcome::Duplicate {
                    identity,
                    prior_name,
                });
            }
            PreCheckDecision::Proceed { fallback } => {
                if let Some(reason) = fallback {
                    self.events.emit_lossy(KioskEvent::PreCheckFallback {
                        identity,
                        reason,
                        timestamp: rollcall_common::time::now(),
                    });
                }

                let generation = self.invalidate();
                match self.state.mode() {
                    Mode::Auto => {
                        self.state.enter_probing(true);
                        if let Err(e) = self.activate_probe(generation) {
                            warn!("Failed to start face probe: {}", e);
                        }
                    }
                    Mode::Manual => self.state.enter_probing(false),
                }
                self.publish(old_step);
            }
        }
    }

    /// Enter `Result` with `outcome` and, in automatic mode, schedule the reset
    fn record_outcome(&mut self, outcome: Outcome) {
        let old_step = self.state.step();
        let generation = self.invalidate();

        info!(outcome = outcome.kind(), "{}", outcome.summary());
        self.state.finish(outcome.clone());
        self.last_outcome = Some(LastOutcome {
            outcome: outcome.clone(),
            recorded_at: rollcall_common::time::now(),
        });

        self.events.emit_lossy(KioskEvent::OutcomeRecorded {
            session_id: self.state.session_id(),
            summary: outcome.summary(),
            outcome,
            timestamp: rollcall_common::time::now(),
        });

        if self.state.mode() == Mode::Auto {
            let dwell = self.result_dwell;
            let completion_tx = self.completion_tx.clone();
            self.pending = Some(tokio::spawn(async move {
                tokio::time::sleep(dwell).await;
                let _ = completion_tx.send(Completion::DwellElapsed { generation });
            }));
        }

        self.publish(old_step);
    }

    fn activate_probe(&mut self, generation: Generation) -> Result<()> {
        let identity = self
            .state
            .identity()
            .cloned()
            .ok_or_else(|| KioskError::InvalidState("no identity to probe".to_string()))?;

        let completion_tx = self.completion_tx.clone();
        let handle = self.poller.activate(
            ProbeActivation {
                generation,
                identity,
                policy: ErrorPolicy::from(self.state.mode()),
            },
            Box::new(move |report| {
                let _ = completion_tx.send(Completion::ProbeFinished(report));
            }),
        );
        self.active_probe = Some(handle);
        Ok(())
    }

    /// Cancel every in-flight activation and start a new generation
    fn invalidate(&mut self) -> Generation {
        if let Some(probe) = self.active_probe.take() {
            probe.deactivate();
        }
        if let Some(task) = self.pending.take() {
            task.abort();
        }
        self.generation = self.generation.next();
        self.generation
    }

    fn require_mode(&self, mode: Mode, what: &str) -> Result<()> {
        if self.state.mode() == mode {
            Ok(())
        } else {
            Err(KioskError::InvalidState(format!(
                "{} is not available in {} mode",
                what,
                self.state.mode()
            )))
        }
    }

    /// Publish the current snapshot and announce a step change
    fn publish(&mut self, old_step: Step) -> SessionSnapshot {
        debug_assert!(self.state.invariants_hold());

        let new_step = self.state.step();
        if new_step != old_step {
            debug!("Session step: {:?} → {:?}", old_step, new_step);
            self.events.emit_lossy(KioskEvent::StepChanged {
                old_step,
                new_step,
                session_id: self.state.session_id(),
                timestamp: rollcall_common::time::now(),
            });
        }

        let snapshot = self.state.snapshot(self.last_outcome.as_ref());
        self.snapshot_tx.send_replace(snapshot.clone());
        snapshot
    }
}

fn invalid_in(step: Step, what: &str) -> KioskError {
    KioskError::InvalidState(format!("{} is not valid in step {:?}", what, step))
}

/// Cloneable handle for sending commands to the orchestrator
#[derive(Clone)]
pub struct OrchestratorHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<SessionSnapshot>,
    events: KioskEventBus,
    shutdown: CancellationToken,
}

impl OrchestratorHandle {
    /// Select an identification method (manual mode)
    pub async fn choose_method(&self, method: IdentityMethod) -> Result<SessionSnapshot> {
        self.request(|reply| Command::ChooseMethod { method, reply }).await
    }

    /// Return from an identification method to the choose-method step (manual mode)
    pub async fn back(&self) -> Result<SessionSnapshot> {
        self.request(|reply| Command::Back { reply }).await
    }

    /// Submit a QR payload or typed roll number
    ///
    /// Empty input fails with [`KioskError::InvalidIdentity`] and leaves the
    /// session where it was.
    pub async fn submit_identity(
        &self,
        method: IdentityMethod,
        raw: impl Into<String>,
    ) -> Result<SessionSnapshot> {
        let raw = raw.into();
        self.request(|reply| Command::SubmitIdentity { method, raw, reply })
            .await
    }

    /// Start the face scan waiting in `Probing` (manual mode)
    pub async fn start_scan(&self) -> Result<SessionSnapshot> {
        self.request(|reply| Command::StartScan { reply }).await
    }

    pub async fn result_action(&self, action: ResultAction) -> Result<SessionSnapshot> {
        self.request(|reply| Command::ResultAction { action, reply })
            .await
    }

    /// Switch operating mode; always resets the session
    pub async fn set_mode(&self, mode: Mode) -> Result<SessionSnapshot> {
        self.request(|reply| Command::SetMode { mode, reply }).await
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Wait until a published snapshot satisfies `predicate`
    pub async fn wait_for<F>(&self, mut predicate: F) -> Result<SessionSnapshot>
    where
        F: FnMut(&SessionSnapshot) -> bool,
    {
        let mut rx = self.snapshots.clone();
        let snapshot = rx
            .wait_for(|snapshot| predicate(snapshot))
            .await
            .map_err(|_| KioskError::OrchestratorStopped)?;
        Ok(snapshot.clone())
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<KioskEvent> {
        self.events.subscribe()
    }

    pub fn events(&self) -> &KioskEventBus {
        &self.events
    }

    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    /// Request orchestrator shutdown
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    async fn request<F>(&self, build: F) -> Result<SessionSnapshot>
    where
        F: FnOnce(Reply) -> Command,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(build(reply_tx))
            .await
            .map_err(|_| KioskError::OrchestratorStopped)?;
        reply_rx.await.map_err(|_| KioskError::OrchestratorStopped)?
    }
}
