//! Scripted collaborators for integration tests
//!
//! Each fake records how it was used so tests can assert on call counts and
//! overlap, and answers from a script instead of the network.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rollcall_kiosk::backend::{
    BackendError, PresenceBackend, PresenceStatus, RecognitionBackend, RecognitionReply,
};
use rollcall_kiosk::camera::{Frame, FrameSource};
use rollcall_kiosk::events::{KioskEvent, KioskEventBus, EVENT_BUS_CAPACITY};
use rollcall_kiosk::identity::{resolve, IdentityMethod, IdentityToken};
use rollcall_kiosk::{Collaborators, Mode, OrchestratorHandle, TimingPolicy};

pub fn token(raw: &str) -> IdentityToken {
    resolve(IdentityMethod::Manual, raw).unwrap()
}

pub fn matched(name: &str) -> Result<RecognitionReply, BackendError> {
    Ok(RecognitionReply::Matched {
        name: Some(name.to_string()),
    })
}

pub fn no_face() -> Result<RecognitionReply, BackendError> {
    Ok(RecognitionReply::NoFace)
}

pub fn rejected(reason: &str) -> Result<RecognitionReply, BackendError> {
    Ok(RecognitionReply::Rejected {
        reason: reason.to_string(),
    })
}

/// Recognition backend answering from a queue
///
/// When the queue runs dry every further submission gets `NoFace`.
pub struct ScriptedRecognition {
    replies: Mutex<VecDeque<Result<RecognitionReply, BackendError>>>,
    delay: Duration,
    submissions: AtomicUsize,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: AtomicUsize,
}

impl ScriptedRecognition {
    pub fn new(replies: Vec<Result<RecognitionReply, BackendError>>) -> Arc<Self> {
        Self::with_delay(replies, Duration::ZERO)
    }

    /// Every submission takes `delay` before answering
    pub fn with_delay(
        replies: Vec<Result<RecognitionReply, BackendError>>,
        delay: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            delay,
            submissions: AtomicUsize::new(0),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RecognitionBackend for ScriptedRecognition {
    async fn submit(
        &self,
        _identity: &IdentityToken,
        _frame: Frame,
    ) -> Result<RecognitionReply, BackendError> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlightGuard(Arc::clone(&self.in_flight));

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(RecognitionReply::NoFace))
    }
}

/// Presence backend with one fixed answer
pub struct ScriptedPresence {
    answer: Result<PresenceStatus, BackendError>,
    delay: Duration,
    queries: AtomicUsize,
}

impl ScriptedPresence {
    pub fn new(answer: Result<PresenceStatus, BackendError>) -> Arc<Self> {
        Self::with_delay(answer, Duration::ZERO)
    }

    /// Every query takes `delay` before answering
    pub fn with_delay(answer: Result<PresenceStatus, BackendError>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            answer,
            delay,
            queries: AtomicUsize::new(0),
        })
    }

    pub fn not_recorded() -> Arc<Self> {
        Self::new(Ok(PresenceStatus::NotRecorded))
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PresenceBackend for ScriptedPresence {
    async fn check_presence(&self, _identity: &IdentityToken) -> Result<PresenceStatus, BackendError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.answer.clone()
    }
}

/// Camera that yields a frame unless the script says otherwise
///
/// Each `false` in the script is one capture with no frame; once the script
/// is exhausted every capture yields a frame.
pub struct ScriptedCamera {
    script: Mutex<VecDeque<bool>>,
    captures: AtomicUsize,
}

impl ScriptedCamera {
    pub fn ready() -> Arc<Self> {
        Self::with_script(Vec::new())
    }

    pub fn with_script(script: Vec<bool>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            captures: AtomicUsize::new(0),
        })
    }

    pub fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FrameSource for ScriptedCamera {
    async fn capture(&self) -> Option<Frame> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        let ready = self.script.lock().unwrap().pop_front().unwrap_or(true);
        ready.then(|| Frame::jpeg(vec![0xFF, 0xD8, 0xFF, 0xD9]))
    }
}

pub fn test_timing() -> TimingPolicy {
    TimingPolicy {
        probe_interval: Duration::from_millis(1000),
        result_dwell: Duration::from_millis(2000),
    }
}

/// Running orchestrator plus the fakes behind it
pub struct Harness {
    pub handle: OrchestratorHandle,
    pub task: tokio::task::JoinHandle<()>,
    pub recognition: Arc<ScriptedRecognition>,
    pub presence: Arc<ScriptedPresence>,
    pub camera: Arc<ScriptedCamera>,
}

impl Harness {
    pub fn start(
        mode: Mode,
        presence: Arc<ScriptedPresence>,
        recognition: Arc<ScriptedRecognition>,
    ) -> Self {
        let camera = ScriptedCamera::ready();
        let (handle, task) = rollcall_kiosk::spawn(
            mode,
            Collaborators {
                recognition: recognition.clone(),
                presence: presence.clone(),
                camera: camera.clone(),
            },
            test_timing(),
            KioskEventBus::new(EVENT_BUS_CAPACITY),
        );

        Self {
            handle,
            task,
            recognition,
            presence,
            camera,
        }
    }
}

/// Drain every event currently buffered on `rx`
pub fn drain(rx: &mut tokio::sync::broadcast::Receiver<KioskEvent>) -> Vec<KioskEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
