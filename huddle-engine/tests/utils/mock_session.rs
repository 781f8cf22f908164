use async_trait::async_trait;
use huddle_core::{MediaKind, PeerId};
use huddle_engine::{
    LocalMedia, PeerSession, RemoteMedia, SessionError, SessionEvent, SessionFactory,
    SignalingPhase, TransportHealth,
};
use huddle_engine::session::SessionStats;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Scripted outcome for one apply call on a [`MockSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Succeed,
    /// Wrong-state error: the engine must buffer and retry.
    FailRecoverable,
    /// Transport-class error: the engine must tear the peer down.
    FailFatal,
    /// Never completes (within any test horizon); exercises the guard
    /// deadline.
    Hang,
}

/// Per-session script; each apply pops the next behavior, defaulting to
/// `Succeed` once the queue is empty.
#[derive(Default, Clone)]
pub struct SessionScript {
    pub offer_apply: VecDeque<Behavior>,
    pub answer_apply: VecDeque<Behavior>,
}

impl SessionScript {
    pub fn offers(behaviors: impl IntoIterator<Item = Behavior>) -> Self {
        Self {
            offer_apply: behaviors.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn answers(behaviors: impl IntoIterator<Item = Behavior>) -> Self {
        Self {
            answer_apply: behaviors.into_iter().collect(),
            ..Default::default()
        }
    }
}

struct MockState {
    phase: SignalingPhase,
    remote_sdp: Option<String>,
    candidates: Vec<String>,
    health: TransportHealth,
    stats: SessionStats,
    closed: bool,
    offer_attempts: usize,
    video_track_swaps: usize,
}

/// In-memory stand-in for a transport session: tracks the offer/answer
/// phase like the real thing, records applied candidates, and follows a
/// [`SessionScript`] for failure injection.
pub struct MockSession {
    peer_id: PeerId,
    state: Mutex<MockState>,
    script: Mutex<SessionScript>,
    events: mpsc::Sender<SessionEvent>,
}

impl MockSession {
    fn new(peer_id: PeerId, script: SessionScript, events: mpsc::Sender<SessionEvent>) -> Self {
        Self {
            peer_id,
            state: Mutex::new(MockState {
                phase: SignalingPhase::Stable,
                remote_sdp: None,
                candidates: Vec::new(),
                health: TransportHealth::Connected,
                stats: SessionStats::default(),
                closed: false,
                offer_attempts: 0,
                video_track_swaps: 0,
            }),
            script: Mutex::new(script),
            events,
        }
    }

    pub fn phase(&self) -> SignalingPhase {
        self.state.lock().unwrap().phase
    }

    pub fn remote_description(&self) -> Option<String> {
        self.state.lock().unwrap().remote_sdp.clone()
    }

    pub fn applied_candidates(&self) -> Vec<String> {
        self.state.lock().unwrap().candidates.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    pub fn offer_attempts(&self) -> usize {
        self.state.lock().unwrap().offer_attempts
    }

    pub fn video_track_swaps(&self) -> usize {
        self.state.lock().unwrap().video_track_swaps
    }

    pub fn set_health(&self, health: TransportHealth) {
        self.state.lock().unwrap().health = health;
    }

    pub fn set_stats(&self, stats: SessionStats) {
        self.state.lock().unwrap().stats = stats;
    }

    pub async fn emit_candidate(&self, candidate: &str) {
        let _ = self
            .events
            .send(SessionEvent::CandidateGenerated(
                self.peer_id.clone(),
                candidate.to_string(),
            ))
            .await;
    }

    pub async fn emit_remote_media(&self, kind: MediaKind) {
        let _ = self
            .events
            .send(SessionEvent::RemoteMedia(
                self.peer_id.clone(),
                RemoteMedia { kind, track: None },
            ))
            .await;
    }
}

#[async_trait]
impl PeerSession for MockSession {
    async fn create_offer(&self) -> Result<String, SessionError> {
        let mut state = self.state.lock().unwrap();
        if state.phase != SignalingPhase::Stable {
            return Err(SessionError::InvalidState { phase: state.phase });
        }
        state.phase = SignalingPhase::HaveLocalOffer;
        Ok(format!("offer-from-{}", self.peer_id))
    }

    async fn accept_remote_offer(&self, sdp: &str) -> Result<(), SessionError> {
        let behavior = self
            .script
            .lock()
            .unwrap()
            .offer_apply
            .pop_front()
            .unwrap_or(Behavior::Succeed);
        self.state.lock().unwrap().offer_attempts += 1;

        match behavior {
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(SessionError::Media("hung apply".into()))
            }
            Behavior::FailRecoverable => Err(SessionError::InvalidState {
                phase: self.phase(),
            }),
            Behavior::FailFatal => Err(SessionError::Media("scripted offer failure".into())),
            Behavior::Succeed => {
                let mut state = self.state.lock().unwrap();
                if state.phase != SignalingPhase::Stable {
                    return Err(SessionError::InvalidState { phase: state.phase });
                }
                state.remote_sdp = Some(sdp.to_string());
                state.phase = SignalingPhase::HaveRemoteOffer;
                Ok(())
            }
        }
    }

    async fn create_answer(&self) -> Result<String, SessionError> {
        let mut state = self.state.lock().unwrap();
        if state.phase != SignalingPhase::HaveRemoteOffer {
            return Err(SessionError::InvalidState { phase: state.phase });
        }
        state.phase = SignalingPhase::Stable;
        Ok(format!("answer-from-{}", self.peer_id))
    }

    async fn accept_remote_answer(&self, sdp: &str) -> Result<(), SessionError> {
        let behavior = self
            .script
            .lock()
            .unwrap()
            .answer_apply
            .pop_front()
            .unwrap_or(Behavior::Succeed);

        match behavior {
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(SessionError::Media("hung apply".into()))
            }
            Behavior::FailRecoverable => Err(SessionError::InvalidState {
                phase: self.phase(),
            }),
            Behavior::FailFatal => Err(SessionError::Media("scripted answer failure".into())),
            Behavior::Succeed => {
                let mut state = self.state.lock().unwrap();
                if state.phase != SignalingPhase::HaveLocalOffer {
                    return Err(SessionError::InvalidState { phase: state.phase });
                }
                state.remote_sdp = Some(sdp.to_string());
                state.phase = SignalingPhase::Stable;
                Ok(())
            }
        }
    }

    async fn add_remote_candidate(&self, candidate: &str) -> Result<(), SessionError> {
        self.state
            .lock()
            .unwrap()
            .candidates
            .push(candidate.to_string());
        Ok(())
    }

    async fn has_remote_description(&self) -> bool {
        self.state.lock().unwrap().remote_sdp.is_some()
    }

    fn signaling_phase(&self) -> SignalingPhase {
        self.state.lock().unwrap().phase
    }

    fn transport_health(&self) -> TransportHealth {
        self.state.lock().unwrap().health
    }

    async fn stats(&self) -> SessionStats {
        self.state.lock().unwrap().stats
    }

    async fn replace_video_track(&self, _media: &LocalMedia) -> Result<(), SessionError> {
        self.state.lock().unwrap().video_track_swaps += 1;
        Ok(())
    }

    async fn close(&self) {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        state.phase = SignalingPhase::Closed;
        state.health = TransportHealth::Closed;
    }
}

/// Factory handing out [`MockSession`]s and remembering every one it
/// created so tests can inspect them afterwards.
pub struct MockSessionFactory {
    sessions: Mutex<Vec<Arc<MockSession>>>,
    scripts: Mutex<VecDeque<SessionScript>>,
    fail_next_create: AtomicBool,
}

impl MockSessionFactory {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(Vec::new()),
            scripts: Mutex::new(VecDeque::new()),
            fail_next_create: AtomicBool::new(false),
        }
    }

    /// Script the next created session; scripts are consumed in creation
    /// order.
    pub fn push_script(&self, script: SessionScript) {
        self.scripts.lock().unwrap().push_back(script);
    }

    pub fn fail_next_create(&self) {
        self.fail_next_create.store(true, Ordering::SeqCst);
    }

    pub fn sessions(&self) -> Vec<Arc<MockSession>> {
        self.sessions.lock().unwrap().clone()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}

#[async_trait]
impl SessionFactory for MockSessionFactory {
    async fn create_session(
        &self,
        peer_id: PeerId,
        _media: &LocalMedia,
        events: mpsc::Sender<SessionEvent>,
    ) -> Result<Arc<dyn PeerSession>, SessionError> {
        if self.fail_next_create.swap(false, Ordering::SeqCst) {
            return Err(SessionError::Media("scripted create failure".into()));
        }
        let script = self.scripts.lock().unwrap().pop_front().unwrap_or_default();
        let session = Arc::new(MockSession::new(peer_id, script, events));
        self.sessions.lock().unwrap().push(Arc::clone(&session));
        Ok(session)
    }
}
