use async_trait::async_trait;
use huddle_core::{ParticipantProfile, PeerId};
use huddle_engine::{DisconnectReason, ParticipantEvents, RemoteMedia};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Records participant notifications for later assertions.
pub struct MockParticipantEvents {
    added: Mutex<Vec<(PeerId, ParticipantProfile)>>,
    left: Mutex<Vec<(PeerId, DisconnectReason)>>,
    attach_attempts: Mutex<Vec<PeerId>>,
    attach_succeeds: AtomicBool,
}

impl MockParticipantEvents {
    pub fn new() -> Self {
        Self {
            added: Mutex::new(Vec::new()),
            left: Mutex::new(Vec::new()),
            attach_attempts: Mutex::new(Vec::new()),
            attach_succeeds: AtomicBool::new(true),
        }
    }

    pub fn added(&self) -> Vec<(PeerId, ParticipantProfile)> {
        self.added.lock().unwrap().clone()
    }

    pub fn left(&self) -> Vec<(PeerId, DisconnectReason)> {
        self.left.lock().unwrap().clone()
    }

    pub fn attach_attempts(&self) -> Vec<PeerId> {
        self.attach_attempts.lock().unwrap().clone()
    }

    /// When `false`, attach calls report the tile as not ready, forcing
    /// the engine's bounded retry.
    pub fn set_attach_succeeds(&self, succeeds: bool) {
        self.attach_succeeds.store(succeeds, Ordering::SeqCst);
    }
}

#[async_trait]
impl ParticipantEvents for MockParticipantEvents {
    async fn participant_added(&self, peer_id: PeerId, profile: ParticipantProfile) {
        self.added.lock().unwrap().push((peer_id, profile));
    }

    async fn participant_left(&self, peer_id: PeerId, reason: DisconnectReason) {
        self.left.lock().unwrap().push((peer_id, reason));
    }

    async fn attach_remote_media(&self, peer_id: PeerId, _media: RemoteMedia) -> bool {
        self.attach_attempts.lock().unwrap().push(peer_id);
        self.attach_succeeds.load(Ordering::SeqCst)
    }
}
