use crate::session::PeerSession;
use huddle_core::{ParticipantProfile, PeerId};
use std::sync::Arc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardKind {
    Offer,
    Answer,
}

/// In-flight marker for one apply. The timer task fires a guard-expiry
/// event after the deadline so a hung apply cannot starve retries; the
/// sequence number lets the loop discard outcomes from superseded work.
pub struct Guard {
    pub seq: u64,
    timer: JoinHandle<()>,
}

impl Guard {
    pub fn new(seq: u64, timer: JoinHandle<()>) -> Self {
        Self { seq, timer }
    }

    pub fn release(self) {
        self.timer.abort();
    }
}

/// Everything the engine tracks for one remote peer: the live session,
/// the in-flight guards, and the buffers for messages that arrived in a
/// phase where they could not yet be applied.
pub struct PeerContext {
    pub peer_id: PeerId,
    pub profile: ParticipantProfile,
    pub session: Option<Arc<dyn PeerSession>>,
    pub offer_guard: Option<Guard>,
    pub answer_guard: Option<Guard>,
    /// Last-write-wins: a newer buffered offer supersedes an older one.
    pub pending_offer: Option<String>,
    pub pending_answer: Option<String>,
    /// Applied strictly in arrival order once a remote description exists.
    pub pending_candidates: Vec<String>,
}

impl PeerContext {
    pub fn new(peer_id: PeerId) -> Self {
        Self {
            peer_id,
            profile: ParticipantProfile::default(),
            session: None,
            offer_guard: None,
            answer_guard: None,
            pending_offer: None,
            pending_answer: None,
            pending_candidates: Vec::new(),
        }
    }

    pub fn set_guard(&mut self, kind: GuardKind, guard: Guard) {
        let slot = match kind {
            GuardKind::Offer => &mut self.offer_guard,
            GuardKind::Answer => &mut self.answer_guard,
        };
        if let Some(old) = slot.replace(guard) {
            old.release();
        }
    }

    /// Clears the guard only if `seq` still names the current holder.
    /// Returns whether it matched; a mismatch means the outcome belongs
    /// to superseded work and must be discarded.
    pub fn clear_guard(&mut self, kind: GuardKind, seq: u64) -> bool {
        let slot = match kind {
            GuardKind::Offer => &mut self.offer_guard,
            GuardKind::Answer => &mut self.answer_guard,
        };
        match slot {
            Some(guard) if guard.seq == seq => {
                if let Some(guard) = slot.take() {
                    guard.release();
                }
                true
            }
            _ => false,
        }
    }

    pub fn clear_all_guards(&mut self) {
        if let Some(guard) = self.offer_guard.take() {
            guard.release();
        }
        if let Some(guard) = self.answer_guard.take() {
            guard.release();
        }
    }

    pub fn clear_buffers(&mut self) {
        self.pending_offer = None;
        self.pending_answer = None;
        self.pending_candidates.clear();
    }
}
