use crate::meeting::peer_context::GuardKind;
use crate::session::{PeerSession, SessionError};
use huddle_core::PeerId;
use std::sync::Arc;

pub(crate) struct InitiateOutcome {
    pub session: Arc<dyn PeerSession>,
    pub offer_sdp: String,
}

pub(crate) struct OfferOutcome {
    /// `Some` when the apply created a fresh session the loop must install.
    pub session: Option<Arc<dyn PeerSession>>,
    pub answer_sdp: String,
}

/// Outcomes reported back to the meeting loop by spawned negotiation
/// tasks and by guard-deadline timers. The original SDP rides along so
/// a recoverable failure can re-buffer it.
pub(crate) enum MeetingEvent {
    Initiated {
        peer_id: PeerId,
        seq: u64,
        result: Result<InitiateOutcome, SessionError>,
    },
    OfferApplied {
        peer_id: PeerId,
        seq: u64,
        offer_sdp: String,
        result: Result<OfferOutcome, SessionError>,
    },
    AnswerApplied {
        peer_id: PeerId,
        seq: u64,
        answer_sdp: String,
        result: Result<(), SessionError>,
    },
    GuardExpired {
        peer_id: PeerId,
        kind: GuardKind,
        seq: u64,
    },
}
