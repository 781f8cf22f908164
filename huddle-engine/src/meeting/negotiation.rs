use crate::meeting::meeting_event::{InitiateOutcome, MeetingEvent, OfferOutcome};
use crate::session::{
    LocalMedia, PeerSession, SessionError, SessionEvent, SessionFactory, SignalingPhase,
};
use huddle_core::PeerId;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Glare tie-break: when both sides hold a local offer, the side with
/// the greater peer id discards its offer and answers instead. Both
/// sides evaluate the same comparison, so exactly one yields.
pub fn local_yields(local: &PeerId, remote: &PeerId) -> bool {
    local > remote
}

/// Facts about one peer's current state, gathered by the loop before an
/// offer apply is dispatched.
#[derive(Debug, Clone, Copy)]
pub struct OfferFacts {
    pub guard_held: bool,
    pub phase: Option<SignalingPhase>,
    pub has_remote_description: bool,
    pub local_yields: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferPlan {
    /// Buffer the offer and retry later (guard in flight or mid-answer).
    Buffer,
    /// Remote description already set: duplicate offer, ignore.
    DropDuplicate,
    /// Glare and the remote side is the one that yields: ignore this
    /// offer, our own offer stands and the remote will answer it.
    Ignore,
    /// Apply now. `replace` closes the current session first and starts
    /// over as answerer (glare yield, or a dead session).
    Apply { replace: bool },
}

pub fn plan_offer(facts: OfferFacts) -> OfferPlan {
    if facts.guard_held {
        return OfferPlan::Buffer;
    }
    match facts.phase {
        None => OfferPlan::Apply { replace: false },
        Some(SignalingPhase::Stable) => {
            if facts.has_remote_description {
                OfferPlan::DropDuplicate
            } else {
                OfferPlan::Apply { replace: false }
            }
        }
        Some(SignalingPhase::HaveLocalOffer) => {
            if facts.local_yields {
                OfferPlan::Apply { replace: true }
            } else {
                OfferPlan::Ignore
            }
        }
        Some(SignalingPhase::HaveRemoteOffer) => OfferPlan::Buffer,
        Some(SignalingPhase::Closed) => OfferPlan::Apply { replace: true },
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AnswerFacts {
    pub guard_held: bool,
    pub phase: Option<SignalingPhase>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerPlan {
    Buffer,
    /// Already `Stable`: the answer was applied before, drop silently.
    DropDuplicate,
    Apply,
}

pub fn plan_answer(facts: AnswerFacts) -> AnswerPlan {
    if facts.guard_held {
        return AnswerPlan::Buffer;
    }
    match facts.phase {
        None => AnswerPlan::Buffer,
        Some(SignalingPhase::Stable) => AnswerPlan::DropDuplicate,
        Some(SignalingPhase::HaveLocalOffer) => AnswerPlan::Apply,
        Some(SignalingPhase::HaveRemoteOffer) | Some(SignalingPhase::Closed) => AnswerPlan::Buffer,
    }
}

/// Create a session (closing `previous` first if restarting), produce an
/// offer, and report back. Run as a spawned task so a slow transport
/// never stalls the meeting loop.
pub(crate) async fn run_initiate(
    peer_id: PeerId,
    seq: u64,
    previous: Option<Arc<dyn PeerSession>>,
    factory: Arc<dyn SessionFactory>,
    media: LocalMedia,
    session_tx: mpsc::Sender<SessionEvent>,
    event_tx: mpsc::Sender<MeetingEvent>,
) {
    if let Some(old) = previous {
        old.close().await;
    }

    let result = initiate_inner(&peer_id, &factory, &media, session_tx).await;
    let _ = event_tx
        .send(MeetingEvent::Initiated {
            peer_id,
            seq,
            result,
        })
        .await;
}

async fn initiate_inner(
    peer_id: &PeerId,
    factory: &Arc<dyn SessionFactory>,
    media: &LocalMedia,
    session_tx: mpsc::Sender<SessionEvent>,
) -> Result<InitiateOutcome, SessionError> {
    let session = factory
        .create_session(peer_id.clone(), media, session_tx)
        .await?;
    match session.create_offer().await {
        Ok(offer_sdp) => Ok(InitiateOutcome { session, offer_sdp }),
        Err(err) => {
            // No half-initialized sessions: discard before surfacing.
            session.close().await;
            Err(err)
        }
    }
}

/// Apply a remote offer and produce an answer. `existing` is `None` when
/// a fresh answerer session must be created (including the glare-yield
/// path, where the loop already detached the doomed session and passes
/// it as `replace`).
pub(crate) async fn run_offer_apply(
    peer_id: PeerId,
    seq: u64,
    offer_sdp: String,
    existing: Option<Arc<dyn PeerSession>>,
    replace: Option<Arc<dyn PeerSession>>,
    factory: Arc<dyn SessionFactory>,
    media: LocalMedia,
    session_tx: mpsc::Sender<SessionEvent>,
    event_tx: mpsc::Sender<MeetingEvent>,
) {
    if let Some(old) = replace {
        old.close().await;
    }

    let result = offer_apply_inner(&peer_id, &offer_sdp, existing, &factory, &media, session_tx)
        .await;
    let _ = event_tx
        .send(MeetingEvent::OfferApplied {
            peer_id,
            seq,
            offer_sdp,
            result,
        })
        .await;
}

async fn offer_apply_inner(
    peer_id: &PeerId,
    offer_sdp: &str,
    existing: Option<Arc<dyn PeerSession>>,
    factory: &Arc<dyn SessionFactory>,
    media: &LocalMedia,
    session_tx: mpsc::Sender<SessionEvent>,
) -> Result<OfferOutcome, SessionError> {
    let (session, fresh) = match existing {
        Some(session) => (session, false),
        None => {
            let session = factory
                .create_session(peer_id.clone(), media, session_tx)
                .await?;
            (session, true)
        }
    };

    let applied = async {
        session.accept_remote_offer(offer_sdp).await?;
        session.create_answer().await
    }
    .await;

    match applied {
        Ok(answer_sdp) => Ok(OfferOutcome {
            session: fresh.then_some(session),
            answer_sdp,
        }),
        Err(err) => {
            if fresh {
                session.close().await;
            }
            Err(err)
        }
    }
}

pub(crate) async fn run_answer_apply(
    peer_id: PeerId,
    seq: u64,
    answer_sdp: String,
    session: Arc<dyn PeerSession>,
    event_tx: mpsc::Sender<MeetingEvent>,
) {
    let result = session.accept_remote_answer(&answer_sdp).await;
    let _ = event_tx
        .send(MeetingEvent::AnswerApplied {
            peer_id,
            seq,
            answer_sdp,
            result,
        })
        .await;
}
