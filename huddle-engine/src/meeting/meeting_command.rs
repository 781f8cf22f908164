use crate::session::LocalMedia;
use huddle_core::{ParticipantInfo, ParticipantProfile, PeerId};

/// Everything a meeting reacts to: inbound signaling, roster changes,
/// and local user actions. Sent through the handle returned by
/// [`Meeting::new`](crate::meeting::Meeting::new).
pub enum MeetingCommand {
    /// Remote peer sent us a session description offer.
    Offer { from: PeerId, sdp: String },
    /// Remote peer answered our offer.
    Answer { from: PeerId, sdp: String },
    /// Remote peer trickled a network candidate (JSON-encoded).
    Candidate { from: PeerId, candidate: String },
    /// A newcomer announced itself; we create the context and wait for
    /// its offer (the newcomer initiates toward existing participants).
    ParticipantJoined {
        peer_id: PeerId,
        profile: ParticipantProfile,
    },
    /// Roster handed to us on join; we initiate toward each entry.
    ExistingParticipants { participants: Vec<ParticipantInfo> },
    ParticipantLeft { peer_id: PeerId },
    /// Restart negotiation with one peer from scratch.
    Reconnect { peer_id: PeerId },
    SetAudioEnabled { enabled: bool },
    SetVideoEnabled { enabled: bool },
    /// Swap the outbound video track on every live session (screen share).
    ReplaceVideoTrack { media: LocalMedia },
    /// Tear down every peer and stop the loop.
    Leave,
}
