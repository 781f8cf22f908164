use serde::{Deserialize, Serialize};

use super::peer::{ParticipantProfile, PeerId};
use super::quality::StatsSummary;

/// Entry of the `existing-participants` roster sent to a newcomer.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ParticipantInfo {
    pub peer_id: PeerId,
    pub profile: ParticipantProfile,
}

/// STUN/TURN server entry handed to the transport layer.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

/// Envelope relayed through the signaling channel between peers.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "op", content = "d", rename_all = "kebab-case")]
pub enum SignalMessage {
    Offer {
        from: PeerId,
        to: PeerId,
        sdp: String,
    },
    Answer {
        from: PeerId,
        to: PeerId,
        sdp: String,
    },
    IceCandidate {
        from: PeerId,
        to: PeerId,
        /// JSON-serialized candidate init, opaque to the relay.
        candidate: String,
    },
    UserJoined {
        peer_id: PeerId,
        profile: ParticipantProfile,
    },
    ExistingParticipants {
        participants: Vec<ParticipantInfo>,
    },
    UserLeft {
        peer_id: PeerId,
    },
    ToggleAudio {
        from: PeerId,
        enabled: bool,
    },
    ToggleVideo {
        from: PeerId,
        enabled: bool,
    },
    StatsUpdate {
        from: PeerId,
        summary: StatsSummary,
    },
}
