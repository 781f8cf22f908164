use crate::session::RemoteMedia;
use async_trait::async_trait;
use huddle_core::{ParticipantProfile, PeerId};

/// Why a participant's tile disappeared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    Left,
    TransportFailed,
    NegotiationFailed,
}

/// UI-facing notifications. Implementations should return quickly; the
/// meeting loop awaits these inline.
#[async_trait]
pub trait ParticipantEvents: Send + Sync {
    async fn participant_added(&self, peer_id: PeerId, profile: ParticipantProfile);
    async fn participant_left(&self, peer_id: PeerId, reason: DisconnectReason);
    /// Attach an incoming track to the participant's tile. Returning
    /// `false` signals the tile is not ready yet and the engine should
    /// retry after a short delay.
    async fn attach_remote_media(&self, peer_id: PeerId, media: RemoteMedia) -> bool;
}
