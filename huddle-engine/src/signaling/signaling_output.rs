use async_trait::async_trait;
use huddle_core::{MediaKind, PeerId, StatsSummary};

/// Outbound half of the signaling channel. The engine never talks to the
/// relay directly; everything leaves through this seam so tests can swap
/// in a capture.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    async fn send_offer(&self, to: PeerId, sdp: String);
    async fn send_answer(&self, to: PeerId, sdp: String);
    async fn send_ice_candidate(&self, to: PeerId, candidate: String);
    async fn send_media_toggle(&self, kind: MediaKind, enabled: bool);
    async fn send_stats(&self, summary: StatsSummary);
}
