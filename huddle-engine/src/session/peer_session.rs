use async_trait::async_trait;
use huddle_core::{MediaKind, PeerId};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

/// Where the session sits in the offer/answer exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingPhase {
    Stable,
    HaveLocalOffer,
    HaveRemoteOffer,
    Closed,
}

/// Liveness of the underlying transport, sampled by the quality loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportHealth {
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// One poll of the transport's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SessionStats {
    pub rtt_ms: Option<f64>,
    pub video_bytes_sent: u64,
    pub video_bytes_received: u64,
}

#[derive(Debug, Error)]
pub enum SessionError {
    /// The transport was not in a phase where the operation is legal.
    /// The engine buffers the message and retries once the phase settles.
    #[error("operation not valid in phase {phase:?}")]
    InvalidState { phase: SignalingPhase },
    #[error("malformed candidate: {0}")]
    Candidate(#[from] serde_json::Error),
    #[error("media: {0}")]
    Media(String),
    #[error("transport: {0}")]
    Transport(#[from] webrtc::Error),
}

impl SessionError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::InvalidState { .. })
    }
}

/// Locally captured tracks handed to each session on creation.
#[derive(Clone, Default)]
pub struct LocalMedia {
    pub audio: Option<Arc<dyn TrackLocal + Send + Sync>>,
    pub video: Option<Arc<dyn TrackLocal + Send + Sync>>,
}

/// A track (or the end of one) arriving from the remote peer.
#[derive(Clone)]
pub struct RemoteMedia {
    pub kind: MediaKind,
    pub track: Option<Arc<TrackRemote>>,
}

/// Out-of-band notifications a session pushes back to the meeting loop.
pub enum SessionEvent {
    CandidateGenerated(PeerId, String),
    RemoteMedia(PeerId, RemoteMedia),
}

/// One peer's transport. Implementations must tolerate concurrent calls;
/// the meeting loop serializes state transitions per peer but polls stats
/// and health from its sampler tick.
#[async_trait]
pub trait PeerSession: Send + Sync {
    async fn create_offer(&self) -> Result<String, SessionError>;
    async fn accept_remote_offer(&self, sdp: &str) -> Result<(), SessionError>;
    async fn create_answer(&self) -> Result<String, SessionError>;
    async fn accept_remote_answer(&self, sdp: &str) -> Result<(), SessionError>;
    async fn add_remote_candidate(&self, candidate: &str) -> Result<(), SessionError>;
    async fn has_remote_description(&self) -> bool;
    fn signaling_phase(&self) -> SignalingPhase;
    fn transport_health(&self) -> TransportHealth;
    async fn stats(&self) -> SessionStats;
    async fn replace_video_track(&self, media: &LocalMedia) -> Result<(), SessionError>;
    async fn close(&self);
}

#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create_session(
        &self,
        peer_id: PeerId,
        media: &LocalMedia,
        events: mpsc::Sender<SessionEvent>,
    ) -> Result<Arc<dyn PeerSession>, SessionError>;
}
