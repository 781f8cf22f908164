mod peer_session;
mod session_config;
mod webrtc_session;

pub use peer_session::{
    LocalMedia, PeerSession, RemoteMedia, SessionError, SessionEvent, SessionFactory, SessionStats,
    SignalingPhase, TransportHealth,
};
pub use session_config::SessionConfig;
pub use webrtc_session::{WebRtcSession, WebRtcSessionFactory};
