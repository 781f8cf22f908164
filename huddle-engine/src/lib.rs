pub mod meeting;
pub mod session;
pub mod signaling;

pub use meeting::{
    DisconnectReason, Meeting, MeetingCommand, MeetingConfig, MeetingHandle, MeetingManager,
};
pub use session::{
    LocalMedia, PeerSession, RemoteMedia, SessionConfig, SessionError, SessionEvent,
    SessionFactory, SessionStats, SignalingPhase, TransportHealth, WebRtcSessionFactory,
};
pub use signaling::{ParticipantEvents, SignalingOutput};
