mod media;
mod meeting;
mod peer;
mod quality;
mod signaling;

pub use media::MediaKind;
pub use meeting::MeetingId;
pub use peer::{ParticipantProfile, PeerId};
pub use quality::{ConnectionQuality, StatsSummary};
pub use signaling::{IceServerConfig, ParticipantInfo, SignalMessage};
