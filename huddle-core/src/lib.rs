pub mod model;

pub use model::{
    ConnectionQuality, IceServerConfig, MediaKind, MeetingId, ParticipantInfo, ParticipantProfile,
    PeerId, SignalMessage, StatsSummary,
};
