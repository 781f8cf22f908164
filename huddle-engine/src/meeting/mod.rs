mod meeting;
mod meeting_command;
mod meeting_event;
mod meeting_manager;
mod negotiation;
mod peer_context;
mod peer_registry;
mod sampler;

pub use meeting::{Meeting, MeetingConfig, MeetingHandle};
pub use meeting_command::MeetingCommand;
pub use meeting_manager::MeetingManager;
pub use crate::signaling::DisconnectReason;
