mod participant_events;
mod signaling_output;

pub use participant_events::{DisconnectReason, ParticipantEvents};
pub use signaling_output::SignalingOutput;
