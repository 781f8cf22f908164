use crate::meeting::meeting::{Meeting, MeetingConfig, MeetingHandle};
use crate::meeting::meeting_command::MeetingCommand;
use crate::session::{LocalMedia, SessionFactory};
use crate::signaling::{ParticipantEvents, SignalingOutput};
use dashmap::DashMap;
use huddle_core::{MeetingId, PeerId};
use std::sync::Arc;
use tracing::info;

/// Owns one running [`Meeting`] loop per meeting id. Each meeting is an
/// independent instance with its own registry, so several can coexist
/// in one process.
#[derive(Clone)]
pub struct MeetingManager {
    meetings: Arc<DashMap<MeetingId, MeetingHandle>>,
    config: MeetingConfig,
    factory: Arc<dyn SessionFactory>,
    signaling: Arc<dyn SignalingOutput>,
    events: Arc<dyn ParticipantEvents>,
}

impl MeetingManager {
    pub fn new(
        config: MeetingConfig,
        factory: Arc<dyn SessionFactory>,
        signaling: Arc<dyn SignalingOutput>,
        events: Arc<dyn ParticipantEvents>,
    ) -> Self {
        Self {
            meetings: Arc::new(DashMap::new()),
            config,
            factory,
            signaling,
            events,
        }
    }

    pub fn join_meeting(
        &self,
        meeting_id: &MeetingId,
        local_peer_id: PeerId,
        media: LocalMedia,
    ) -> MeetingHandle {
        if let Some(handle) = self.meetings.get(meeting_id) {
            return handle.clone();
        }

        info!(meeting = %meeting_id, "starting meeting loop");
        let (meeting, handle) = Meeting::new(
            local_peer_id,
            self.config.clone(),
            media,
            self.factory.clone(),
            self.signaling.clone(),
            self.events.clone(),
        );
        tokio::spawn(meeting.run());

        self.meetings.insert(meeting_id.clone(), handle.clone());
        handle
    }

    pub fn get(&self, meeting_id: &MeetingId) -> Option<MeetingHandle> {
        self.meetings.get(meeting_id).map(|h| h.clone())
    }

    pub async fn leave_meeting(&self, meeting_id: &MeetingId) {
        if let Some((_, handle)) = self.meetings.remove(meeting_id) {
            handle.send(MeetingCommand::Leave).await;
        }
    }
}
