use crate::meeting::meeting_command::MeetingCommand;
use crate::meeting::meeting_event::MeetingEvent;
use crate::meeting::negotiation::{
    self, AnswerFacts, AnswerPlan, OfferFacts, OfferPlan, local_yields,
};
use crate::meeting::peer_context::{Guard, GuardKind};
use crate::meeting::peer_registry::PeerRegistry;
use crate::meeting::sampler::QualitySampler;
use crate::session::{
    LocalMedia, PeerSession, RemoteMedia, SessionEvent, SessionFactory,
};
use crate::signaling::{DisconnectReason, ParticipantEvents, SignalingOutput};
use huddle_core::{MediaKind, ParticipantProfile, PeerId, SignalMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct MeetingConfig {
    /// Deadline after which a stuck offer/answer apply releases its guard.
    pub guard_timeout: Duration,
    pub sampler_period: Duration,
    /// Attempts to hand a remote track to the UI before giving up.
    pub media_attach_retries: u32,
    pub media_attach_delay: Duration,
}

impl Default for MeetingConfig {
    fn default() -> Self {
        Self {
            guard_timeout: Duration::from_secs(5),
            sampler_period: Duration::from_secs(5),
            media_attach_retries: 3,
            media_attach_delay: Duration::from_millis(500),
        }
    }
}

/// Cloneable command sender for one running meeting loop.
#[derive(Clone)]
pub struct MeetingHandle {
    command_tx: mpsc::Sender<MeetingCommand>,
}

impl MeetingHandle {
    pub async fn send(&self, command: MeetingCommand) -> bool {
        self.command_tx.send(command).await.is_ok()
    }

    /// Feed an inbound wire message into the loop. Toggle and stats
    /// notifications from other peers do not affect negotiation and are
    /// absorbed here.
    pub async fn deliver_signal(&self, message: SignalMessage) -> bool {
        let command = match message {
            SignalMessage::Offer { from, sdp, .. } => MeetingCommand::Offer { from, sdp },
            SignalMessage::Answer { from, sdp, .. } => MeetingCommand::Answer { from, sdp },
            SignalMessage::IceCandidate {
                from, candidate, ..
            } => MeetingCommand::Candidate { from, candidate },
            SignalMessage::UserJoined { peer_id, profile } => {
                MeetingCommand::ParticipantJoined { peer_id, profile }
            }
            SignalMessage::ExistingParticipants { participants } => {
                MeetingCommand::ExistingParticipants { participants }
            }
            SignalMessage::UserLeft { peer_id } => MeetingCommand::ParticipantLeft { peer_id },
            SignalMessage::ToggleAudio { .. }
            | SignalMessage::ToggleVideo { .. }
            | SignalMessage::StatsUpdate { .. } => return true,
        };
        self.send(command).await
    }
}

/// One participant's negotiation engine: owns every peer context, runs
/// the event loop, and is the only place registry state is mutated.
pub struct Meeting {
    local_peer_id: PeerId,
    config: MeetingConfig,
    media: LocalMedia,
    registry: PeerRegistry,
    sampler: QualitySampler,
    command_rx: mpsc::Receiver<MeetingCommand>,
    session_rx: mpsc::Receiver<SessionEvent>,
    session_tx: mpsc::Sender<SessionEvent>,
    event_rx: mpsc::Receiver<MeetingEvent>,
    event_tx: mpsc::Sender<MeetingEvent>,
    factory: Arc<dyn SessionFactory>,
    signaling: Arc<dyn SignalingOutput>,
    events: Arc<dyn ParticipantEvents>,
    next_seq: u64,
}

impl Meeting {
    pub fn new(
        local_peer_id: PeerId,
        config: MeetingConfig,
        media: LocalMedia,
        factory: Arc<dyn SessionFactory>,
        signaling: Arc<dyn SignalingOutput>,
        events: Arc<dyn ParticipantEvents>,
    ) -> (Self, MeetingHandle) {
        let (command_tx, command_rx) = mpsc::channel(256);
        let (session_tx, session_rx) = mpsc::channel(256);
        let (event_tx, event_rx) = mpsc::channel(256);

        let meeting = Self {
            local_peer_id,
            config,
            media,
            registry: PeerRegistry::default(),
            sampler: QualitySampler::default(),
            command_rx,
            session_rx,
            session_tx,
            event_rx,
            event_tx,
            factory,
            signaling,
            events,
            next_seq: 0,
        };
        (meeting, MeetingHandle { command_tx })
    }

    pub async fn run(mut self) {
        info!(peer = %self.local_peer_id, "meeting event loop started");

        let mut sampler_tick = tokio::time::interval(self.config.sampler_period);
        sampler_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick of an interval fires immediately.
        sampler_tick.tick().await;

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(MeetingCommand::Leave) => {
                            self.leave().await;
                            break;
                        }
                        Some(cmd) => self.handle_command(cmd).await,
                        None => {
                            info!("command channel closed, shutting down meeting");
                            self.leave().await;
                            break;
                        }
                    }
                }

                evt = self.session_rx.recv() => {
                    if let Some(evt) = evt {
                        self.handle_session_event(evt).await;
                    }
                }

                evt = self.event_rx.recv() => {
                    if let Some(evt) = evt {
                        self.handle_meeting_event(evt).await;
                    }
                }

                _ = sampler_tick.tick() => {
                    self.sampler_tick().await;
                }
            }
        }

        info!(peer = %self.local_peer_id, "meeting event loop finished");
    }

    async fn handle_command(&mut self, cmd: MeetingCommand) {
        match cmd {
            MeetingCommand::Offer { from, sdp } => self.handle_offer(from, sdp).await,
            MeetingCommand::Answer { from, sdp } => self.handle_answer(from, sdp).await,
            MeetingCommand::Candidate { from, candidate } => {
                self.handle_candidate(from, candidate).await;
            }
            MeetingCommand::ParticipantJoined { peer_id, profile } => {
                debug!(peer = %peer_id, "participant joined, awaiting their offer");
                let ctx = self.registry.get_or_create(&peer_id);
                ctx.profile = profile.clone();
                self.events.participant_added(peer_id, profile).await;
            }
            MeetingCommand::ExistingParticipants { participants } => {
                for info in participants {
                    let ctx = self.registry.get_or_create(&info.peer_id);
                    ctx.profile = info.profile.clone();
                    self.events
                        .participant_added(info.peer_id.clone(), info.profile)
                        .await;
                    self.start_initiate(info.peer_id, false);
                }
            }
            MeetingCommand::ParticipantLeft { peer_id } => {
                self.teardown(&peer_id, DisconnectReason::Left).await;
            }
            MeetingCommand::Reconnect { peer_id } => {
                self.start_initiate(peer_id, true);
            }
            MeetingCommand::SetAudioEnabled { enabled } => {
                self.signaling
                    .send_media_toggle(MediaKind::Audio, enabled)
                    .await;
            }
            MeetingCommand::SetVideoEnabled { enabled } => {
                self.signaling
                    .send_media_toggle(MediaKind::Video, enabled)
                    .await;
            }
            MeetingCommand::ReplaceVideoTrack { media } => {
                self.media = media;
                for (peer_id, ctx) in self.registry.iter_mut() {
                    let Some(session) = &ctx.session else { continue };
                    if let Err(err) = session.replace_video_track(&self.media).await {
                        warn!(peer = %peer_id, "video track swap failed: {err}");
                    }
                }
            }
            // Intercepted by the run loop so it can break; kept here so
            // a direct call still drains cleanly.
            MeetingCommand::Leave => self.leave().await,
        }
    }

    /// Create a session toward `peer_id` and send our offer. With
    /// `restart` the current session is closed first; without it an
    /// existing live session means there is nothing to do.
    fn start_initiate(&mut self, peer_id: PeerId, restart: bool) {
        let seq = self.next_seq();
        let guard_timer = self.spawn_guard_timer(peer_id.clone(), GuardKind::Offer, seq);

        let ctx = self.registry.get_or_create(&peer_id);
        if !restart && ctx.session.is_some() {
            debug!(peer = %peer_id, "session already live, skipping initiate");
            guard_timer.abort();
            return;
        }
        let previous = ctx.session.take();
        ctx.set_guard(GuardKind::Offer, Guard::new(seq, guard_timer));

        tokio::spawn(negotiation::run_initiate(
            peer_id,
            seq,
            previous,
            Arc::clone(&self.factory),
            self.media.clone(),
            self.session_tx.clone(),
            self.event_tx.clone(),
        ));
    }

    async fn handle_offer(&mut self, from: PeerId, sdp: String) {
        let yields = local_yields(&self.local_peer_id, &from);
        let ctx = self.registry.get_or_create(&from);

        let facts = OfferFacts {
            guard_held: ctx.offer_guard.is_some(),
            phase: ctx.session.as_ref().map(|s| s.signaling_phase()),
            has_remote_description: match &ctx.session {
                Some(s) => s.has_remote_description().await,
                None => false,
            },
            local_yields: yields,
        };

        match negotiation::plan_offer(facts) {
            OfferPlan::Buffer => {
                debug!(peer = %from, "offer buffered, apply in flight or phase busy");
                ctx.pending_offer = Some(sdp);
            }
            OfferPlan::DropDuplicate => {
                debug!(peer = %from, "duplicate offer dropped");
            }
            OfferPlan::Ignore => {
                debug!(peer = %from, "glare: remote side yields, ignoring their offer");
            }
            OfferPlan::Apply { replace } => {
                let seq = self.next_seq();
                let timer = self.spawn_guard_timer(from.clone(), GuardKind::Offer, seq);

                let ctx = self
                    .registry
                    .get_or_create(&from);
                let (existing, doomed) = if replace {
                    // Glare yield or dead session: detach it so exactly
                    // one live session can exist once the task finishes.
                    (None, ctx.session.take())
                } else {
                    (ctx.session.clone(), None)
                };
                ctx.set_guard(GuardKind::Offer, Guard::new(seq, timer));
                if doomed.is_some() {
                    debug!(peer = %from, "glare: yielding local offer, answering theirs");
                }

                tokio::spawn(negotiation::run_offer_apply(
                    from,
                    seq,
                    sdp,
                    existing,
                    doomed,
                    Arc::clone(&self.factory),
                    self.media.clone(),
                    self.session_tx.clone(),
                    self.event_tx.clone(),
                ));
            }
        }
    }

    async fn handle_answer(&mut self, from: PeerId, sdp: String) {
        let ctx = self.registry.get_or_create(&from);
        let facts = AnswerFacts {
            guard_held: ctx.answer_guard.is_some(),
            phase: ctx.session.as_ref().map(|s| s.signaling_phase()),
        };

        match negotiation::plan_answer(facts) {
            AnswerPlan::Buffer => {
                debug!(peer = %from, "answer buffered for retry");
                ctx.pending_answer = Some(sdp);
            }
            AnswerPlan::DropDuplicate => {
                debug!(peer = %from, "duplicate answer dropped");
            }
            AnswerPlan::Apply => {
                let Some(session) = ctx.session.clone() else {
                    return;
                };
                let seq = self.next_seq();
                let timer = self.spawn_guard_timer(from.clone(), GuardKind::Answer, seq);
                let ctx = self.registry.get_or_create(&from);
                ctx.set_guard(GuardKind::Answer, Guard::new(seq, timer));

                tokio::spawn(negotiation::run_answer_apply(
                    from,
                    seq,
                    sdp,
                    session,
                    self.event_tx.clone(),
                ));
            }
        }
    }

    async fn handle_candidate(&mut self, from: PeerId, candidate: String) {
        let ctx = self.registry.get_or_create(&from);

        // Candidates wait while an apply is in flight: the remote
        // description they depend on is about to change hands. A
        // non-empty backlog also forces buffering, otherwise this
        // candidate would jump ahead of earlier arrivals.
        let applying = ctx.offer_guard.is_some() || ctx.answer_guard.is_some();
        let backlog = !ctx.pending_candidates.is_empty();
        let ready = match &ctx.session {
            Some(session) if !applying && !backlog => session.has_remote_description().await,
            _ => false,
        };

        if !ready {
            ctx.pending_candidates.push(candidate);
            return;
        }

        let session = ctx.session.clone();
        if let Some(session) = session {
            if let Err(err) = session.add_remote_candidate(&candidate).await {
                // Candidates are additive; one bad path is not fatal.
                warn!(peer = %from, "failed to add candidate: {err}");
            }
        }
    }

    async fn flush_pending_candidates(&mut self, peer_id: &PeerId) {
        let Some(ctx) = self.registry.get_mut(peer_id) else {
            return;
        };
        let Some(session) = ctx.session.clone() else {
            return;
        };
        let candidates: Vec<String> = ctx.pending_candidates.drain(..).collect();
        for candidate in candidates {
            if let Err(err) = session.add_remote_candidate(&candidate).await {
                warn!(peer = %peer_id, "failed to flush candidate: {err}");
            }
        }
    }

    async fn handle_meeting_event(&mut self, event: MeetingEvent) {
        match event {
            MeetingEvent::Initiated {
                peer_id,
                seq,
                result,
            } => {
                let Some(ctx) = self.registry.get_mut(&peer_id) else {
                    if let Ok(outcome) = result {
                        tokio::spawn(async move { outcome.session.close().await });
                    }
                    return;
                };
                if !ctx.clear_guard(GuardKind::Offer, seq) {
                    debug!(peer = %peer_id, "discarding superseded initiate outcome");
                    if let Ok(outcome) = result {
                        tokio::spawn(async move { outcome.session.close().await });
                    }
                    return;
                }
                match result {
                    Ok(outcome) => {
                        if let Some(old) = ctx.session.replace(outcome.session) {
                            tokio::spawn(async move { old.close().await });
                        }
                        self.signaling.send_offer(peer_id, outcome.offer_sdp).await;
                    }
                    Err(err) => {
                        error!(peer = %peer_id, "failed to initiate negotiation: {err}");
                        self.teardown(&peer_id, DisconnectReason::NegotiationFailed)
                            .await;
                    }
                }
            }

            MeetingEvent::OfferApplied {
                peer_id,
                seq,
                offer_sdp,
                result,
            } => {
                let Some(ctx) = self.registry.get_mut(&peer_id) else {
                    if let Ok(outcome) = result {
                        if let Some(session) = outcome.session {
                            tokio::spawn(async move { session.close().await });
                        }
                    }
                    return;
                };
                if !ctx.clear_guard(GuardKind::Offer, seq) {
                    debug!(peer = %peer_id, "discarding superseded offer outcome");
                    if let Ok(outcome) = result {
                        if let Some(session) = outcome.session {
                            tokio::spawn(async move { session.close().await });
                        }
                    }
                    return;
                }
                match result {
                    Ok(outcome) => {
                        if let Some(fresh) = outcome.session {
                            if let Some(old) = ctx.session.replace(fresh) {
                                tokio::spawn(async move { old.close().await });
                            }
                        }
                        self.signaling.send_answer(peer_id.clone(), outcome.answer_sdp).await;
                        self.flush_pending_candidates(&peer_id).await;
                    }
                    Err(err) if err.is_recoverable() => {
                        debug!(peer = %peer_id, "offer apply hit a negotiation race, re-buffering: {err}");
                        if ctx.pending_offer.is_none() {
                            ctx.pending_offer = Some(offer_sdp);
                        }
                    }
                    Err(err) => {
                        error!(peer = %peer_id, "offer apply failed: {err}");
                        self.teardown(&peer_id, DisconnectReason::NegotiationFailed)
                            .await;
                    }
                }
            }

            MeetingEvent::AnswerApplied {
                peer_id,
                seq,
                answer_sdp,
                result,
            } => {
                let Some(ctx) = self.registry.get_mut(&peer_id) else {
                    return;
                };
                if !ctx.clear_guard(GuardKind::Answer, seq) {
                    debug!(peer = %peer_id, "discarding superseded answer outcome");
                    return;
                }
                match result {
                    Ok(()) => {
                        self.flush_pending_candidates(&peer_id).await;
                    }
                    Err(err) if err.is_recoverable() => {
                        debug!(peer = %peer_id, "answer apply hit a negotiation race, re-buffering: {err}");
                        if ctx.pending_answer.is_none() {
                            ctx.pending_answer = Some(answer_sdp);
                        }
                    }
                    Err(err) => {
                        error!(peer = %peer_id, "answer apply failed: {err}");
                        self.teardown(&peer_id, DisconnectReason::NegotiationFailed)
                            .await;
                    }
                }
            }

            MeetingEvent::GuardExpired { peer_id, kind, seq } => {
                let Some(ctx) = self.registry.get_mut(&peer_id) else {
                    return;
                };
                if ctx.clear_guard(kind, seq) {
                    warn!(peer = %peer_id, ?kind, "apply deadline expired, releasing guard");
                }
            }
        }
    }

    async fn handle_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::CandidateGenerated(peer_id, candidate) => {
                if self.registry.contains(&peer_id) {
                    self.signaling.send_ice_candidate(peer_id, candidate).await;
                }
            }
            SessionEvent::RemoteMedia(peer_id, media) => {
                self.spawn_media_attach(peer_id, media);
            }
        }
    }

    /// `user-joined` and the first track can race; retry a few times
    /// before declaring the tile unreachable.
    fn spawn_media_attach(&self, peer_id: PeerId, media: RemoteMedia) {
        let events = Arc::clone(&self.events);
        let retries = self.config.media_attach_retries;
        let delay = self.config.media_attach_delay;
        tokio::spawn(async move {
            for _ in 0..=retries {
                if events.attach_remote_media(peer_id.clone(), media.clone()).await {
                    return;
                }
                tokio::time::sleep(delay).await;
            }
            warn!(peer = %peer_id, "giving up attaching remote media");
        });
    }

    async fn sampler_tick(&mut self) {
        let sessions: Vec<(PeerId, Arc<dyn PeerSession>)> = self
            .registry
            .iter_mut()
            .filter_map(|(peer_id, ctx)| {
                ctx.session
                    .clone()
                    .map(|session| (peer_id.clone(), session))
            })
            .collect();

        let report = self.sampler.sample(&sessions).await;

        if let Some(summary) = report.summary {
            self.signaling.send_stats(summary).await;
        }
        for peer_id in report.stale {
            info!(peer = %peer_id, "evicting peer with dead transport");
            self.teardown(&peer_id, DisconnectReason::TransportFailed)
                .await;
        }

        self.retry_sweep().await;
    }

    /// Converts "arrived too early" buffering into eventual application:
    /// any buffered offer/answer whose peer is no longer guarded gets
    /// re-dispatched through the normal planning path.
    async fn retry_sweep(&mut self) {
        for peer_id in self.registry.peer_ids() {
            let pending_offer = self.registry.get_mut(&peer_id).and_then(|ctx| {
                if ctx.offer_guard.is_none() {
                    ctx.pending_offer.take()
                } else {
                    None
                }
            });
            if let Some(sdp) = pending_offer {
                self.handle_offer(peer_id.clone(), sdp).await;
            }

            let pending_answer = self.registry.get_mut(&peer_id).and_then(|ctx| {
                if ctx.answer_guard.is_none() {
                    ctx.pending_answer.take()
                } else {
                    None
                }
            });
            if let Some(sdp) = pending_answer {
                self.handle_answer(peer_id.clone(), sdp).await;
            }

            // A backlog can outlive an expired guard; drain it once the
            // remote description is in place.
            let can_flush = match self.registry.get_mut(&peer_id) {
                Some(ctx)
                    if ctx.offer_guard.is_none()
                        && ctx.answer_guard.is_none()
                        && !ctx.pending_candidates.is_empty() =>
                {
                    match &ctx.session {
                        Some(session) => session.has_remote_description().await,
                        None => false,
                    }
                }
                _ => false,
            };
            if can_flush {
                self.flush_pending_candidates(&peer_id).await;
            }
        }
    }

    /// Idempotent: a peer that is already gone is a no-op.
    async fn teardown(&mut self, peer_id: &PeerId, reason: DisconnectReason) {
        let Some(mut ctx) = self.registry.remove(peer_id) else {
            return;
        };
        debug!(peer = %peer_id, name = %ctx.profile.display_name, ?reason, "tearing down peer");
        ctx.clear_all_guards();
        ctx.clear_buffers();
        if let Some(session) = ctx.session.take() {
            tokio::spawn(async move { session.close().await });
        }
        self.sampler.forget(peer_id);
        self.events.participant_left(peer_id.clone(), reason).await;
    }

    async fn leave(&mut self) {
        info!(peer = %self.local_peer_id, "leaving meeting, tearing down all peers");
        for mut ctx in self.registry.drain() {
            ctx.clear_all_guards();
            ctx.clear_buffers();
            if let Some(session) = ctx.session.take() {
                tokio::spawn(async move { session.close().await });
            }
            self.sampler.forget(&ctx.peer_id);
            self.events
                .participant_left(ctx.peer_id.clone(), DisconnectReason::Left)
                .await;
        }
    }

    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn spawn_guard_timer(
        &self,
        peer_id: PeerId,
        kind: GuardKind,
        seq: u64,
    ) -> tokio::task::JoinHandle<()> {
        let event_tx = self.event_tx.clone();
        let timeout = self.config.guard_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = event_tx
                .send(MeetingEvent::GuardExpired { peer_id, kind, seq })
                .await;
        })
    }
}
