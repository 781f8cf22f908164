use crate::session::peer_session::{
    LocalMedia, PeerSession, RemoteMedia, SessionError, SessionEvent, SessionFactory, SessionStats,
    SignalingPhase, TransportHealth,
};
use crate::session::session_config::SessionConfig;
use async_trait::async_trait;
use huddle_core::{MediaKind, PeerId};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::signaling_state::RTCSignalingState;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::stats::StatsReportType;
use webrtc::track::track_remote::TrackRemote;

/// [`PeerSession`] backed by a real `RTCPeerConnection`.
pub struct WebRtcSession {
    peer_id: PeerId,
    peer_connection: Arc<RTCPeerConnection>,
    video_sender: Mutex<Option<Arc<RTCRtpSender>>>,
}

impl WebRtcSession {
    pub async fn new(
        peer_id: PeerId,
        config: &SessionConfig,
        media: &LocalMedia,
        event_tx: mpsc::Sender<SessionEvent>,
    ) -> Result<Self, SessionError> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: config
                .ice_servers
                .iter()
                .map(|s| RTCIceServer {
                    urls: s.urls.clone(),
                    username: s.username.clone().unwrap_or_default(),
                    credential: s.credential.clone().unwrap_or_default(),
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await?);

        // Trickle ICE: locally gathered candidates flow back to the
        // meeting loop, which relays them over signaling.
        let ice_tx = event_tx.clone();
        let uid_ice = peer_id.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();
            let uid = uid_ice.clone();

            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(json_candidate) = candidate.to_json() else {
                    return;
                };
                let Ok(str_candidate) = serde_json::to_string(&json_candidate) else {
                    return;
                };
                let _ = tx
                    .send(SessionEvent::CandidateGenerated(uid, str_candidate))
                    .await;
            })
        }));

        let track_tx = event_tx.clone();
        let uid_track = peer_id.clone();
        peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>, _receiver: Arc<RTCRtpReceiver>, _transceiver: Arc<RTCRtpTransceiver>| {
                let tx = track_tx.clone();
                let uid = uid_track.clone();

                Box::pin(async move {
                    let kind = match track.kind() {
                        RTPCodecType::Audio => MediaKind::Audio,
                        RTPCodecType::Video => MediaKind::Video,
                        RTPCodecType::Unspecified => {
                            warn!("ignoring track with unspecified codec type from {}", uid);
                            return;
                        }
                    };
                    debug!("remote {:?} track arrived from {}", kind, uid);
                    let _ = tx
                        .send(SessionEvent::RemoteMedia(
                            uid,
                            RemoteMedia {
                                kind,
                                track: Some(track),
                            },
                        ))
                        .await;
                })
            },
        ));

        let mut video_sender = None;
        if let Some(audio) = &media.audio {
            peer_connection.add_track(Arc::clone(audio)).await?;
        }
        if let Some(video) = &media.video {
            video_sender = Some(peer_connection.add_track(Arc::clone(video)).await?);
        }

        Ok(Self {
            peer_id,
            peer_connection,
            video_sender: Mutex::new(video_sender),
        })
    }

    fn guard_phase(&self, allowed: &[SignalingPhase]) -> Result<(), SessionError> {
        let phase = self.signaling_phase();
        if allowed.contains(&phase) {
            Ok(())
        } else {
            Err(SessionError::InvalidState { phase })
        }
    }
}

#[async_trait]
impl PeerSession for WebRtcSession {
    async fn create_offer(&self) -> Result<String, SessionError> {
        self.guard_phase(&[SignalingPhase::Stable])?;
        let offer = self.peer_connection.create_offer(None).await?;
        self.peer_connection
            .set_local_description(offer.clone())
            .await?;
        Ok(offer.sdp)
    }

    async fn accept_remote_offer(&self, sdp: &str) -> Result<(), SessionError> {
        self.guard_phase(&[SignalingPhase::Stable, SignalingPhase::HaveRemoteOffer])?;
        let desc = RTCSessionDescription::offer(sdp.to_string())?;
        self.peer_connection.set_remote_description(desc).await?;
        Ok(())
    }

    async fn create_answer(&self) -> Result<String, SessionError> {
        self.guard_phase(&[SignalingPhase::HaveRemoteOffer])?;
        let answer = self.peer_connection.create_answer(None).await?;
        self.peer_connection
            .set_local_description(answer.clone())
            .await?;
        Ok(answer.sdp)
    }

    async fn accept_remote_answer(&self, sdp: &str) -> Result<(), SessionError> {
        self.guard_phase(&[SignalingPhase::HaveLocalOffer])?;
        let desc = RTCSessionDescription::answer(sdp.to_string())?;
        self.peer_connection.set_remote_description(desc).await?;
        Ok(())
    }

    async fn add_remote_candidate(&self, candidate: &str) -> Result<(), SessionError> {
        let init: RTCIceCandidateInit = serde_json::from_str(candidate)?;
        self.peer_connection.add_ice_candidate(init).await?;
        Ok(())
    }

    async fn has_remote_description(&self) -> bool {
        self.peer_connection.remote_description().await.is_some()
    }

    fn signaling_phase(&self) -> SignalingPhase {
        match self.peer_connection.signaling_state() {
            RTCSignalingState::Stable | RTCSignalingState::Unspecified => SignalingPhase::Stable,
            RTCSignalingState::HaveLocalOffer | RTCSignalingState::HaveRemotePranswer => {
                SignalingPhase::HaveLocalOffer
            }
            RTCSignalingState::HaveRemoteOffer | RTCSignalingState::HaveLocalPranswer => {
                SignalingPhase::HaveRemoteOffer
            }
            RTCSignalingState::Closed => SignalingPhase::Closed,
        }
    }

    fn transport_health(&self) -> TransportHealth {
        match self.peer_connection.connection_state() {
            RTCPeerConnectionState::New
            | RTCPeerConnectionState::Connecting
            | RTCPeerConnectionState::Unspecified => TransportHealth::Connecting,
            RTCPeerConnectionState::Connected => TransportHealth::Connected,
            RTCPeerConnectionState::Disconnected => TransportHealth::Disconnected,
            RTCPeerConnectionState::Failed => TransportHealth::Failed,
            RTCPeerConnectionState::Closed => TransportHealth::Closed,
        }
    }

    async fn stats(&self) -> SessionStats {
        let report = self.peer_connection.get_stats().await;
        let mut stats = SessionStats::default();

        for entry in report.reports.values() {
            match entry {
                StatsReportType::CandidatePair(pair) if pair.nominated => {
                    let rtt = pair.current_round_trip_time * 1000.0;
                    if rtt > 0.0 {
                        stats.rtt_ms = Some(match stats.rtt_ms {
                            Some(prev) => prev.max(rtt),
                            None => rtt,
                        });
                    }
                }
                StatsReportType::OutboundRTP(out) if out.kind == "video" => {
                    stats.video_bytes_sent += out.bytes_sent;
                }
                StatsReportType::InboundRTP(inb) if inb.kind == "video" => {
                    stats.video_bytes_received += inb.bytes_received;
                }
                _ => {}
            }
        }

        stats
    }

    async fn replace_video_track(&self, media: &LocalMedia) -> Result<(), SessionError> {
        let mut sender = self.video_sender.lock().await;
        match (&*sender, &media.video) {
            (Some(s), _) => {
                s.replace_track(media.video.clone()).await?;
            }
            (None, Some(video)) => {
                // No video negotiated when the session was created; the
                // added track takes effect after the next renegotiation.
                *sender = Some(self.peer_connection.add_track(Arc::clone(video)).await?);
            }
            (None, None) => {}
        }
        Ok(())
    }

    async fn close(&self) {
        if let Err(err) = self.peer_connection.close().await {
            debug!("closing transport for {}: {}", self.peer_id, err);
        }
    }
}

/// Builds [`WebRtcSession`]s from one shared transport configuration.
pub struct WebRtcSessionFactory {
    config: SessionConfig,
}

impl WebRtcSessionFactory {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionFactory for WebRtcSessionFactory {
    async fn create_session(
        &self,
        peer_id: PeerId,
        media: &LocalMedia,
        events: mpsc::Sender<SessionEvent>,
    ) -> Result<Arc<dyn PeerSession>, SessionError> {
        let session = WebRtcSession::new(peer_id, &self.config, media, events).await?;
        Ok(Arc::new(session))
    }
}
