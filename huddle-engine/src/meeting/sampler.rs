use crate::session::{PeerSession, TransportHealth};
use huddle_core::{ConnectionQuality, PeerId, StatsSummary};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default, Clone, Copy)]
struct TrafficBaseline {
    sent: u64,
    received: u64,
}

pub(crate) struct SampleReport {
    /// `None` when no peer produced a round-trip measurement this tick.
    pub summary: Option<StatsSummary>,
    /// Peers whose transport is beyond recovery and must be torn down.
    pub stale: Vec<PeerId>,
}

/// Polls every live session on a fixed period, turns cumulative byte
/// counters into per-period deltas, and flags dead transports.
#[derive(Default)]
pub(crate) struct QualitySampler {
    baselines: HashMap<PeerId, TrafficBaseline>,
}

impl QualitySampler {
    pub async fn sample(&mut self, sessions: &[(PeerId, Arc<dyn PeerSession>)]) -> SampleReport {
        let mut rtts = Vec::new();
        let mut sent_delta = 0u64;
        let mut received_delta = 0u64;
        let mut stale = Vec::new();

        for (peer_id, session) in sessions {
            match session.transport_health() {
                TransportHealth::Failed | TransportHealth::Disconnected => {
                    stale.push(peer_id.clone());
                    continue;
                }
                _ => {}
            }

            let stats = session.stats().await;
            if let Some(rtt) = stats.rtt_ms {
                rtts.push(rtt);
            }

            let baseline = self.baselines.entry(peer_id.clone()).or_default();
            // Counters are cumulative; a restarted session can go backwards.
            sent_delta += stats.video_bytes_sent.saturating_sub(baseline.sent);
            received_delta += stats
                .video_bytes_received
                .saturating_sub(baseline.received);
            *baseline = TrafficBaseline {
                sent: stats.video_bytes_sent,
                received: stats.video_bytes_received,
            };
        }

        let summary = if rtts.is_empty() {
            None
        } else {
            let mean = rtts.iter().sum::<f64>() / rtts.len() as f64;
            Some(StatsSummary {
                quality: ConnectionQuality::from_rtt_ms(Some(mean)),
                rtt_ms: Some(mean),
                video_bytes_sent: sent_delta,
                video_bytes_received: received_delta,
            })
        };

        SampleReport { summary, stale }
    }

    pub fn forget(&mut self, peer_id: &PeerId) {
        self.baselines.remove(peer_id);
    }
}
