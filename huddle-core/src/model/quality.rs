use serde::{Deserialize, Serialize};

/// Coarse link quality derived from the sampled round-trip time.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionQuality {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl ConnectionQuality {
    /// `None` means no candidate pair has been nominated yet, which is
    /// normal right after connecting, so it is reported as `Excellent`
    /// rather than penalizing a link we have not measured.
    pub fn from_rtt_ms(rtt_ms: Option<f64>) -> Self {
        match rtt_ms {
            None => Self::Excellent,
            Some(rtt) if rtt < 50.0 => Self::Excellent,
            Some(rtt) if rtt < 100.0 => Self::Good,
            Some(rtt) if rtt < 200.0 => Self::Fair,
            Some(_) => Self::Poor,
        }
    }
}

/// One sampler period's aggregate across all live peer transports.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StatsSummary {
    pub quality: ConnectionQuality,
    /// Mean round-trip time across peers with a measurement, in milliseconds.
    pub rtt_ms: Option<f64>,
    /// Video bytes sent since the previous sample, summed over peers.
    pub video_bytes_sent: u64,
    /// Video bytes received since the previous sample, summed over peers.
    pub video_bytes_received: u64,
}
