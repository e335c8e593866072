use crate::rate::DataRate;
use crate::time::SimTime;
use serde::{Deserialize, Serialize};

/// Parameters of the two-node point-to-point scenario.
///
/// Defaults describe the lab setup: a 1 Mbps / 10 ms link with a
/// 19-packet drop-tail queue and a 5e-5 receive error rate, one rate-paced
/// TCP flow and five staggered CBR flows, all stopped at 1.8 s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub link_rate: DataRate,
    pub link_delay_ms: u64,
    pub queue_limit_pkts: usize,
    pub error_rate: f64,
    pub seed: u64,
    pub stop_secs: f64,

    pub tcp_port: u16,
    pub tcp_packet_size: u32,
    pub tcp_packet_count: u32,
    pub tcp_rate: DataRate,

    pub cbr_base_port: u16,
    pub cbr_packet_size: u32,
    pub cbr_rate: DataRate,
    pub cbr_start_secs: Vec<f64>,
    pub cbr_stop_secs: Vec<f64>,

    /// First aggregate-throughput sample after this offset, then one
    /// sample per period. The fine-grained 100 µs default is a tuning
    /// artifact, hence a knob rather than a constant.
    pub sample_offset_us: u64,
    pub sample_period_us: u64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            link_rate: DataRate::from_bps(1_000_000),
            link_delay_ms: 10,
            queue_limit_pkts: 19,
            error_rate: 0.00005,
            seed: 0,
            stop_secs: 1.8,
            tcp_port: 8080,
            tcp_packet_size: 512,
            tcp_packet_count: 1000,
            tcp_rate: DataRate::from_bps(1_000_000),
            cbr_base_port: 12345,
            cbr_packet_size: 1024,
            cbr_rate: DataRate::from_bps(300_000),
            cbr_start_secs: vec![0.2, 0.4, 0.6, 0.8, 1.0],
            cbr_stop_secs: vec![1.8, 1.8, 1.2, 1.4, 1.6],
            sample_offset_us: 10,
            sample_period_us: 100,
        }
    }
}

impl ScenarioConfig {
    pub fn stop_time(&self) -> SimTime {
        SimTime::from_secs_f64(self.stop_secs)
    }

    pub fn link_delay(&self) -> SimTime {
        SimTime::from_millis(self.link_delay_ms)
    }

    pub fn sample_offset(&self) -> SimTime {
        SimTime::from_micros(self.sample_offset_us)
    }

    pub fn sample_period(&self) -> SimTime {
        SimTime::from_micros(self.sample_period_us)
    }

    /// CBR flow windows as (start, stop) pairs, one per flow.
    pub fn cbr_windows(&self) -> impl Iterator<Item = (SimTime, SimTime)> + '_ {
        self.cbr_start_secs
            .iter()
            .zip(&self.cbr_stop_secs)
            .map(|(&start, &stop)| (SimTime::from_secs_f64(start), SimTime::from_secs_f64(stop)))
    }
}

/// Partial configuration overlaid on a base config, loaded from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScenarioOverride {
    pub link_rate: Option<DataRate>,
    pub link_delay_ms: Option<u64>,
    pub queue_limit_pkts: Option<usize>,
    pub error_rate: Option<f64>,
    pub seed: Option<u64>,
    pub stop_secs: Option<f64>,
    pub tcp_port: Option<u16>,
    pub tcp_packet_size: Option<u32>,
    pub tcp_packet_count: Option<u32>,
    pub tcp_rate: Option<DataRate>,
    pub cbr_base_port: Option<u16>,
    pub cbr_packet_size: Option<u32>,
    pub cbr_rate: Option<DataRate>,
    pub cbr_start_secs: Option<Vec<f64>>,
    pub cbr_stop_secs: Option<Vec<f64>>,
    pub sample_offset_us: Option<u64>,
    pub sample_period_us: Option<u64>,
}

impl ScenarioOverride {
    pub fn apply_to(&self, config: &mut ScenarioConfig) {
        if let Some(v) = self.link_rate {
            config.link_rate = v;
        }
        if let Some(v) = self.link_delay_ms {
            config.link_delay_ms = v;
        }
        if let Some(v) = self.queue_limit_pkts {
            config.queue_limit_pkts = v;
        }
        if let Some(v) = self.error_rate {
            config.error_rate = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if let Some(v) = self.stop_secs {
            config.stop_secs = v;
        }
        if let Some(v) = self.tcp_port {
            config.tcp_port = v;
        }
        if let Some(v) = self.tcp_packet_size {
            config.tcp_packet_size = v;
        }
        if let Some(v) = self.tcp_packet_count {
            config.tcp_packet_count = v;
        }
        if let Some(v) = self.tcp_rate {
            config.tcp_rate = v;
        }
        if let Some(v) = self.cbr_base_port {
            config.cbr_base_port = v;
        }
        if let Some(v) = self.cbr_packet_size {
            config.cbr_packet_size = v;
        }
        if let Some(v) = self.cbr_rate {
            config.cbr_rate = v;
        }
        if let Some(v) = &self.cbr_start_secs {
            config.cbr_start_secs = v.clone();
        }
        if let Some(v) = &self.cbr_stop_secs {
            config.cbr_stop_secs = v.clone();
        }
        if let Some(v) = self.sample_offset_us {
            config.sample_offset_us = v;
        }
        if let Some(v) = self.sample_period_us {
            config.sample_period_us = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ScenarioConfig, ScenarioOverride};
    use crate::rate::DataRate;
    use crate::time::SimTime;

    #[test]
    fn default_matches_reference_setup() {
        let config = ScenarioConfig::default();
        assert_eq!(config.link_rate, DataRate::from_bps(1_000_000));
        assert_eq!(config.queue_limit_pkts, 19);
        assert_eq!(config.stop_time(), SimTime::from_millis(1800));
        assert_eq!(config.cbr_windows().count(), 5);
    }

    #[test]
    fn override_applies_only_present_fields() {
        let mut config = ScenarioConfig::default();
        let over = ScenarioOverride {
            stop_secs: Some(0.5),
            tcp_packet_count: Some(5),
            ..Default::default()
        };
        over.apply_to(&mut config);
        assert_eq!(config.stop_secs, 0.5);
        assert_eq!(config.tcp_packet_count, 5);
        assert_eq!(config.tcp_packet_size, 512);
    }
}
