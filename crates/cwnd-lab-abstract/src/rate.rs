use crate::error::ParseError;
use crate::time::SimTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A data rate in bits per second.
///
/// Parses the `"1Mbps"` / `"300Kbps"` / `"100bps"` syntax the scenario
/// configuration uses for link and flow rates.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct DataRate(u64);

impl DataRate {
    pub const fn from_bps(bps: u64) -> Self {
        DataRate(bps)
    }

    pub const fn bits_per_sec(self) -> u64 {
        self.0
    }

    /// Time to put `bytes` on the wire at this rate.
    ///
    /// Exact integer arithmetic: 512 bytes at 1 Mbps is precisely
    /// 4 096 000 ns, with no floating-point drift between sends.
    pub fn transmit_time(self, bytes: u32) -> SimTime {
        let bits = bytes as u128 * 8;
        SimTime::from_nanos((bits * 1_000_000_000 / self.0 as u128) as u64)
    }
}

impl FromStr for DataRate {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (digits, scale) = if let Some(v) = trimmed.strip_suffix("Gbps") {
            (v, 1_000_000_000)
        } else if let Some(v) = trimmed.strip_suffix("Mbps") {
            (v, 1_000_000)
        } else if let Some(v) = trimmed.strip_suffix("Kbps") {
            (v, 1_000)
        } else if let Some(v) = trimmed.strip_suffix("bps") {
            (v, 1)
        } else {
            return Err(ParseError::InvalidRate(s.to_string()));
        };
        let value: f64 = digits
            .trim()
            .parse()
            .map_err(|_| ParseError::InvalidRate(s.to_string()))?;
        if !value.is_finite() || value <= 0.0 {
            return Err(ParseError::InvalidRate(s.to_string()));
        }
        Ok(DataRate((value * scale as f64).round() as u64))
    }
}

impl TryFrom<String> for DataRate {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<DataRate> for String {
    fn from(rate: DataRate) -> String {
        rate.to_string()
    }
}

impl fmt::Display for DataRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bps = self.0;
        if bps >= 1_000_000_000 && bps % 1_000_000_000 == 0 {
            write!(f, "{}Gbps", bps / 1_000_000_000)
        } else if bps >= 1_000_000 && bps % 1_000_000 == 0 {
            write!(f, "{}Mbps", bps / 1_000_000)
        } else if bps >= 1_000 && bps % 1_000 == 0 {
            write!(f, "{}Kbps", bps / 1_000)
        } else {
            write!(f, "{bps}bps")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::DataRate;
    use crate::time::SimTime;

    #[test]
    fn parses_rate_suffixes() {
        assert_eq!("1Mbps".parse::<DataRate>().unwrap().bits_per_sec(), 1_000_000);
        assert_eq!("300Kbps".parse::<DataRate>().unwrap().bits_per_sec(), 300_000);
        assert_eq!("100bps".parse::<DataRate>().unwrap().bits_per_sec(), 100);
        assert_eq!("2Gbps".parse::<DataRate>().unwrap().bits_per_sec(), 2_000_000_000);
        assert_eq!("1.5Mbps".parse::<DataRate>().unwrap().bits_per_sec(), 1_500_000);
    }

    #[test]
    fn rejects_malformed_rates() {
        assert!("".parse::<DataRate>().is_err());
        assert!("fast".parse::<DataRate>().is_err());
        assert!("10".parse::<DataRate>().is_err());
        assert!("-1Mbps".parse::<DataRate>().is_err());
    }

    #[test]
    fn transmit_time_is_exact() {
        let mbps = DataRate::from_bps(1_000_000);
        assert_eq!(mbps.transmit_time(512), SimTime::from_nanos(4_096_000));

        let slow = DataRate::from_bps(100);
        assert_eq!(slow.transmit_time(100), SimTime::from_secs(8));
    }

    #[test]
    fn round_trips_display() {
        for text in ["1Mbps", "300Kbps", "100bps", "2Gbps"] {
            let rate: DataRate = text.parse().unwrap();
            assert_eq!(rate.to_string(), text);
        }
    }
}
