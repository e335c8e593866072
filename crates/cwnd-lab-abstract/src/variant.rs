use crate::error::ParseError;
use std::fmt;
use std::str::FromStr;

/// The accepted congestion-control variant names.
///
/// The variant selects the trace-file prefix and the parameterization of
/// the simulator's window model. Anything outside this set is a
/// configuration error and terminates the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TcpVariant {
    NewReno,
    Hybla,
    Vegas,
    Scalable,
    Westwood,
}

/// Parameters the window model is instantiated with.
///
/// One AIMD skeleton serves every variant; the variants differ only in
/// these constants. `beta_pct` is the window fraction kept on loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowParams {
    pub mss: u32,
    pub initial_window_segs: u32,
    pub initial_ssthresh: u32,
    pub slow_start_gain: u32,
    pub beta_pct: u32,
}

impl TcpVariant {
    pub const ALL: [TcpVariant; 5] = [
        TcpVariant::NewReno,
        TcpVariant::Hybla,
        TcpVariant::Vegas,
        TcpVariant::Scalable,
        TcpVariant::Westwood,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TcpVariant::NewReno => "TcpNewReno",
            TcpVariant::Hybla => "TcpHybla",
            TcpVariant::Vegas => "TcpVegas",
            TcpVariant::Scalable => "TcpScalable",
            TcpVariant::Westwood => "TcpWestwood",
        }
    }

    pub fn window_params(self, mss: u32) -> WindowParams {
        let base = WindowParams {
            mss,
            initial_window_segs: 1,
            initial_ssthresh: 64 * 1024,
            slow_start_gain: 1,
            beta_pct: 50,
        };
        match self {
            TcpVariant::NewReno => base,
            // Hybla front-loads growth to compensate long round trips.
            TcpVariant::Hybla => WindowParams {
                initial_window_segs: 2,
                slow_start_gain: 2,
                ..base
            },
            // Vegas backs off more gently than loss-based variants.
            TcpVariant::Vegas => WindowParams {
                beta_pct: 75,
                ..base
            },
            TcpVariant::Scalable => WindowParams {
                beta_pct: 87,
                ..base
            },
            TcpVariant::Westwood => WindowParams {
                beta_pct: 70,
                ..base
            },
        }
    }
}

impl FromStr for TcpVariant {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TcpNewReno" => Ok(TcpVariant::NewReno),
            "TcpHybla" => Ok(TcpVariant::Hybla),
            "TcpVegas" => Ok(TcpVariant::Vegas),
            "TcpScalable" => Ok(TcpVariant::Scalable),
            "TcpWestwood" => Ok(TcpVariant::Westwood),
            other => Err(ParseError::UnknownVariant(other.to_string())),
        }
    }
}

impl fmt::Display for TcpVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
