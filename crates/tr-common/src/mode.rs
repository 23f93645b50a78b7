//! Capture/replay mode.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Process-wide traffic mode. Record and replay are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Traffic passes through untouched.
    #[default]
    Off,
    /// Outbound and inbound calls are captured into sessions.
    Record,
    /// Outbound calls are served from stored sessions.
    Replay,
}

impl Mode {
    pub fn as_u8(self) -> u8 {
        match self {
            Mode::Off => 0,
            Mode::Record => 1,
            Mode::Replay => 2,
        }
    }

    /// Inverse of [`Mode::as_u8`]; unknown values map to `Off`.
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => Mode::Record,
            2 => Mode::Replay,
            _ => Mode::Off,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Off => write!(f, "off"),
            Mode::Record => write!(f, "record"),
            Mode::Replay => write!(f, "replay"),
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "" => Ok(Mode::Off),
            "record" => Ok(Mode::Record),
            "replay" => Ok(Mode::Replay),
            other => Err(format!("unknown mode {other:?} (expected off, record or replay)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u8_round_trip() {
        for mode in [Mode::Off, Mode::Record, Mode::Replay] {
            assert_eq!(Mode::from_u8(mode.as_u8()), mode);
        }
        assert_eq!(Mode::from_u8(200), Mode::Off);
    }

    #[test]
    fn test_from_str() {
        assert_eq!("Replay".parse::<Mode>().unwrap(), Mode::Replay);
        assert_eq!(" record ".parse::<Mode>().unwrap(), Mode::Record);
        assert!("capture".parse::<Mode>().is_err());
    }
}
