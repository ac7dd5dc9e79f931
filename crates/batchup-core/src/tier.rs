//! Device tiers and their concurrency ceilings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Device or environment class, fixed for the lifetime of a batch.
///
/// Only used to pick the maximum concurrency window. Phones get the low and
/// mid tiers; desktops and servers are `High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceTier {
    #[serde(alias = "android")]
    Low,
    #[serde(alias = "ios")]
    Mid,
    #[default]
    #[serde(alias = "other")]
    High,
}

impl DeviceTier {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceTier::Low => "low",
            DeviceTier::Mid => "mid",
            DeviceTier::High => "high",
        }
    }
}

impl fmt::Display for DeviceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "android" => Ok(DeviceTier::Low),
            "mid" | "ios" => Ok(DeviceTier::Mid),
            "high" | "other" => Ok(DeviceTier::High),
            other => Err(format!("unknown device tier: {other} (expected low, mid or high)")),
        }
    }
}

/// Maximum concurrency window per tier (`[scheduler.tiers]` in config.toml).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierCeilings {
    pub low: usize,
    pub mid: usize,
    pub high: usize,
}

impl Default for TierCeilings {
    fn default() -> Self {
        Self {
            low: 3,
            mid: 5,
            high: 7,
        }
    }
}

impl TierCeilings {
    /// Ceiling for the given tier.
    pub fn ceiling(&self, tier: DeviceTier) -> usize {
        match tier {
            DeviceTier::Low => self.low,
            DeviceTier::Mid => self.mid,
            DeviceTier::High => self.high,
        }
    }

    /// Smallest configured ceiling (used by validation).
    pub(crate) fn smallest(&self) -> usize {
        self.low.min(self.mid).min(self.high)
    }
}
