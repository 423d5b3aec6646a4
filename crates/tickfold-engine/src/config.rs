//! Consolidator configuration

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::period::BarPeriod;

/// Construction options for a consolidator.
///
/// At least one of `period_ms` and `max_count` must be set; both set selects
/// mixed mode. `period_ms = Some(0)` is the degenerate window that closes
/// every sample as its own bar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidatorConfig {
    /// Window length in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_ms: Option<i64>,

    /// Samples per window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_count: Option<u32>,
}

impl ConsolidatorConfig {
    /// Time-only windows of `period_ms` milliseconds.
    pub fn period(period_ms: i64) -> Self {
        Self {
            period_ms: Some(period_ms),
            max_count: None,
        }
    }

    /// Count-only windows of `max_count` samples.
    pub fn count(max_count: u32) -> Self {
        Self {
            period_ms: None,
            max_count: Some(max_count),
        }
    }

    /// Mixed windows: whichever trigger is met first closes the window.
    pub fn mixed(period_ms: i64, max_count: u32) -> Self {
        Self {
            period_ms: Some(period_ms),
            max_count: Some(max_count),
        }
    }

    /// Validate and select the window policy. Fails fast on a config that
    /// could never emit.
    pub fn build(&self) -> Result<BarPeriod, ConfigError> {
        if let Some(period_ms) = self.period_ms {
            if period_ms < 0 {
                return Err(ConfigError::InvalidPeriod { period_ms });
            }
        }
        match (self.period_ms, self.max_count) {
            (None, None) => Err(ConfigError::MissingTrigger),
            (_, Some(0)) => Err(ConfigError::InvalidMaxCount { max_count: 0 }),
            (None, Some(max_count)) => Ok(BarPeriod::Count { max_count }),
            (Some(period_ms), None) => Ok(BarPeriod::Time { period_ms }),
            (Some(period_ms), Some(max_count)) => Ok(BarPeriod::Mixed {
                period_ms,
                max_count,
            }),
        }
    }
}

/// Consolidator configuration errors, surfaced at construction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("consolidator needs a period, a max count, or both")]
    MissingTrigger,

    #[error("max_count must be positive, got {max_count}")]
    InvalidMaxCount { max_count: u32 },

    #[error("period must be non-negative, got {period_ms} ms")]
    InvalidPeriod { period_ms: i64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_selects_mode() {
        assert_eq!(
            ConsolidatorConfig::period(60_000).build().unwrap(),
            BarPeriod::Time { period_ms: 60_000 }
        );
        assert_eq!(
            ConsolidatorConfig::count(5).build().unwrap(),
            BarPeriod::Count { max_count: 5 }
        );
        assert_eq!(
            ConsolidatorConfig::mixed(60_000, 5).build().unwrap(),
            BarPeriod::Mixed {
                period_ms: 60_000,
                max_count: 5
            }
        );
    }

    #[test]
    fn test_build_rejects_empty_config() {
        assert_eq!(
            ConsolidatorConfig::default().build(),
            Err(ConfigError::MissingTrigger)
        );
    }

    #[test]
    fn test_build_rejects_zero_count() {
        assert_eq!(
            ConsolidatorConfig::count(0).build(),
            Err(ConfigError::InvalidMaxCount { max_count: 0 })
        );
    }

    #[test]
    fn test_build_rejects_negative_period() {
        assert_eq!(
            ConsolidatorConfig::period(-1).build(),
            Err(ConfigError::InvalidPeriod { period_ms: -1 })
        );
    }

    #[test]
    fn test_zero_period_is_allowed() {
        assert_eq!(
            ConsolidatorConfig::period(0).build().unwrap(),
            BarPeriod::Time { period_ms: 0 }
        );
    }

    #[test]
    fn test_serde_roundtrip_skips_unset_fields() {
        let config = ConsolidatorConfig::count(3);
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(json, r#"{"max_count":3}"#);
        let back: ConsolidatorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
