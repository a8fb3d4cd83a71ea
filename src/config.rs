//! Tunable thresholds for the analyses, loaded from an optional TOML file.
//!
//! Every field has a default, so an empty file (or no file at all) yields
//! the stock behaviour:
//!
//! ```toml
//! [silence]
//! window_days = 7
//! warning_after_days = 7
//! critical_after_days = 14
//!
//! [revision]
//! top_n = 5
//! confusion_weight = 0.7
//! volume_weight = 0.3
//!
//! [topics]
//! window_days = 7
//! tolerance_pct = 5.0
//!
//! [tips]
//! recent_count = 5
//! ```

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::{InsightError, Result};

/// Longest window or threshold, in days, the analyses accept.
pub const MAX_WINDOW_DAYS: i64 = 3650;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct InsightsConfig {
    pub silence: SilenceThresholds,
    pub revision: RevisionSettings,
    pub topics: TopicTrendSettings,
    pub tips: TipSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct SilenceThresholds {
    /// Trailing window in which any feedback counts as activity.
    pub window_days: i64,
    pub warning_after_days: i64,
    pub critical_after_days: i64,
}

impl Default for SilenceThresholds {
    fn default() -> Self {
        Self {
            window_days: 7,
            warning_after_days: 7,
            critical_after_days: 14,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct RevisionSettings {
    pub top_n: usize,
    pub confusion_weight: f64,
    pub volume_weight: f64,
}

impl Default for RevisionSettings {
    fn default() -> Self {
        Self {
            top_n: 5,
            confusion_weight: 0.7,
            volume_weight: 0.3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct TopicTrendSettings {
    pub window_days: i64,
    /// Clarity change in percentage points treated as noise.
    pub tolerance_pct: f64,
}

impl Default for TopicTrendSettings {
    fn default() -> Self {
        Self {
            window_days: 7,
            tolerance_pct: 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct TipSettings {
    pub recent_count: usize,
}

impl Default for TipSettings {
    fn default() -> Self {
        Self { recent_count: 5 }
    }
}

impl InsightsConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                debug!(path = %path.display(), "loading insights config");
                let raw = std::fs::read_to_string(path)?;
                Self::from_toml(&raw)?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn validate(&self) -> Result<()> {
        let silence = &self.silence;
        if !(1..=MAX_WINDOW_DAYS).contains(&silence.window_days) {
            return Err(InsightError::InvalidConfig(format!(
                "silence.window_days must be between 1 and {MAX_WINDOW_DAYS}"
            )));
        }
        if silence.critical_after_days > MAX_WINDOW_DAYS {
            return Err(InsightError::InvalidConfig(format!(
                "silence.critical_after_days must be at most {MAX_WINDOW_DAYS}"
            )));
        }
        if silence.warning_after_days < 0 || silence.critical_after_days <= silence.warning_after_days {
            return Err(InsightError::InvalidConfig(
                "silence.critical_after_days must exceed silence.warning_after_days".to_string(),
            ));
        }

        let revision = &self.revision;
        if revision.top_n == 0 {
            return Err(InsightError::InvalidConfig(
                "revision.top_n must be at least 1".to_string(),
            ));
        }
        if revision.confusion_weight < 0.0 || revision.volume_weight < 0.0 {
            return Err(InsightError::InvalidConfig(
                "revision weights must not be negative".to_string(),
            ));
        }

        if !(1..=MAX_WINDOW_DAYS).contains(&self.topics.window_days) {
            return Err(InsightError::InvalidConfig(format!(
                "topics.window_days must be between 1 and {MAX_WINDOW_DAYS}"
            )));
        }
        if self.topics.tolerance_pct < 0.0 {
            return Err(InsightError::InvalidConfig(
                "topics.tolerance_pct must not be negative".to_string(),
            ));
        }

        if self.tips.recent_count == 0 {
            return Err(InsightError::InvalidConfig(
                "tips.recent_count must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
