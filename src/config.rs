//! Runtime configuration
//!
//! Settings come from an optional TOML file; every field has a default so an
//! empty file (or none at all) is valid. Command-line flags are applied on top
//! by the binary.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sources::Domain;

/// Longest accepted cache window, one year
pub const MAX_CACHE_MINUTES: u64 = 525_600;

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// All tunables of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Maximum age of a cache entry before a refetch is attempted
    pub cache_invalidation_minutes: u64,
    /// Always refetch and use a separate cache namespace
    pub debug: bool,
    /// Upper bound for a single upstream request
    pub request_timeout_seconds: u64,
    /// Overrides the platform cache directory
    pub cache_dir: Option<PathBuf>,
    pub tendency: TendencySettings,
    pub lag: LagSettings,
    pub partial_day_offset: PartialDayOffsets,
    pub sources: SourceUrls,
}

/// Thresholds of the tendency classification
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TendencySettings {
    /// Day-over-day incidence change still considered steady
    pub steady_range: f64,
    /// Week-over-week incidence change still considered steady
    pub long_term_steady_range: f64,
}

/// Reporting lag per source, in days added to the reported date
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LagSettings {
    pub case_days: i64,
    pub vaccination_days: i64,
    pub timeline_days: i64,
}

/// Leading series entries to skip because they cover an incomplete day
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialDayOffsets {
    pub global_cases: usize,
    pub timeline: usize,
    pub local_history: usize,
}

/// Upstream endpoints replacing the public APIs, e.g. a mirror
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceUrls {
    /// Latest vaccination document
    pub vaccination: Option<String>,
    /// Base of the per-country historical case endpoint
    pub global_cases: Option<String>,
    /// Base of the per-country timeline endpoint
    pub global_timeline: Option<String>,
    /// District boundaries layer queried by coordinate
    pub district_snapshot: Option<String>,
    /// Case report layer summed per district and day
    pub district_history: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_invalidation_minutes: 60,
            debug: false,
            request_timeout_seconds: 15,
            cache_dir: None,
            tendency: TendencySettings::default(),
            lag: LagSettings::default(),
            partial_day_offset: PartialDayOffsets::default(),
            sources: SourceUrls::default(),
        }
    }
}

impl Default for TendencySettings {
    fn default() -> Self {
        Self {
            steady_range: 5.0,
            long_term_steady_range: 10.0,
        }
    }
}

impl Default for LagSettings {
    fn default() -> Self {
        Self {
            case_days: 1,
            vaccination_days: 1,
            timeline_days: 0,
        }
    }
}

impl Default for PartialDayOffsets {
    fn default() -> Self {
        Self {
            global_cases: 0,
            timeline: 1,
            local_history: 0,
        }
    }
}

impl Settings {
    /// Reads and validates a TOML config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses and validates TOML settings
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reports every invalid field at once
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut issues: Vec<String> = Vec::new();

        if !(1..=MAX_CACHE_MINUTES).contains(&self.cache_invalidation_minutes) {
            issues.push(format!(
                "cache_invalidation_minutes must be between 1 and {MAX_CACHE_MINUTES}"
            ));
        }
        if self.request_timeout_seconds == 0 {
            issues.push("request_timeout_seconds must be > 0".into());
        }
        if !self.tendency.steady_range.is_finite() || self.tendency.steady_range < 0.0 {
            issues.push("tendency.steady_range must be a number >= 0".into());
        }
        if !self.tendency.long_term_steady_range.is_finite()
            || self.tendency.long_term_steady_range < 0.0
        {
            issues.push("tendency.long_term_steady_range must be a number >= 0".into());
        }
        for (name, days) in [
            ("lag.case_days", self.lag.case_days),
            ("lag.vaccination_days", self.lag.vaccination_days),
            ("lag.timeline_days", self.lag.timeline_days),
        ] {
            if !(0..=7).contains(&days) {
                issues.push(format!("{name} must be between 0 and 7"));
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(issues))
        }
    }

    /// Cache window, capped at [`MAX_CACHE_MINUTES`] for unvalidated settings
    pub fn cache_invalidation(&self) -> chrono::Duration {
        let capped = chrono::Duration::days(365);
        i64::try_from(self.cache_invalidation_minutes.min(MAX_CACHE_MINUTES))
            .ok()
            .and_then(chrono::Duration::try_minutes)
            .unwrap_or(capped)
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_seconds)
    }

    /// Days between the date a source reports and the date it is current as of
    pub fn lag_days(&self, domain: Domain) -> i64 {
        match domain {
            Domain::Vaccination => self.lag.vaccination_days,
            Domain::GlobalTimeline => self.lag.timeline_days,
            Domain::GlobalCases | Domain::LocalSnapshot | Domain::LocalHistory => {
                self.lag.case_days
            }
        }
    }

    /// Index correction applied before slicing a case series
    pub fn partial_day_offset(&self, domain: Domain) -> usize {
        match domain {
            Domain::GlobalCases => self.partial_day_offset.global_cases,
            Domain::GlobalTimeline => self.partial_day_offset.timeline,
            Domain::LocalHistory => self.partial_day_offset.local_history,
            Domain::Vaccination | Domain::LocalSnapshot => 0,
        }
    }
}
