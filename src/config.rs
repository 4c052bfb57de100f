//! # Pool Configuration
//!
//! This module defines [`PoolConfig`], the settings a [`Pool`] is built from,
//! and the logic for reading it from a `checkout-pool.yaml` file.
//!
//! ## Format
//!
//! Every field is optional; missing fields take the values in
//! [`defaults`](crate::defaults).
//!
//! ```yaml
//! base_dir: /var/cache/checkouts
//! max_checkouts: 8
//! grace_period: 45s
//! purge_on_start: true
//! git:
//!   program: /usr/bin/git
//!   depth: 1
//! ```
//!
//! Durations are a number followed by a unit: `s`, `m`, `h`, `d` or `w`
//! (e.g. `30s`, `5m`, `1.5h`).
//!
//! [`Pool`]: crate::pool::Pool

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::defaults;
use crate::error::{Error, Result};

/// Settings for a checkout pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    /// Directory holding one subdirectory per checkout.
    pub base_dir: PathBuf,
    /// Upper bound on checkouts present on disk at once.
    pub max_checkouts: usize,
    /// How long a released checkout is kept for reuse before removal.
    #[serde(
        serialize_with = "serialize_duration",
        deserialize_with = "deserialize_duration"
    )]
    pub grace_period: Duration,
    /// Remove leftover checkout directories when the pool starts.
    pub purge_on_start: bool,
    /// Settings for the git checkout backend.
    pub git: GitConfig,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            base_dir: defaults::default_base_dir(),
            max_checkouts: defaults::DEFAULT_MAX_CHECKOUTS,
            grace_period: defaults::DEFAULT_GRACE_PERIOD,
            purge_on_start: false,
            git: GitConfig::default(),
        }
    }
}

/// Git backend configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GitConfig {
    /// The git executable to run.
    pub program: String,
    /// History depth to fetch; 0 fetches everything.
    pub depth: u32,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            program: defaults::DEFAULT_GIT_PROGRAM.to_string(),
            depth: defaults::DEFAULT_GIT_DEPTH,
        }
    }
}

impl PoolConfig {
    /// A default configuration rooted at `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_max_checkouts(mut self, max_checkouts: usize) -> Self {
        self.max_checkouts = max_checkouts;
        self
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn with_purge_on_start(mut self, purge: bool) -> Self {
        self.purge_on_start = purge;
        self
    }

    /// Rejects settings the pool cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_checkouts == 0 {
            return Err(Error::ConfigParse {
                message: "max_checkouts must be at least 1".to_string(),
                hint: Some("Set max_checkouts: 1 or higher".to_string()),
            });
        }
        if self.git.program.trim().is_empty() {
            return Err(Error::ConfigParse {
                message: "git.program must not be empty".to_string(),
                hint: Some("Remove git.program to use 'git' from PATH".to_string()),
            });
        }
        Ok(())
    }
}

/// Parse a configuration from YAML text.
pub fn parse(yaml_content: &str) -> Result<PoolConfig> {
    // An empty file (or one holding only comments) means "all defaults".
    let config = if yaml_content.trim().is_empty()
        || yaml_content
            .lines()
            .all(|l| l.trim().is_empty() || l.trim_start().starts_with('#'))
    {
        PoolConfig::default()
    } else {
        serde_yaml::from_str(yaml_content).map_err(|e| Error::ConfigParse {
            message: e.to_string(),
            hint: None,
        })?
    };
    config.validate()?;
    Ok(config)
}

/// Parse a configuration file.
pub fn from_file(path: &Path) -> Result<PoolConfig> {
    let content = fs::read_to_string(path)?;
    parse(&content)
}

/// Parse a duration string into a Duration
///
/// Format: number followed by unit (s, m, h, d, w)
/// Examples: "30s", "7d", "1h", "30m", "2w"
pub fn parse_duration(duration_str: &str) -> Result<Duration> {
    let input = duration_str;
    let duration_str = duration_str.trim().to_lowercase();
    let invalid = |message: String| Error::InvalidDuration {
        input: input.to_string(),
        message,
    };

    if duration_str.is_empty() {
        return Err(invalid("duration string cannot be empty".to_string()));
    }

    // Find the split point between number and unit
    let split_idx = duration_str
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit() && *c != '.')
        .map(|(i, _)| i)
        .unwrap_or(duration_str.len());

    if split_idx == 0 {
        return Err(invalid("duration must start with a number".to_string()));
    }

    let number_str = &duration_str[..split_idx];
    let unit_str = duration_str[split_idx..].trim();

    let number: f64 = number_str
        .parse()
        .map_err(|_| invalid(format!("invalid number '{}'", number_str)))?;

    let seconds = match unit_str {
        "s" | "sec" | "second" | "seconds" => number,
        "m" | "min" | "minute" | "minutes" => number * 60.0,
        "h" | "hr" | "hour" | "hours" => number * 3600.0,
        "d" | "day" | "days" => number * 86400.0,
        "w" | "week" | "weeks" => number * 604800.0,
        "" => return Err(invalid("missing unit (s, m, h, d, w)".to_string())),
        _ => {
            return Err(invalid(format!(
                "invalid unit '{}'. Valid units: s, m, h, d, w",
                unit_str
            )))
        }
    };

    Duration::try_from_secs_f64(seconds).map_err(|e| invalid(e.to_string()))
}

/// Formats a duration in the largest unit that divides it exactly.
pub fn format_duration(duration: &Duration) -> String {
    let millis = duration.as_millis();
    if millis % 1000 != 0 {
        return format!("{}s", duration.as_secs_f64());
    }
    let secs = duration.as_secs();
    for (unit, size) in [("w", 604800), ("d", 86400), ("h", 3600), ("m", 60)] {
        if secs >= size && secs % size == 0 {
            return format!("{}{}", secs / size, unit);
        }
    }
    format!("{}s", secs)
}

fn serialize_duration<S: Serializer>(
    duration: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_duration(duration))
}

fn deserialize_duration<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Duration, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_duration(&raw).map_err(serde::de::Error::custom)
}
