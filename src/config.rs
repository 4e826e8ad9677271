use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "TriageCore";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get the application data directory
/// ~/TriageCore/ on all platforms, falling back to the working directory
/// when no home directory can be determined.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// SQLite file backing the event store and task queue.
pub fn default_database_path() -> PathBuf {
    app_data_dir().join("triage.db")
}

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "info,triage_core=debug"
}

/// Longest query or decision window a policy may configure (ten years).
pub const MAX_WINDOW_HOURS: i64 = 24 * 365 * 10;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read policy file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid policy JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid policy: {0}")]
    Invalid(String),
}

// ═══════════════════════════════════════════
// Triage policy
// ═══════════════════════════════════════════

/// Thresholds and confidences used by the decision engine.
///
/// The defaults apply when a patient has no protocol for the complaint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriagePolicy {
    /// Severity at or above which the default policy routes red.
    pub default_red_threshold: i32,
    /// Severity at or above which the default policy routes yellow.
    pub default_yellow_threshold: i32,
    /// Rise from earliest to latest that counts as rapid progression.
    pub acceleration_margin: i32,
    /// Crossing from below to at-or-above this value counts as rapid progression.
    pub acceleration_boundary: i32,
    /// Default look-back for event queries.
    pub query_window_hours: i64,
    /// Look-back for the trend series fed to the engine.
    pub decision_window_hours: i64,
    pub confidence_protocol: f64,
    pub confidence_acceleration: f64,
    pub confidence_default: f64,
}

impl Default for TriagePolicy {
    fn default() -> Self {
        Self {
            default_red_threshold: 8,
            default_yellow_threshold: 4,
            acceleration_margin: 4,
            acceleration_boundary: 7,
            query_window_hours: 168,
            decision_window_hours: 72,
            confidence_protocol: 0.95,
            confidence_acceleration: 0.75,
            confidence_default: 0.5,
        }
    }
}

impl TriagePolicy {
    /// Load a policy from a JSON file. Missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let policy: Self = serde_json::from_str(&content)?;
        policy.validate()?;
        tracing::info!(path = %path.display(), "Loaded triage policy");
        Ok(policy)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let on_scale = |v: i32| (0..=10).contains(&v);
        if !on_scale(self.default_red_threshold) || !on_scale(self.default_yellow_threshold) {
            return Err(ConfigError::Invalid(
                "default thresholds must be within 0..=10".into(),
            ));
        }
        if self.default_yellow_threshold > self.default_red_threshold {
            return Err(ConfigError::Invalid(format!(
                "yellow threshold {} exceeds red threshold {}",
                self.default_yellow_threshold, self.default_red_threshold
            )));
        }
        if self.acceleration_margin < 0 || !on_scale(self.acceleration_boundary) {
            return Err(ConfigError::Invalid(
                "acceleration settings must lie on the 0..=10 scale".into(),
            ));
        }
        let window_ok = |h: i64| h > 0 && h <= MAX_WINDOW_HOURS;
        if !window_ok(self.query_window_hours) || !window_ok(self.decision_window_hours) {
            return Err(ConfigError::Invalid(format!(
                "windows must be within 1..={MAX_WINDOW_HOURS} hours"
            )));
        }
        for (name, value) in [
            ("confidence_protocol", self.confidence_protocol),
            ("confidence_acceleration", self.confidence_acceleration),
            ("confidence_default", self.confidence_default),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        Ok(())
    }
}
