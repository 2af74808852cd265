//! Error Types
//!
//! Gameplay never fails a tick: absence is an `Option` or a no-op. The
//! errors here cover loading settings, validating weapon definitions and
//! encoding broadcast payloads.

use std::path::PathBuf;

/// Settings loading and validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Settings file could not be read.
    #[error("Failed to read settings {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Settings JSON is malformed.
    #[error("Invalid settings JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// A setting is out of its allowed range.
    #[error("Invalid setting {field}: {reason}")]
    InvalidValue {
        /// Dotted path of the offending setting
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },

    /// A weapon definition is invalid.
    #[error("Invalid weapon definition: {0}")]
    Weapon(#[from] WeaponConfigError),
}

/// Weapon definition errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WeaponConfigError {
    /// Cooldown must be a finite, non-negative duration.
    #[error("Cooldown {0} ms is not a valid duration")]
    InvalidCooldown(f32),

    /// Travel speed must be finite and non-negative.
    #[error("Travel speed {0} is not valid")]
    InvalidTravelSpeed(f32),

    /// Cast distance must be positive.
    #[error("Cast distance {0} must be positive")]
    InvalidCastDistance(f32),

    /// A travelling shot could never reach its cast distance.
    #[error("Shot needs {needed:.1}s to reach its range, limit is {limit:.1}s")]
    RangeExceedsLifetime {
        /// Seconds needed to travel the cast distance
        needed: f32,
        /// Maximum shot lifetime
        limit: f32,
    },

    /// Weapon type has no implementation.
    #[error("Weapon type None cannot be instantiated")]
    NoWeaponType,
}

/// Encoding errors for replicated payloads.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// Binary encoding failed.
    #[error("Failed to encode payload: {0}")]
    Bincode(#[from] bincode::Error),
}
