//! # Expansion Settings
//!
//! Everything the expansion stages need to know besides the model itself.
//! A config is passed explicitly to each stage; there is no process-wide
//! state. All fields have defaults, so a JSON config file only needs the
//! values it changes.
//!
//! ## Example
//!
//! ```rust
//! use split_core::config::ExpandConfig;
//! use split_core::loads::Direction;
//!
//! let config: ExpandConfig = serde_json::from_str(r#"{ "drift_suffix": "_D" }"#).unwrap();
//! assert_eq!(config.drift_suffix, "_D");
//! assert_eq!(config.suffix(Direction::XDirPlusE), "EXP");
//! assert!(config.validate().is_ok());
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{ExpandError, ExpandResult};
use crate::loads::Direction;

/// What to do when an expansion produces a name that already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// The later definition replaces the earlier one
    #[default]
    LastWins,
    /// Abort with `ExpandError::NameCollision`
    Reject,
}

/// Settings for one expansion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpandConfig {
    /// Pattern-name suffix per direction flag
    pub direction_suffixes: BTreeMap<Direction, String>,

    /// Replace an existing pure-X pattern with the one split off a zip pattern
    pub replace_ex: bool,

    /// Replace an existing pure-Y pattern with the one split off a zip pattern
    pub replace_ey: bool,

    /// Prefix for patterns split off a drift pattern
    pub drift_prefix: String,

    /// Suffix for patterns split off a drift pattern
    pub drift_suffix: String,

    /// Upper bound on load combination expansion rounds
    pub max_rounds: usize,

    pub on_name_collision: CollisionPolicy,
}

impl Default for ExpandConfig {
    fn default() -> Self {
        ExpandConfig {
            direction_suffixes: Direction::ALL
                .iter()
                .map(|d| (*d, d.default_suffix().to_string()))
                .collect(),
            replace_ex: false,
            replace_ey: false,
            drift_prefix: String::new(),
            drift_suffix: "_DRIFT".to_string(),
            max_rounds: 16,
            on_name_collision: CollisionPolicy::LastWins,
        }
    }
}

impl ExpandConfig {
    /// Suffix for a direction, falling back to the built-in one
    pub fn suffix(&self, direction: Direction) -> &str {
        self.direction_suffixes
            .get(&direction)
            .map(String::as_str)
            .unwrap_or_else(|| direction.default_suffix())
    }

    /// Whether an existing canonical pattern for this direction gets replaced
    pub fn replaces(&self, direction: Direction) -> bool {
        match direction {
            Direction::XDir => self.replace_ex,
            Direction::YDir => self.replace_ey,
            _ => false,
        }
    }

    /// Name of the pattern split off a zip pattern for one direction
    pub fn split_name(&self, direction: Direction, drift: bool) -> String {
        if drift {
            format!("{}{}{}", self.drift_prefix, self.suffix(direction), self.drift_suffix)
        } else {
            self.suffix(direction).to_string()
        }
    }

    pub fn validate(&self) -> ExpandResult<()> {
        let mut seen = Vec::new();
        for direction in Direction::ALL {
            let suffix = self.suffix(direction);
            if suffix.trim().is_empty() {
                return Err(ExpandError::invalid_input(
                    format!("direction_suffixes.{}", direction.field()),
                    suffix,
                    "Suffix must not be empty",
                ));
            }
            if seen.contains(&suffix) {
                return Err(ExpandError::invalid_input(
                    format!("direction_suffixes.{}", direction.field()),
                    suffix,
                    "Suffix is used for more than one direction",
                ));
            }
            seen.push(suffix);
        }
        if self.max_rounds == 0 {
            return Err(ExpandError::invalid_input(
                "max_rounds",
                "0",
                "At least one expansion round is required",
            ));
        }
        Ok(())
    }

    /// Load and validate a JSON config file.
    pub fn load(path: &Path) -> ExpandResult<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            ExpandError::file_error("read config", path.display().to_string(), e.to_string())
        })?;
        let config: ExpandConfig =
            serde_json::from_str(&contents).map_err(|e| ExpandError::SerializationError {
                reason: format!("Invalid config in {}: {}", path.display(), e),
            })?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env::temp_dir;

    #[test]
    fn test_defaults() {
        let config = ExpandConfig::default();
        assert_eq!(config.suffix(Direction::XDir), "EX");
        assert_eq!(config.suffix(Direction::YDirMinusE), "EYN");
        assert_eq!(config.drift_suffix, "_DRIFT");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_split_names() {
        let config = ExpandConfig {
            drift_prefix: "D".to_string(),
            ..ExpandConfig::default()
        };
        assert_eq!(config.split_name(Direction::XDirPlusE, false), "EXP");
        assert_eq!(config.split_name(Direction::XDirPlusE, true), "DEXP_DRIFT");
    }

    #[test]
    fn test_replaces_only_canonical() {
        let config = ExpandConfig {
            replace_ex: true,
            ..ExpandConfig::default()
        };
        assert!(config.replaces(Direction::XDir));
        assert!(!config.replaces(Direction::XDirPlusE));
        assert!(!config.replaces(Direction::YDir));
    }

    #[test]
    fn test_duplicate_suffix_rejected() {
        let mut config = ExpandConfig::default();
        config.direction_suffixes.insert(Direction::YDir, "EX".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_rounds_rejected() {
        let config = ExpandConfig {
            max_rounds: 0,
            ..ExpandConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_and_policy() {
        let config: ExpandConfig =
            serde_json::from_str(r#"{ "replace_ey": true, "on_name_collision": "reject" }"#).unwrap();
        assert!(config.replace_ey);
        assert_eq!(config.on_name_collision, CollisionPolicy::Reject);
        assert_eq!(config.max_rounds, 16);
    }

    #[test]
    fn test_load_from_file() {
        let path = temp_dir().join("loadsplit_test_config.json");
        fs::write(&path, r#"{ "drift_prefix": "DR_" }"#).unwrap();
        let config = ExpandConfig::load(&path).unwrap();
        assert_eq!(config.drift_prefix, "DR_");
        let _ = fs::remove_file(&path);
    }
}
