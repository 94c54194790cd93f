//! Load pattern type codes
//!
//! The host identifies load pattern types by integer code in its API and by
//! a label in the "Load Pattern Definitions" table. Only the types this crate
//! reads or writes are modeled; anything else stays a raw label.

use serde::{Deserialize, Serialize};

/// Host load pattern types
///
/// # Example
/// ```
/// use split_core::loads::LoadPatternType;
///
/// assert_eq!(LoadPatternType::Seismic.code(), 5);
/// assert_eq!(LoadPatternType::from_label("Seismic (Drift)"), Some(LoadPatternType::SeismicDrift));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LoadPatternType {
    Dead,
    SuperDead,
    Live,
    ReducibleLive,
    /// Strength-level seismic pattern
    Seismic,
    Wind,
    Snow,
    Other,
    RoofLive,
    Notional,
    /// Seismic pattern used only for drift checks
    SeismicDrift,
}

impl LoadPatternType {
    pub const ALL: [LoadPatternType; 11] = [
        LoadPatternType::Dead,
        LoadPatternType::SuperDead,
        LoadPatternType::Live,
        LoadPatternType::ReducibleLive,
        LoadPatternType::Seismic,
        LoadPatternType::Wind,
        LoadPatternType::Snow,
        LoadPatternType::Other,
        LoadPatternType::RoofLive,
        LoadPatternType::Notional,
        LoadPatternType::SeismicDrift,
    ];

    /// Host API type code
    pub fn code(&self) -> u32 {
        match self {
            LoadPatternType::Dead => 1,
            LoadPatternType::SuperDead => 2,
            LoadPatternType::Live => 3,
            LoadPatternType::ReducibleLive => 4,
            LoadPatternType::Seismic => 5,
            LoadPatternType::Wind => 6,
            LoadPatternType::Snow => 7,
            LoadPatternType::Other => 8,
            LoadPatternType::RoofLive => 11,
            LoadPatternType::Notional => 12,
            LoadPatternType::SeismicDrift => 37,
        }
    }

    /// Label used in the "Load Pattern Definitions" table
    pub fn label(&self) -> &'static str {
        match self {
            LoadPatternType::Dead => "Dead",
            LoadPatternType::SuperDead => "Super Dead",
            LoadPatternType::Live => "Live",
            LoadPatternType::ReducibleLive => "Reducible Live",
            LoadPatternType::Seismic => "Seismic",
            LoadPatternType::Wind => "Wind",
            LoadPatternType::Snow => "Snow",
            LoadPatternType::Other => "Other",
            LoadPatternType::RoofLive => "Roof Live",
            LoadPatternType::Notional => "Notional",
            LoadPatternType::SeismicDrift => "Seismic (Drift)",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.label().eq_ignore_ascii_case(label))
    }
}

impl std::fmt::Display for LoadPatternType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}
