//! Load definitions as the host models them
//!
//! # Overview
//!
//! - [`LoadPatternType`] - Host pattern type codes and table labels
//! - [`Direction`] / [`DirectionSet`] - Auto-seismic direction flags
//! - [`ComboType`] - Load combination types (`Linear Add`, `Envelope`, ...)
//!
//! The members of a load case or combination are plain `(name, scale)`
//! pairs, see [`CaseLoad`] and [`ComboMember`].

pub mod combinations;
pub mod direction;
pub mod load_types;

pub use combinations::ComboType;
pub use direction::{Direction, DirectionSet};
pub use load_types::LoadPatternType;

use serde::{Deserialize, Serialize};

/// One load applied by a linear static load case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseLoad {
    /// Value of the `LoadType` column, normally "Load Pattern"
    pub load_type: String,
    /// Load pattern name
    pub name: String,
    pub scale_factor: f64,
}

/// One member of a load combination (a case or another combination).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComboMember {
    pub name: String,
    pub scale_factor: f64,
}

/// Value of the `LoadType` column for rows that apply a load pattern
pub const LOAD_PATTERN_LOAD_TYPE: &str = "Load Pattern";
