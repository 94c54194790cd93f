//! Load combination types
//!
//! The host stores a combination as one table row per member, with the
//! combination type on the row. Only `Linear Add` and `Envelope` take part
//! in expansion:
//! - `Linear Add` is an ordered weighted sum, so each expanded member needs
//!   its own renamed combination.
//! - `Envelope` is an unordered set, so expanded members are simply added to
//!   the same combination.

use serde::{Deserialize, Serialize};

/// Combination type as written in the `Type` column
///
/// # Example
/// ```
/// use split_core::loads::ComboType;
///
/// let t = ComboType::parse("Linear Add");
/// assert_eq!(t, ComboType::LinearAdd);
/// assert_eq!(t.as_str(), "Linear Add");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComboType {
    LinearAdd,
    Envelope,
    AbsoluteAdd,
    Srss,
    RangeAdd,
    /// Any type label this crate does not interpret
    Unrecognized(String),
}

impl ComboType {
    pub fn parse(label: &str) -> Self {
        match label.trim() {
            "Linear Add" => ComboType::LinearAdd,
            "Envelope" => ComboType::Envelope,
            "Absolute Add" => ComboType::AbsoluteAdd,
            "SRSS" => ComboType::Srss,
            "Range Add" => ComboType::RangeAdd,
            other => ComboType::Unrecognized(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ComboType::LinearAdd => "Linear Add",
            ComboType::Envelope => "Envelope",
            ComboType::AbsoluteAdd => "Absolute Add",
            ComboType::Srss => "SRSS",
            ComboType::RangeAdd => "Range Add",
            ComboType::Unrecognized(label) => label,
        }
    }
}

impl std::fmt::Display for ComboType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_labels() {
        assert_eq!(ComboType::parse("Envelope"), ComboType::Envelope);
        assert_eq!(ComboType::parse(" SRSS "), ComboType::Srss);
        assert_eq!(ComboType::parse("Range Add").as_str(), "Range Add");
    }

    #[test]
    fn test_unrecognized_keeps_label() {
        let t = ComboType::parse("Nonlinear");
        assert_eq!(t.as_str(), "Nonlinear");
        assert_eq!(t, ComboType::Unrecognized("Nonlinear".to_string()));
    }
}
