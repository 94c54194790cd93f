//! # Host Tables
//!
//! The host exposes its model as named tables. A table travels as an ordered
//! field list plus one flat value array (row after row, every value a
//! string). [`RawTable`] holds the same data row-major; [`schema`] decodes
//! the tables this crate understands into typed rows.
//!
//! ## Example
//!
//! ```rust
//! use split_core::tables::{RawTable, keys};
//!
//! let fields = vec!["Name".to_string(), "Type".to_string()];
//! let flat: Vec<String> = ["DEAD", "Dead", "EXALL", "Seismic"]
//!     .iter()
//!     .map(|s| s.to_string())
//!     .collect();
//!
//! let table = RawTable::from_flat(keys::LOAD_PATTERNS, fields, &flat).unwrap();
//! assert_eq!(table.len(), 2);
//! assert_eq!(table.value(1, "Name"), Some("EXALL"));
//! assert_eq!(table.to_flat(), flat);
//! ```

pub mod schema;

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::errors::{ExpandError, ExpandResult};

/// Table keys recognized by the host
pub mod keys {
    pub const LOAD_PATTERNS: &str = "Load Pattern Definitions";
    pub const AUTO_SEISMIC_USER_COEFFICIENT: &str =
        "Load Pattern Definitions - Auto Seismic - User Coefficient";
    pub const LINEAR_STATIC_CASES: &str = "Load Case Definitions - Linear Static";
    pub const LOAD_COMBINATIONS: &str = "Load Combination Definitions";
    pub const CONCRETE_DESIGN_COMBOS: &str = "Concrete Frame Design Load Combination Data";
    pub const STEEL_DESIGN_COMBOS: &str = "Steel Design Load Combination Data";
    pub const SHEARWALL_DESIGN_COMBOS: &str = "Shear Wall Design Load Combination Data";
    pub const SLAB_DESIGN_COMBOS: &str = "Concrete Slab Design Load Combination Data";
}

/// Shape of a known table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    LoadPatterns,
    AutoSeismic,
    LinearStaticCases,
    LoadCombinations,
    DesignCombos,
}

static TABLE_KINDS: Lazy<HashMap<&'static str, TableKind>> = Lazy::new(|| {
    HashMap::from([
        (keys::LOAD_PATTERNS, TableKind::LoadPatterns),
        (keys::AUTO_SEISMIC_USER_COEFFICIENT, TableKind::AutoSeismic),
        (keys::LINEAR_STATIC_CASES, TableKind::LinearStaticCases),
        (keys::LOAD_COMBINATIONS, TableKind::LoadCombinations),
        (keys::CONCRETE_DESIGN_COMBOS, TableKind::DesignCombos),
        (keys::STEEL_DESIGN_COMBOS, TableKind::DesignCombos),
        (keys::SHEARWALL_DESIGN_COMBOS, TableKind::DesignCombos),
        (keys::SLAB_DESIGN_COMBOS, TableKind::DesignCombos),
    ])
});

impl TableKind {
    /// Look up the shape of a table by key
    pub fn of(key: &str) -> Option<TableKind> {
        TABLE_KINDS.get(key).copied()
    }
}

/// A host table held row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    pub key: String,
    pub fields: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(key: impl Into<String>, fields: Vec<String>) -> Self {
        RawTable {
            key: key.into(),
            fields,
            rows: Vec::new(),
        }
    }

    /// Build a table from the host's flat value array.
    pub fn from_flat(key: impl Into<String>, fields: Vec<String>, values: &[String]) -> ExpandResult<Self> {
        let key = key.into();
        if fields.is_empty() {
            if values.is_empty() {
                return Ok(RawTable::new(key, fields));
            }
            return Err(ExpandError::table_shape(key, "values present but no fields"));
        }
        if values.len() % fields.len() != 0 {
            return Err(ExpandError::table_shape(
                key,
                format!("{} values do not fill rows of {} fields", values.len(), fields.len()),
            ));
        }
        let rows = values.chunks(fields.len()).map(|chunk| chunk.to_vec()).collect();
        Ok(RawTable { key, fields, rows })
    }

    /// Flatten back into the host's value array.
    pub fn to_flat(&self) -> Vec<String> {
        self.rows.iter().flatten().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == field)
    }

    /// Column index, or a `MissingField` error naming this table
    pub fn require_column(&self, field: &str) -> ExpandResult<usize> {
        self.column_index(field)
            .ok_or_else(|| ExpandError::missing_field(&self.key, field))
    }

    /// Cell value by row index and column name
    pub fn value(&self, row: usize, field: &str) -> Option<&str> {
        let column = self.column_index(field)?;
        self.rows.get(row).and_then(|r| r.get(column)).map(String::as_str)
    }

    /// All values of one column, in row order
    pub fn column(&self, field: &str) -> Option<Vec<&str>> {
        let column = self.column_index(field)?;
        Some(
            self.rows
                .iter()
                .map(|r| r.get(column).map(String::as_str).unwrap_or(""))
                .collect(),
        )
    }

    /// Append a row given as `(field, value)` pairs; unlisted fields stay empty.
    pub fn push_record<'a, I>(&mut self, record: I)
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut row = vec![String::new(); self.fields.len()];
        for (field, value) in record {
            if let Some(column) = self.column_index(field) {
                row[column] = value.to_string();
            }
        }
        self.rows.push(row);
    }
}
