//! # Model Snapshots
//!
//! A `ModelSnapshot` is the set of host tables for one structural model,
//! stored as human-readable JSON. It stands in for a live host session: the
//! [`crate::host::SnapshotHost`] serves reads and applies writes against it.
//!
//! ## Structure
//!
//! ```text
//! ModelSnapshot
//! ├── meta: SnapshotMetadata (version, software, model name, timestamps)
//! └── tables: BTreeMap<key, SnapshotTable> (fields + row-major values)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use split_core::snapshot::{ModelSnapshot, Software};
//! use split_core::tables::keys;
//!
//! let mut snapshot = ModelSnapshot::new("Tower-A", Software::Etabs);
//! snapshot.insert_table(keys::LOAD_PATTERNS, &["Name", "Type"], &[&["DEAD", "Dead"]]);
//!
//! let json = serde_json::to_string_pretty(&snapshot).unwrap();
//! assert!(json.contains("Tower-A"));
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tables::RawTable;

/// Current schema version for snapshot files
pub const SCHEMA_VERSION: &str = "0.1.0";

/// Host application the model belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Software {
    #[default]
    Etabs,
    Safe,
    Sap2000,
}

impl Software {
    pub fn display_name(&self) -> &'static str {
        match self {
            Software::Etabs => "ETABS",
            Software::Safe => "SAFE",
            Software::Sap2000 => "SAP2000",
        }
    }
}

impl std::fmt::Display for Software {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Snapshot metadata stored in the file header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    /// Schema version (for migration compatibility)
    pub version: String,

    pub software: Software,

    /// Model name as shown by the host
    pub model_name: String,

    pub created: DateTime<Utc>,

    pub modified: DateTime<Utc>,
}

/// One stored table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotTable {
    pub fields: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Root snapshot container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub meta: SnapshotMetadata,

    /// Tables keyed by host table key. A BTreeMap keeps saved files stable.
    pub tables: BTreeMap<String, SnapshotTable>,
}

impl ModelSnapshot {
    /// Create an empty snapshot.
    pub fn new(model_name: impl Into<String>, software: Software) -> Self {
        let now = Utc::now();
        ModelSnapshot {
            meta: SnapshotMetadata {
                version: SCHEMA_VERSION.to_string(),
                software,
                model_name: model_name.into(),
                created: now,
                modified: now,
            },
            tables: BTreeMap::new(),
        }
    }

    /// Copy of a stored table, `None` if absent
    pub fn table(&self, key: &str) -> Option<RawTable> {
        self.tables.get(key).map(|t| RawTable {
            key: key.to_string(),
            fields: t.fields.clone(),
            rows: t.rows.clone(),
        })
    }

    /// Store a table, replacing any previous contents under the same key.
    pub fn put_table(&mut self, table: &RawTable) {
        self.tables.insert(
            table.key.clone(),
            SnapshotTable {
                fields: table.fields.clone(),
                rows: table.rows.clone(),
            },
        );
        self.touch();
    }

    /// Convenience for building snapshots by hand.
    pub fn insert_table(&mut self, key: &str, fields: &[&str], rows: &[&[&str]]) {
        self.put_table(&RawTable {
            key: key.to_string(),
            fields: fields.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        });
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Update the modified timestamp.
    pub fn touch(&mut self) {
        self.meta.modified = Utc::now();
    }
}

impl Default for ModelSnapshot {
    fn default() -> Self {
        ModelSnapshot::new("", Software::default())
    }
}
