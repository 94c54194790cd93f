//! # Seismic Expansion Engine
//!
//! Splits zip seismic patterns into simple ones and carries the split up
//! through every table that references them:
//!
//! ```text
//! patterns -> linear static cases -> linear combos (to a fixed point)
//!          -> envelope combos -> design combos -> write-back
//! ```
//!
//! Each tier produces an [`ExpansionMap`] from the names it replaced to the
//! names that replace them; the next tier consumes it.
//!
//! - [`patterns`] - zip pattern detection and splitting
//! - [`cases`] - linear static load case expansion
//! - [`combos`] - linear / envelope combination expansion
//! - [`design`] - design combination tables
//! - [`writer`] - writing the results back to the host
//! - [`pipeline`] - the stage-by-stage driver

pub mod cases;
pub mod combos;
pub mod design;
pub mod naming;
pub mod patterns;
pub mod pipeline;
pub mod writer;

pub use cases::{expand_loadcases, CaseExpansion};
pub use combos::{
    expand_envelop_loadcombos, expand_linear_loadcombos, expand_loadcombos, ComboExpansion,
};
pub use design::{expand_design_combos, DesignMaterial};
pub use patterns::{expand_seismic_load_patterns, PatternExpansion};
pub use pipeline::{expand_loads, ExpandLoads, ExpansionReport, ProgressEvent};
pub use writer::{TableWriter, WriteSummary};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::loads::LoadPatternType;

/// Group rows by name in first-appearance order.
pub(crate) fn group_by_name<'a, T>(rows: &'a [T], name: impl Fn(&T) -> &str) -> Vec<(&'a str, Vec<&'a T>)> {
    let mut groups: Vec<(&'a str, Vec<&'a T>)> = Vec::new();
    let mut index: HashMap<&'a str, usize> = HashMap::new();
    for row in rows {
        let key = name(row);
        match index.get(key) {
            Some(&position) => groups[position].1.push(row),
            None => {
                index.insert(key, groups.len());
                groups.push((key, vec![row]));
            }
        }
    }
    groups
}

/// Index tuples of a cartesian product, the first position varying slowest.
pub(crate) fn product_indices(lengths: &[usize]) -> Vec<Vec<usize>> {
    let total: usize = lengths.iter().product();
    (0..total)
        .map(|mut k| {
            let mut indices = vec![0; lengths.len()];
            for position in (0..lengths.len()).rev() {
                indices[position] = k % lengths[position];
                k /= lengths[position];
            }
            indices
        })
        .collect()
}

/// One name an original reference expands into.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Expansion {
    pub name: String,
    /// Pattern type for pattern-tier expansions; case-tier expansions carry
    /// it when the case referenced a single zip pattern
    pub load_type: Option<LoadPatternType>,
}

impl Expansion {
    pub fn new(name: impl Into<String>, load_type: Option<LoadPatternType>) -> Self {
        Expansion {
            name: name.into(),
            load_type,
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Expansion::new(name, None)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpansionEntry {
    pub original: String,
    pub expansions: Vec<Expansion>,
}

/// Ordered map `original name -> [expansion, ...]`.
///
/// Entries keep insertion order and expansions keep append order, so every
/// name derived from a map is reproducible.
///
/// # Example
/// ```
/// use split_core::expand::{Expansion, ExpansionMap};
///
/// let mut map = ExpansionMap::default();
/// map.push("EXALL", Expansion::named("EX"));
/// map.push("EXALL", Expansion::named("EXP"));
/// map.push("EXALL", Expansion::named("EX"));
///
/// assert_eq!(map.names("EXALL"), vec!["EX", "EXP"]);
/// assert!(map.contains("EXALL"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "ExpansionEntries", into = "ExpansionEntries")]
pub struct ExpansionMap {
    entries: Vec<ExpansionEntry>,
    /// original name -> position in `entries`
    index: HashMap<String, usize>,
}

/// Serialized form of [`ExpansionMap`]; the index is rebuilt on load.
#[derive(Serialize, Deserialize)]
struct ExpansionEntries {
    entries: Vec<ExpansionEntry>,
}

impl From<ExpansionEntries> for ExpansionMap {
    fn from(value: ExpansionEntries) -> Self {
        let mut map = ExpansionMap::default();
        for entry in value.entries {
            for expansion in entry.expansions {
                map.push(&entry.original, expansion);
            }
        }
        map
    }
}

impl From<ExpansionMap> for ExpansionEntries {
    fn from(value: ExpansionMap) -> Self {
        ExpansionEntries {
            entries: value.entries,
        }
    }
}

impl ExpansionMap {
    /// Append an expansion; duplicates of an existing expansion are ignored.
    pub fn push(&mut self, original: &str, expansion: Expansion) {
        match self.index.get(original) {
            Some(&position) => {
                let entry = &mut self.entries[position];
                if !entry.expansions.iter().any(|e| e.name == expansion.name) {
                    entry.expansions.push(expansion);
                }
            }
            None => {
                self.index.insert(original.to_string(), self.entries.len());
                self.entries.push(ExpansionEntry {
                    original: original.to_string(),
                    expansions: vec![expansion],
                });
            }
        }
    }

    pub fn get(&self, original: &str) -> Option<&[Expansion]> {
        self.index
            .get(original)
            .map(|&position| self.entries[position].expansions.as_slice())
    }

    pub fn contains(&self, original: &str) -> bool {
        self.index.contains_key(original)
    }

    /// Expanded names of one original, empty if it is not a key
    pub fn names(&self, original: &str) -> Vec<&str> {
        self.get(original)
            .map(|exps| exps.iter().map(|e| e.name.as_str()).collect())
            .unwrap_or_default()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.original.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge another map into this one, keeping this map's order first.
    pub fn extend(&mut self, other: &ExpansionMap) {
        for entry in &other.entries {
            for expansion in &entry.expansions {
                self.push(&entry.original, expansion.clone());
            }
        }
    }

    /// Resolve every value down to names that are not keys themselves.
    ///
    /// A value chain deeper than the number of entries can only come from a
    /// cycle; such a value is kept as is rather than followed forever.
    pub fn flattened(&self) -> ExpansionMap {
        let mut flat = ExpansionMap::default();
        for entry in &self.entries {
            let mut leaves = Vec::new();
            for expansion in &entry.expansions {
                self.collect_leaves(expansion, self.entries.len(), &mut leaves);
            }
            for leaf in leaves {
                flat.push(&entry.original, leaf);
            }
        }
        flat
    }

    fn collect_leaves(&self, expansion: &Expansion, depth: usize, out: &mut Vec<Expansion>) {
        match self.get(&expansion.name) {
            Some(next) if depth > 0 => {
                for child in next {
                    self.collect_leaves(child, depth - 1, out);
                }
            }
            _ => out.push(expansion.clone()),
        }
    }
}
