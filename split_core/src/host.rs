//! # Host Model Interface
//!
//! The structural model lives in the host application; this crate only sees
//! it through the capabilities of [`HostModel`]. [`SnapshotHost`] implements
//! them over a [`ModelSnapshot`] with the host's own rules: edits need an
//! unlocked model, running the analysis locks it, and a table whose rows
//! reference unknown patterns, cases or combinations is rejected with one
//! fatal error per offending row.
//!
//! ## Example
//!
//! ```rust
//! use split_core::host::{HostModel, SnapshotHost};
//! use split_core::loads::LoadPatternType;
//! use split_core::snapshot::{ModelSnapshot, Software};
//! use split_core::tables::keys;
//!
//! let mut host = SnapshotHost::new(ModelSnapshot::new("Demo", Software::Etabs));
//! host.add_load_pattern("EX", LoadPatternType::Seismic, 0.0, true).unwrap();
//!
//! let patterns = host.read_table(keys::LOAD_PATTERNS).unwrap().unwrap();
//! assert_eq!(patterns.value(0, "Type"), Some("Seismic"));
//! assert!(host.read_table(keys::LOAD_COMBINATIONS).unwrap().is_none());
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::errors::{ExpandError, ExpandResult};
use crate::loads::{CaseLoad, ComboMember, ComboType, LoadPatternType, LOAD_PATTERN_LOAD_TYPE};
use crate::snapshot::{ModelSnapshot, Software};
use crate::tables::schema::{
    decode_rows, default_fields, LoadCaseRow, LoadComboRow, LoadPatternRow, TypedTable,
};
use crate::tables::{keys, RawTable};

/// Result of a bulk table write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyOutcome {
    pub num_fatal_errors: usize,
    pub message: String,
}

impl ApplyOutcome {
    pub fn ok() -> Self {
        ApplyOutcome {
            num_fatal_errors: 0,
            message: String::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.num_fatal_errors == 0
    }
}

/// Capabilities of an open host model.
pub trait HostModel {
    fn software(&self) -> Software;

    /// Read a table fresh from the host. `None` when it is absent or empty.
    fn read_table(&self, key: &str) -> ExpandResult<Option<RawTable>>;

    /// Bulk-write a table. Requires an unlocked model.
    fn apply_table(&mut self, table: &RawTable) -> ExpandResult<ApplyOutcome>;

    /// Register a load pattern; a no-op when the name already exists.
    fn add_load_pattern(
        &mut self,
        name: &str,
        pattern_type: LoadPatternType,
        self_weight_multiplier: f64,
        add_analysis_case: bool,
    ) -> ExpandResult<()>;

    /// Per-case write used when the bulk case table write is rejected.
    fn set_linear_static_loads(&mut self, case: &str, loads: &[CaseLoad]) -> ExpandResult<()>;

    /// Per-combination write used when the bulk combination write is rejected.
    fn set_combo_cases(
        &mut self,
        combo: &str,
        combo_type: &ComboType,
        members: &[ComboMember],
    ) -> ExpandResult<()>;

    fn is_locked(&self) -> bool;

    fn unlock(&mut self) -> ExpandResult<()>;

    /// Run the analysis. Blocks until done and leaves the model locked.
    fn run_analysis(&mut self) -> ExpandResult<()>;
}

/// Host backed by a model snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotHost {
    snapshot: ModelSnapshot,
    locked: bool,
}

impl SnapshotHost {
    pub fn new(snapshot: ModelSnapshot) -> Self {
        SnapshotHost {
            snapshot,
            locked: false,
        }
    }

    pub fn snapshot(&self) -> &ModelSnapshot {
        &self.snapshot
    }

    /// Take the edited model out of the host
    pub fn into_snapshot(self) -> ModelSnapshot {
        self.snapshot
    }

    fn ensure_unlocked(&self) -> ExpandResult<()> {
        if self.locked {
            Err(ExpandError::ModelLocked)
        } else {
            Ok(())
        }
    }

    fn table_or_default(&self, key: &str) -> RawTable {
        self.snapshot
            .table(key)
            .unwrap_or_else(|| RawTable::new(key, default_fields(key)))
    }

    fn pattern_names(&self) -> ExpandResult<HashSet<String>> {
        Ok(match self.snapshot.table(keys::LOAD_PATTERNS) {
            Some(table) => decode_rows::<LoadPatternRow>(&table)?
                .into_iter()
                .map(|r| r.name)
                .collect(),
            None => HashSet::new(),
        })
    }

    fn case_names(&self) -> ExpandResult<HashSet<String>> {
        Ok(match self.snapshot.table(keys::LINEAR_STATIC_CASES) {
            Some(table) => decode_rows::<LoadCaseRow>(&table)?
                .into_iter()
                .map(|r| r.name)
                .collect(),
            None => HashSet::new(),
        })
    }

    fn combo_names(&self) -> ExpandResult<HashSet<String>> {
        Ok(match self.snapshot.table(keys::LOAD_COMBINATIONS) {
            Some(table) => decode_rows::<LoadComboRow>(&table)?
                .into_iter()
                .map(|r| r.name)
                .collect(),
            None => HashSet::new(),
        })
    }

    /// References in `table` the model cannot resolve, one entry per offending row
    fn unresolved_references(&self, table: &RawTable) -> ExpandResult<Vec<String>> {
        let typed = match TypedTable::decode(table) {
            Ok(typed) => typed,
            Err(ExpandError::UnknownTable { .. }) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let unresolved = match typed {
            TypedTable::LoadPatterns(_) => Vec::new(),
            TypedTable::AutoSeismic(rows) => {
                let patterns = self.pattern_names()?;
                rows.into_iter()
                    .map(|r| r.name)
                    .filter(|n| !patterns.contains(n))
                    .collect()
            }
            TypedTable::LinearStaticCases(rows) => {
                let patterns = self.pattern_names()?;
                rows.into_iter()
                    .filter(|r| r.applies_pattern() && !patterns.contains(&r.load_name))
                    .map(|r| r.load_name)
                    .collect()
            }
            TypedTable::LoadCombinations(rows) => {
                let cases = self.case_names()?;
                let combos: HashSet<&str> = rows.iter().map(|r| r.name.as_str()).collect();
                rows.iter()
                    .filter(|r| !cases.contains(&r.load_name) && !combos.contains(r.load_name.as_str()))
                    .map(|r| r.load_name.clone())
                    .collect()
            }
            TypedTable::DesignCombos(rows) => {
                let combos = self.combo_names()?;
                rows.into_iter()
                    .map(|r| r.combo_name)
                    .filter(|n| !combos.contains(n))
                    .collect()
            }
        };
        Ok(unresolved)
    }

    /// Replace all rows named `name` in `table`, keeping the position of the first one
    fn replace_rows(table: &mut RawTable, name: &str, new_rows: Vec<Vec<String>>) -> ExpandResult<()> {
        let name_column = table.require_column("Name")?;
        let is_named = |r: &Vec<String>| r.get(name_column).map(String::as_str) == Some(name);
        let position = table
            .rows
            .iter()
            .position(is_named)
            .unwrap_or(table.rows.len());
        table.rows.retain(|r| !is_named(r));
        let position = position.min(table.rows.len());
        table.rows.splice(position..position, new_rows);
        Ok(())
    }
}

impl HostModel for SnapshotHost {
    fn software(&self) -> Software {
        self.snapshot.meta.software
    }

    fn read_table(&self, key: &str) -> ExpandResult<Option<RawTable>> {
        Ok(self.snapshot.table(key).filter(|t| !t.is_empty()))
    }

    fn apply_table(&mut self, table: &RawTable) -> ExpandResult<ApplyOutcome> {
        self.ensure_unlocked()?;

        let unresolved = self.unresolved_references(table)?;
        if !unresolved.is_empty() {
            let message = format!(
                "{} fatal error(s) in '{}': unknown {}",
                unresolved.len(),
                table.key,
                unresolved.join(", ")
            );
            tracing::debug!("{}", message);
            return Ok(ApplyOutcome {
                num_fatal_errors: unresolved.len(),
                message,
            });
        }

        self.snapshot.put_table(table);
        Ok(ApplyOutcome::ok())
    }

    fn add_load_pattern(
        &mut self,
        name: &str,
        pattern_type: LoadPatternType,
        self_weight_multiplier: f64,
        add_analysis_case: bool,
    ) -> ExpandResult<()> {
        self.ensure_unlocked()?;

        if !self.pattern_names()?.contains(name) {
            let mut patterns = self.table_or_default(keys::LOAD_PATTERNS);
            let multiplier = self_weight_multiplier.to_string();
            patterns.push_record([
                ("Name", name),
                ("IsAuto", "No"),
                ("Type", pattern_type.label()),
                ("SelfWtMult", multiplier.as_str()),
            ]);
            self.snapshot.put_table(&patterns);
            tracing::debug!("Added load pattern '{}' (type {})", name, pattern_type.code());
        }

        if add_analysis_case && !self.case_names()?.contains(name) {
            let mut cases = self.table_or_default(keys::LINEAR_STATIC_CASES);
            cases.push_record([
                ("Name", name),
                ("LoadType", LOAD_PATTERN_LOAD_TYPE),
                ("LoadName", name),
                ("LoadSF", "1"),
            ]);
            self.snapshot.put_table(&cases);
        }
        Ok(())
    }

    fn set_linear_static_loads(&mut self, case: &str, loads: &[CaseLoad]) -> ExpandResult<()> {
        self.ensure_unlocked()?;

        let patterns = self.pattern_names()?;
        if let Some(unknown) = loads
            .iter()
            .find(|l| l.load_type == LOAD_PATTERN_LOAD_TYPE && !patterns.contains(&l.name))
        {
            return Err(ExpandError::unknown_reference(keys::LINEAR_STATIC_CASES, &unknown.name));
        }

        let mut cases = self.table_or_default(keys::LINEAR_STATIC_CASES);
        let mut scratch = RawTable::new(keys::LINEAR_STATIC_CASES, cases.fields.clone());
        for load in loads {
            let scale = load.scale_factor.to_string();
            scratch.push_record([
                ("Name", case),
                ("LoadType", load.load_type.as_str()),
                ("LoadName", load.name.as_str()),
                ("LoadSF", scale.as_str()),
            ]);
        }
        Self::replace_rows(&mut cases, case, scratch.rows)?;
        self.snapshot.put_table(&cases);
        Ok(())
    }

    fn set_combo_cases(
        &mut self,
        combo: &str,
        combo_type: &ComboType,
        members: &[ComboMember],
    ) -> ExpandResult<()> {
        self.ensure_unlocked()?;

        let cases = self.case_names()?;
        let combos = self.combo_names()?;
        if let Some(unknown) = members
            .iter()
            .find(|m| !cases.contains(&m.name) && !combos.contains(&m.name))
        {
            return Err(ExpandError::unknown_reference(keys::LOAD_COMBINATIONS, &unknown.name));
        }

        let mut table = self.table_or_default(keys::LOAD_COMBINATIONS);
        let mut scratch = RawTable::new(keys::LOAD_COMBINATIONS, table.fields.clone());
        for member in members {
            let scale = member.scale_factor.to_string();
            scratch.push_record([
                ("Name", combo),
                ("Type", combo_type.as_str()),
                ("LoadName", member.name.as_str()),
                ("SF", scale.as_str()),
            ]);
        }
        Self::replace_rows(&mut table, combo, scratch.rows)?;
        self.snapshot.put_table(&table);
        Ok(())
    }

    fn is_locked(&self) -> bool {
        self.locked
    }

    fn unlock(&mut self) -> ExpandResult<()> {
        if self.locked {
            tracing::debug!("Unlocking model '{}'", self.snapshot.meta.model_name);
        }
        self.locked = false;
        Ok(())
    }

    fn run_analysis(&mut self) -> ExpandResult<()> {
        tracing::info!("Running analysis for '{}'", self.snapshot.meta.model_name);
        self.locked = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> SnapshotHost {
        let mut snapshot = ModelSnapshot::new("Test", Software::Etabs);
        snapshot.insert_table(
            keys::LOAD_PATTERNS,
            &["Name", "IsAuto", "Type", "SelfWtMult"],
            &[&["DEAD", "No", "Dead", "1"], &["LIVE", "No", "Live", "0"]],
        );
        snapshot.insert_table(
            keys::LINEAR_STATIC_CASES,
            &["Name", "LoadType", "LoadName", "LoadSF"],
            &[
                &["DEAD", "Load Pattern", "DEAD", "1"],
                &["LIVE", "Load Pattern", "LIVE", "1"],
            ],
        );
        SnapshotHost::new(snapshot)
    }

    fn case_table(rows: &[&[&str]]) -> RawTable {
        let mut table = RawTable::new(keys::LINEAR_STATIC_CASES, default_fields(keys::LINEAR_STATIC_CASES));
        table.rows = rows
            .iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect();
        table
    }

    #[test]
    fn test_apply_rejects_unknown_pattern() {
        let mut host = host();
        let table = case_table(&[&["DL", "Load Pattern", "DEAD", "1"], &["Q", "Load Pattern", "EX", "1"]]);

        let outcome = host.apply_table(&table).unwrap();
        assert_eq!(outcome.num_fatal_errors, 1);
        assert!(outcome.message.contains("EX"));
        // Rejected tables leave the model untouched
        assert_eq!(host.read_table(keys::LINEAR_STATIC_CASES).unwrap().unwrap().len(), 2);
    }

    #[test]
    fn test_apply_accepts_known_patterns() {
        let mut host = host();
        let table = case_table(&[&["DL", "Load Pattern", "DEAD", "1.2"]]);
        assert!(host.apply_table(&table).unwrap().is_ok());
        assert_eq!(host.read_table(keys::LINEAR_STATIC_CASES).unwrap().unwrap(), table);
    }

    #[test]
    fn test_locked_model_refuses_writes() {
        let mut host = host();
        host.run_analysis().unwrap();
        assert!(host.is_locked());

        let table = case_table(&[&["DL", "Load Pattern", "DEAD", "1"]]);
        assert_eq!(host.apply_table(&table), Err(ExpandError::ModelLocked));
        assert_eq!(
            host.add_load_pattern("EX", LoadPatternType::Seismic, 0.0, true),
            Err(ExpandError::ModelLocked)
        );

        host.unlock().unwrap();
        assert!(host.apply_table(&table).unwrap().is_ok());
    }

    #[test]
    fn test_add_load_pattern_is_idempotent_and_adds_case() {
        let mut host = host();
        host.add_load_pattern("EX", LoadPatternType::Seismic, 0.0, true).unwrap();
        host.add_load_pattern("EX", LoadPatternType::Seismic, 0.0, true).unwrap();

        let patterns = host.read_table(keys::LOAD_PATTERNS).unwrap().unwrap();
        assert_eq!(patterns.column("Name").unwrap(), vec!["DEAD", "LIVE", "EX"]);

        let cases = host.read_table(keys::LINEAR_STATIC_CASES).unwrap().unwrap();
        assert_eq!(cases.column("Name").unwrap(), vec!["DEAD", "LIVE", "EX"]);
    }

    #[test]
    fn test_set_linear_static_loads_replaces_case_in_place() {
        let mut host = host();
        let loads = vec![
            CaseLoad {
                load_type: LOAD_PATTERN_LOAD_TYPE.to_string(),
                name: "DEAD".to_string(),
                scale_factor: 1.0,
            },
            CaseLoad {
                load_type: LOAD_PATTERN_LOAD_TYPE.to_string(),
                name: "LIVE".to_string(),
                scale_factor: 0.5,
            },
        ];
        host.set_linear_static_loads("DEAD", &loads).unwrap();

        let cases = host.read_table(keys::LINEAR_STATIC_CASES).unwrap().unwrap();
        assert_eq!(cases.column("Name").unwrap(), vec!["DEAD", "DEAD", "LIVE"]);
        assert_eq!(cases.value(1, "LoadSF"), Some("0.5"));

        let bad = vec![CaseLoad {
            load_type: LOAD_PATTERN_LOAD_TYPE.to_string(),
            name: "EX".to_string(),
            scale_factor: 1.0,
        }];
        assert!(matches!(
            host.set_linear_static_loads("Q", &bad),
            Err(ExpandError::UnknownReference { .. })
        ));
    }

    #[test]
    fn test_set_combo_cases() {
        let mut host = host();
        let members = vec![
            ComboMember { name: "DEAD".to_string(), scale_factor: 1.2 },
            ComboMember { name: "LIVE".to_string(), scale_factor: 1.6 },
        ];
        host.set_combo_cases("ULS", &ComboType::LinearAdd, &members).unwrap();

        let combos = host.read_table(keys::LOAD_COMBINATIONS).unwrap().unwrap();
        assert_eq!(combos.len(), 2);
        assert_eq!(combos.value(0, "Type"), Some("Linear Add"));
        assert_eq!(combos.value(1, "SF"), Some("1.6"));
    }

    #[test]
    fn test_unknown_tables_are_stored_verbatim() {
        let mut host = host();
        let mut table = RawTable::new("Story Definitions", vec!["Name".to_string()]);
        table.push_record([("Name", "Story1")]);
        assert!(host.apply_table(&table).unwrap().is_ok());
        assert_eq!(host.read_table("Story Definitions").unwrap().unwrap(), table);
    }

    #[test]
    fn test_into_snapshot_keeps_applied_tables() {
        let mut host = host();
        let table = case_table(&[&["DL", "Load Pattern", "DEAD", "1.2"]]);
        host.apply_table(&table).unwrap();

        let snapshot = host.into_snapshot();
        assert_eq!(snapshot.tables[keys::LINEAR_STATIC_CASES].rows, table.rows);
        assert!(snapshot.tables.contains_key(keys::LOAD_PATTERNS));
    }
}
