//! Writing expanded tables back to the host.
//!
//! Every table goes through the bulk `apply_table` path first. When the host
//! reports fatal errors for the case or combination table, the writer falls
//! back to the per-case / per-combination API, which tolerates things the
//! bulk path does not. A failed entity is logged and recorded; the others
//! are still written.

use serde::{Deserialize, Serialize};

use super::cases::{case_loads, group_cases};
use super::group_by_name;
use crate::errors::ExpandResult;
use crate::host::HostModel;
use crate::loads::ComboMember;
use crate::tables::schema::{decode_rows, LoadCaseRow, LoadComboRow};
use crate::tables::{RawTable, TableKind};

/// What happened to each table written
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteSummary {
    /// Tables accepted by the bulk write
    pub applied: Vec<String>,
    /// Tables written entity by entity after the bulk write was rejected
    pub fallbacks: Vec<String>,
    /// Tables, or `table/entity` pairs, that could not be written
    pub failed: Vec<String>,
}

impl WriteSummary {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Writes tables to a host and keeps a [`WriteSummary`].
pub struct TableWriter<'h, H: HostModel + ?Sized> {
    host: &'h mut H,
    summary: WriteSummary,
}

impl<'h, H: HostModel + ?Sized> TableWriter<'h, H> {
    pub fn new(host: &'h mut H) -> Self {
        TableWriter {
            host,
            summary: WriteSummary::default(),
        }
    }

    /// Write one table, falling back to per-entity writes where possible.
    ///
    /// Only errors of the host itself (such as a model that cannot be
    /// unlocked) are returned; rejected rows end up in the summary.
    pub fn write(&mut self, table: &RawTable) -> ExpandResult<()> {
        self.host.unlock()?;
        let outcome = self.host.apply_table(table)?;
        if outcome.is_ok() {
            tracing::info!("Wrote '{}' ({} rows)", table.key, table.len());
            self.summary.applied.push(table.key.clone());
            return Ok(());
        }

        tracing::warn!(
            "Host rejected '{}' with {} fatal error(s): {}",
            table.key,
            outcome.num_fatal_errors,
            outcome.message
        );
        match TableKind::of(&table.key) {
            Some(TableKind::LinearStaticCases) => self.write_cases(table),
            Some(TableKind::LoadCombinations) => self.write_combos(table),
            _ => {
                self.summary.failed.push(table.key.clone());
                Ok(())
            }
        }
    }

    fn write_cases(&mut self, table: &RawTable) -> ExpandResult<()> {
        let rows = decode_rows::<LoadCaseRow>(table)?;
        for (case, members) in group_cases(&rows) {
            let written = case_loads(&members)
                .and_then(|loads| self.host.set_linear_static_loads(&case, &loads));
            if let Err(e) = written {
                tracing::warn!("Could not write load case '{}': {}", case, e);
                self.summary.failed.push(format!("{}/{}", table.key, case));
            }
        }
        self.summary.fallbacks.push(table.key.clone());
        Ok(())
    }

    fn write_combos(&mut self, table: &RawTable) -> ExpandResult<()> {
        let rows = decode_rows::<LoadComboRow>(table)?;
        for (combo, members) in group_by_name(&rows, |r| r.name.as_str()) {
            let written = members
                .iter()
                .map(|r| {
                    Ok(ComboMember {
                        name: r.load_name.clone(),
                        scale_factor: r.scale()?,
                    })
                })
                .collect::<ExpandResult<Vec<ComboMember>>>()
                .and_then(|list| self.host.set_combo_cases(combo, &members[0].combo_type, &list));
            if let Err(e) = written {
                tracing::warn!("Could not write load combination '{}': {}", combo, e);
                self.summary.failed.push(format!("{}/{}", table.key, combo));
            }
        }
        self.summary.fallbacks.push(table.key.clone());
        Ok(())
    }

    pub fn finish(self) -> WriteSummary {
        self.summary
    }
}
