//! # Expansion Pipeline
//!
//! [`ExpandLoads`] runs one stage per call to `next()` and reports progress
//! after each, so a caller can drive it from an event loop and render a
//! progress bar:
//!
//! | stage              | percent |
//! |--------------------|---------|
//! | seismic patterns   | 20      |
//! | load cases         | 40      |
//! | linear combos      | 60      |
//! | envelope combos    | 70      |
//! | design combos      | 85      |
//! | write-back         | 100     |
//!
//! The last item is always [`ProgressEvent::Finished`], unless a stage
//! fails: then the error is yielded once and iteration ends. Stopping early
//! leaves the model as the last completed stage left it.
//!
//! A model without zip patterns is not an error: the pipeline yields a
//! "nothing to do" message at 100% and finishes with `success: false`
//! without writing anything.
//!
//! ## Example
//!
//! ```rust
//! use split_core::config::ExpandConfig;
//! use split_core::expand::{expand_loads, ProgressEvent};
//! use split_core::host::SnapshotHost;
//! use split_core::snapshot::{ModelSnapshot, Software};
//!
//! let mut host = SnapshotHost::new(ModelSnapshot::new("Empty", Software::Etabs));
//! let events: Vec<ProgressEvent> = expand_loads(&mut host, ExpandConfig::default())
//!     .collect::<Result<_, _>>()
//!     .unwrap();
//!
//! assert!(matches!(events.last(), Some(ProgressEvent::Finished { success: false, .. })));
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::cases::expand_loadcases;
use super::combos::{envelope_lookup, expand_envelop_loadcombos, expand_loadcombos, read_loadcombos};
use super::design::{expand_design_combos, DesignMaterial};
use super::patterns::expand_seismic_load_patterns;
use super::writer::{TableWriter, WriteSummary};
use super::ExpansionMap;
use crate::config::ExpandConfig;
use crate::errors::{ExpandError, ExpandResult};
use crate::host::HostModel;
use crate::snapshot::Software;
use crate::tables::schema::{encode_rows, LoadComboRow};
use crate::tables::RawTable;

/// One item yielded by [`ExpandLoads`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    Progress { message: String, percent: u8 },
    Finished { success: bool, report: ExpansionReport },
}

/// Everything one run changed, for logs and the CLI's `--report`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpansionReport {
    pub run_id: Uuid,
    pub software: Software,
    pub started: DateTime<Utc>,
    pub finished: Option<DateTime<Utc>>,
    pub patterns: ExpansionMap,
    pub cases: ExpansionMap,
    pub combos: ExpansionMap,
    /// Linear expansion rounds that converted at least one combination
    pub combo_rounds: usize,
    pub design_tables: Vec<DesignMaterial>,
    pub write: WriteSummary,
}

impl ExpansionReport {
    fn new(software: Software) -> Self {
        ExpansionReport {
            run_id: Uuid::new_v4(),
            software,
            started: Utc::now(),
            finished: None,
            patterns: ExpansionMap::default(),
            cases: ExpansionMap::default(),
            combos: ExpansionMap::default(),
            combo_rounds: 0,
            design_tables: Vec::new(),
            write: WriteSummary::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Patterns,
    Cases,
    LinearCombos,
    EnvelopeCombos,
    DesignCombos,
    Write,
    Finish { success: bool },
    Done,
}

/// Stage-by-stage expansion of one open model.
pub struct ExpandLoads<'h, H: HostModel + ?Sized> {
    host: &'h mut H,
    config: ExpandConfig,
    stage: Stage,
    report: ExpansionReport,
    pattern_table: Option<RawTable>,
    case_table: Option<RawTable>,
    combo_table: Option<RawTable>,
    combo_rows: Vec<LoadComboRow>,
    design_tables: BTreeMap<DesignMaterial, RawTable>,
}

/// Start an expansion run. Nothing happens until the iterator is driven.
pub fn expand_loads<H: HostModel + ?Sized>(host: &mut H, config: ExpandConfig) -> ExpandLoads<'_, H> {
    ExpandLoads::new(host, config)
}

impl<'h, H: HostModel + ?Sized> ExpandLoads<'h, H> {
    pub fn new(host: &'h mut H, config: ExpandConfig) -> Self {
        let report = ExpansionReport::new(host.software());
        ExpandLoads {
            host,
            config,
            stage: Stage::Patterns,
            report,
            pattern_table: None,
            case_table: None,
            combo_table: None,
            combo_rows: Vec::new(),
            design_tables: BTreeMap::new(),
        }
    }

    /// The report so far
    pub fn report(&self) -> &ExpansionReport {
        &self.report
    }

    fn progress(&mut self, next: Stage, message: String, percent: u8) -> ProgressEvent {
        tracing::info!("[{:>3}%] {}", percent, message);
        self.stage = next;
        ProgressEvent::Progress { message, percent }
    }

    fn run_stage(&mut self) -> ExpandResult<ProgressEvent> {
        match self.stage {
            Stage::Patterns => {
                self.config.validate()?;
                match expand_seismic_load_patterns(&mut *self.host, &self.config)? {
                    None => Ok(self.progress(
                        Stage::Finish { success: false },
                        "No seismic load pattern with more than one direction, nothing to do".to_string(),
                        100,
                    )),
                    Some((table, expansion)) => {
                        let message = format!(
                            "Split {} seismic load pattern(s) into {} pattern(s)",
                            expansion.map.len(),
                            expansion.new_patterns.len()
                        );
                        self.report.patterns = expansion.map;
                        self.pattern_table = Some(table);
                        Ok(self.progress(Stage::Cases, message, 20))
                    }
                }
            }

            Stage::Cases => {
                let message = match expand_loadcases(&*self.host, &self.report.patterns, &self.config)? {
                    Some((table, expansion)) => {
                        self.report.cases = expansion.map;
                        self.case_table = Some(table);
                        format!("Expanded {} load case(s)", self.report.cases.len())
                    }
                    None => "No linear static load cases".to_string(),
                };
                Ok(self.progress(Stage::LinearCombos, message, 40))
            }

            Stage::LinearCombos => {
                let message = match read_loadcombos(&*self.host)? {
                    Some((table, rows)) => {
                        let expansion = expand_loadcombos(&rows, &self.report.cases, &self.config)?;
                        self.report.combos = expansion.map;
                        self.report.combo_rounds = expansion.rounds;
                        self.combo_rows = expansion.rows;
                        self.combo_table = Some(table);
                        format!(
                            "Expanded {} linear load combination(s) in {} round(s)",
                            self.report.combos.len(),
                            self.report.combo_rounds
                        )
                    }
                    None => "No load combinations".to_string(),
                };
                Ok(self.progress(Stage::EnvelopeCombos, message, 60))
            }

            Stage::EnvelopeCombos => {
                let message = match self.combo_table.take() {
                    Some(template) => {
                        let lookup = envelope_lookup(&self.report.cases, &self.report.combos);
                        let rows = expand_envelop_loadcombos(&self.combo_rows, &lookup);
                        let message = format!("Load combination table now has {} row(s)", rows.len());
                        self.combo_table = Some(encode_rows(&template.key, &template.fields, &rows));
                        message
                    }
                    None => "No envelope combinations".to_string(),
                };
                Ok(self.progress(Stage::DesignCombos, message, 70))
            }

            Stage::DesignCombos => {
                self.design_tables = expand_design_combos(&*self.host, &self.report.combos)?;
                self.report.design_tables = self.design_tables.keys().copied().collect();
                let message = format!("Updated {} design combination table(s)", self.design_tables.len());
                Ok(self.progress(Stage::Write, message, 85))
            }

            Stage::Write => {
                let mut writer = TableWriter::new(&mut *self.host);
                let tables = self
                    .pattern_table
                    .iter()
                    .chain(self.case_table.iter())
                    .chain(self.combo_table.iter())
                    .chain(self.design_tables.values());
                for table in tables {
                    writer.write(table)?;
                }
                self.report.write = writer.finish();

                let success = self.report.write.is_complete();
                let message = if success {
                    format!("Wrote {} table(s)", self.report.write.applied.len() + self.report.write.fallbacks.len())
                } else {
                    format!("Could not write {}", self.report.write.failed.join(", "))
                };
                Ok(self.progress(Stage::Finish { success }, message, 100))
            }

            Stage::Finish { .. } | Stage::Done => Err(ExpandError::Internal {
                message: "expansion already finished".to_string(),
            }),
        }
    }
}

impl<'h, H: HostModel + ?Sized> Iterator for ExpandLoads<'h, H> {
    type Item = ExpandResult<ProgressEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.stage {
            Stage::Done => None,
            Stage::Finish { success } => {
                self.stage = Stage::Done;
                self.report.finished = Some(Utc::now());
                Some(Ok(ProgressEvent::Finished {
                    success,
                    report: self.report.clone(),
                }))
            }
            _ => match self.run_stage() {
                Ok(event) => Some(Ok(event)),
                Err(e) => {
                    tracing::error!("Expansion stopped: {}", e);
                    self.stage = Stage::Done;
                    Some(Err(e))
                }
            },
        }
    }
}
