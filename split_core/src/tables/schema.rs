//! Typed row schemas for the tables the expansion engine reads and writes.
//!
//! Each row type decodes the columns the engine interprets and keeps every
//! other column verbatim, so a decode/encode round trip never loses data the
//! host put there. Continuation rows (blank `Name`, and blank `Type` for
//! combinations) are filled from the row above while decoding.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{keys, RawTable, TableKind};
use crate::errors::{ExpandError, ExpandResult};
use crate::loads::{ComboType, Direction, DirectionSet, LoadPatternType, LOAD_PATTERN_LOAD_TYPE};

/// Columns not interpreted by a row type, keyed by field name
pub type ExtraColumns = BTreeMap<String, String>;

/// Read-only view of one table row.
pub struct Record<'a> {
    table: &'a str,
    fields: &'a [String],
    values: &'a [String],
}

impl<'a> Record<'a> {
    pub fn get(&self, field: &str) -> Option<&'a str> {
        let column = self.fields.iter().position(|f| f == field)?;
        self.values.get(column).map(String::as_str)
    }

    pub fn get_or_empty(&self, field: &str) -> &'a str {
        self.get(field).unwrap_or("")
    }

    pub fn require(&self, field: &str) -> ExpandResult<&'a str> {
        self.get(field)
            .ok_or_else(|| ExpandError::missing_field(self.table, field))
    }

    /// All columns except the ones listed
    pub fn extra(&self, interpreted: &[&str]) -> ExtraColumns {
        self.fields
            .iter()
            .zip(self.values.iter())
            .filter(|(f, _)| !interpreted.contains(&f.as_str()))
            .map(|(f, v)| (f.clone(), v.clone()))
            .collect()
    }
}

/// A typed row of one table shape.
pub trait TableRow: Sized {
    /// Columns the row type interprets
    const INTERPRETED: &'static [&'static str];
    /// Columns whose blank cells inherit the value of the previous row
    const FILL_DOWN: &'static [&'static str] = &[];

    fn decode(record: &Record<'_>) -> ExpandResult<Self>;

    /// Value of an interpreted column, `None` for anything else
    fn interpreted_value(&self, field: &str) -> Option<String>;

    fn extra(&self) -> &ExtraColumns;

    fn encode(&self, fields: &[String]) -> Vec<String> {
        fields
            .iter()
            .map(|f| {
                self.interpreted_value(f)
                    .or_else(|| self.extra().get(f).cloned())
                    .unwrap_or_default()
            })
            .collect()
    }
}

/// Decode every row of a table.
pub fn decode_rows<R: TableRow>(table: &RawTable) -> ExpandResult<Vec<R>> {
    let fill_columns: Vec<usize> = R::FILL_DOWN
        .iter()
        .filter_map(|f| table.column_index(f))
        .collect();
    let mut previous: Option<Vec<String>> = None;
    let mut rows = Vec::with_capacity(table.len());

    for (index, raw) in table.rows.iter().enumerate() {
        if raw.len() != table.fields.len() {
            return Err(ExpandError::table_shape(
                &table.key,
                format!("row {} has {} values for {} fields", index, raw.len(), table.fields.len()),
            ));
        }
        let mut values = raw.clone();
        if let Some(prev) = &previous {
            for &column in &fill_columns {
                if values[column].trim().is_empty() {
                    values[column] = prev[column].clone();
                }
            }
        }
        let record = Record {
            table: &table.key,
            fields: &table.fields,
            values: &values,
        };
        rows.push(R::decode(&record)?);
        previous = Some(values);
    }
    Ok(rows)
}

/// Encode typed rows into a table with the given field order.
pub fn encode_rows<R: TableRow>(key: &str, fields: &[String], rows: &[R]) -> RawTable {
    RawTable {
        key: key.to_string(),
        fields: fields.to_vec(),
        rows: rows.iter().map(|r| r.encode(fields)).collect(),
    }
}

/// Parse a Yes/No flag cell. Blank cells read as `false`.
pub fn parse_flag(field: &str, value: &str) -> ExpandResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "yes" | "true" | "1" => Ok(true),
        "no" | "false" | "0" | "" => Ok(false),
        _ => Err(ExpandError::invalid_input(field, value, "Expected Yes or No")),
    }
}

pub fn format_flag(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}

/// Parse a scale factor cell.
pub fn parse_scale(field: &str, value: &str) -> ExpandResult<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ExpandError::invalid_input(field, value, "Expected a finite number"))
}

/// Row of "Load Pattern Definitions".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadPatternRow {
    pub name: String,
    /// Type label, e.g. "Seismic (Drift)"
    pub pattern_type: String,
    pub extra: ExtraColumns,
}

impl LoadPatternRow {
    pub fn load_type(&self) -> Option<LoadPatternType> {
        LoadPatternType::from_label(&self.pattern_type)
    }
}

impl TableRow for LoadPatternRow {
    const INTERPRETED: &'static [&'static str] = &["Name", "Type"];

    fn decode(record: &Record<'_>) -> ExpandResult<Self> {
        Ok(LoadPatternRow {
            name: record.require("Name")?.to_string(),
            pattern_type: record.get_or_empty("Type").to_string(),
            extra: record.extra(Self::INTERPRETED),
        })
    }

    fn interpreted_value(&self, field: &str) -> Option<String> {
        match field {
            "Name" => Some(self.name.clone()),
            "Type" => Some(self.pattern_type.clone()),
            _ => None,
        }
    }

    fn extra(&self) -> &ExtraColumns {
        &self.extra
    }
}

/// Row of the auto-seismic user coefficient table.
///
/// EccRatio, C, K, story range and the eccentricity-overwrite reference are
/// kept in `extra` exactly as the host wrote them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeismicPatternRow {
    pub name: String,
    pub directions: DirectionSet,
    pub extra: ExtraColumns,
}

impl SeismicPatternRow {
    /// Copy of this row renamed and restricted to one direction
    pub fn split(&self, name: impl Into<String>, direction: Direction) -> Self {
        SeismicPatternRow {
            name: name.into(),
            directions: DirectionSet::single(direction),
            extra: self.extra.clone(),
        }
    }
}

const SEISMIC_INTERPRETED: [&str; 7] = [
    "Name",
    "XDir",
    "XDirPlusE",
    "XDirMinusE",
    "YDir",
    "YDirPlusE",
    "YDirMinusE",
];

impl TableRow for SeismicPatternRow {
    const INTERPRETED: &'static [&'static str] = &SEISMIC_INTERPRETED;

    fn decode(record: &Record<'_>) -> ExpandResult<Self> {
        let mut directions = DirectionSet::default();
        for direction in Direction::ALL {
            let value = record.require(direction.field())?;
            if parse_flag(direction.field(), value)? {
                directions.insert(direction);
            }
        }
        Ok(SeismicPatternRow {
            name: record.require("Name")?.to_string(),
            directions,
            extra: record.extra(Self::INTERPRETED),
        })
    }

    fn interpreted_value(&self, field: &str) -> Option<String> {
        if field == "Name" {
            return Some(self.name.clone());
        }
        Direction::ALL
            .iter()
            .find(|d| d.field() == field)
            .map(|d| format_flag(self.directions.contains(*d)).to_string())
    }

    fn extra(&self) -> &ExtraColumns {
        &self.extra
    }
}

/// Row of "Load Case Definitions - Linear Static": one load of one case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadCaseRow {
    pub name: String,
    pub load_type: String,
    pub load_name: String,
    /// Scale factor text as written by the host
    pub scale_factor: String,
    pub extra: ExtraColumns,
}

impl LoadCaseRow {
    pub fn scale(&self) -> ExpandResult<f64> {
        parse_scale("LoadSF", &self.scale_factor)
    }

    /// Whether the row applies a load pattern (as opposed to an acceleration)
    pub fn applies_pattern(&self) -> bool {
        self.load_type.is_empty() || self.load_type == LOAD_PATTERN_LOAD_TYPE
    }
}

impl TableRow for LoadCaseRow {
    const INTERPRETED: &'static [&'static str] = &["Name", "LoadType", "LoadName", "LoadSF"];
    const FILL_DOWN: &'static [&'static str] = &["Name"];

    fn decode(record: &Record<'_>) -> ExpandResult<Self> {
        Ok(LoadCaseRow {
            name: record.require("Name")?.to_string(),
            load_type: record.get_or_empty("LoadType").to_string(),
            load_name: record.require("LoadName")?.to_string(),
            scale_factor: record.require("LoadSF")?.to_string(),
            extra: record.extra(Self::INTERPRETED),
        })
    }

    fn interpreted_value(&self, field: &str) -> Option<String> {
        match field {
            "Name" => Some(self.name.clone()),
            "LoadType" => Some(self.load_type.clone()),
            "LoadName" => Some(self.load_name.clone()),
            "LoadSF" => Some(self.scale_factor.clone()),
            _ => None,
        }
    }

    fn extra(&self) -> &ExtraColumns {
        &self.extra
    }
}

/// Row of "Load Combination Definitions": one member of one combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadComboRow {
    pub name: String,
    pub combo_type: ComboType,
    pub load_name: String,
    pub scale_factor: String,
    pub extra: ExtraColumns,
}

impl LoadComboRow {
    pub fn scale(&self) -> ExpandResult<f64> {
        parse_scale("SF", &self.scale_factor)
    }
}

impl TableRow for LoadComboRow {
    const INTERPRETED: &'static [&'static str] = &["Name", "Type", "LoadName", "SF"];
    const FILL_DOWN: &'static [&'static str] = &["Name", "Type"];

    fn decode(record: &Record<'_>) -> ExpandResult<Self> {
        Ok(LoadComboRow {
            name: record.require("Name")?.to_string(),
            combo_type: ComboType::parse(record.require("Type")?),
            load_name: record.require("LoadName")?.to_string(),
            scale_factor: record.require("SF")?.to_string(),
            extra: record.extra(Self::INTERPRETED),
        })
    }

    fn interpreted_value(&self, field: &str) -> Option<String> {
        match field {
            "Name" => Some(self.name.clone()),
            "Type" => Some(self.combo_type.as_str().to_string()),
            "LoadName" => Some(self.load_name.clone()),
            "SF" => Some(self.scale_factor.clone()),
            _ => None,
        }
    }

    fn extra(&self) -> &ExtraColumns {
        &self.extra
    }
}

/// Row of a design combination table. `ComboType` and `DesignType` stay in
/// `extra`; only the referenced combination is interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignComboRow {
    pub combo_name: String,
    pub extra: ExtraColumns,
}

impl TableRow for DesignComboRow {
    const INTERPRETED: &'static [&'static str] = &["ComboName"];

    fn decode(record: &Record<'_>) -> ExpandResult<Self> {
        Ok(DesignComboRow {
            combo_name: record.require("ComboName")?.to_string(),
            extra: record.extra(Self::INTERPRETED),
        })
    }

    fn interpreted_value(&self, field: &str) -> Option<String> {
        (field == "ComboName").then(|| self.combo_name.clone())
    }

    fn extra(&self) -> &ExtraColumns {
        &self.extra
    }
}

/// A decoded table, one variant per known table shape.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedTable {
    LoadPatterns(Vec<LoadPatternRow>),
    AutoSeismic(Vec<SeismicPatternRow>),
    LinearStaticCases(Vec<LoadCaseRow>),
    LoadCombinations(Vec<LoadComboRow>),
    DesignCombos(Vec<DesignComboRow>),
}

impl TypedTable {
    /// Decode a raw table according to its key.
    pub fn decode(table: &RawTable) -> ExpandResult<Self> {
        let kind = TableKind::of(&table.key).ok_or_else(|| ExpandError::UnknownTable {
            table: table.key.clone(),
        })?;
        Ok(match kind {
            TableKind::LoadPatterns => TypedTable::LoadPatterns(decode_rows(table)?),
            TableKind::AutoSeismic => TypedTable::AutoSeismic(decode_rows(table)?),
            TableKind::LinearStaticCases => TypedTable::LinearStaticCases(decode_rows(table)?),
            TableKind::LoadCombinations => TypedTable::LoadCombinations(decode_rows(table)?),
            TableKind::DesignCombos => TypedTable::DesignCombos(decode_rows(table)?),
        })
    }
}

/// Default field list for a new auto-seismic table
pub fn auto_seismic_fields() -> Vec<String> {
    [
        "Name",
        "IsAuto",
        "XDir",
        "XDirPlusE",
        "XDirMinusE",
        "YDir",
        "YDirPlusE",
        "YDirMinusE",
        "EccRatio",
        "TopStory",
        "BotStory",
        "C",
        "K",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Field lists the snapshot host uses when it has to create a table
pub fn default_fields(key: &str) -> Vec<String> {
    let fields: &[&str] = match key {
        keys::LOAD_PATTERNS => &["Name", "IsAuto", "Type", "SelfWtMult"],
        keys::AUTO_SEISMIC_USER_COEFFICIENT => return auto_seismic_fields(),
        keys::LINEAR_STATIC_CASES => &["Name", "LoadType", "LoadName", "LoadSF"],
        keys::LOAD_COMBINATIONS => &["Name", "Type", "LoadName", "SF"],
        _ => &["ComboType", "ComboName"],
    };
    fields.iter().map(|s| s.to_string()).collect()
}
