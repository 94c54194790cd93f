//! Design combination tables.
//!
//! Each design material has one table listing the combinations used for
//! code checks. Membership is unordered, so a row naming a converted
//! combination is replaced by one row per expansion, without renaming.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::ExpansionMap;
use crate::errors::ExpandResult;
use crate::host::HostModel;
use crate::snapshot::Software;
use crate::tables::schema::{decode_rows, encode_rows, DesignComboRow};
use crate::tables::{keys, RawTable};

/// Design materials that carry a design combination table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DesignMaterial {
    Concrete,
    Steel,
    ShearWall,
    Slab,
}

impl DesignMaterial {
    pub const ALL: [DesignMaterial; 4] = [
        DesignMaterial::Concrete,
        DesignMaterial::Steel,
        DesignMaterial::ShearWall,
        DesignMaterial::Slab,
    ];

    pub fn table_key(&self) -> &'static str {
        match self {
            DesignMaterial::Concrete => keys::CONCRETE_DESIGN_COMBOS,
            DesignMaterial::Steel => keys::STEEL_DESIGN_COMBOS,
            DesignMaterial::ShearWall => keys::SHEARWALL_DESIGN_COMBOS,
            DesignMaterial::Slab => keys::SLAB_DESIGN_COMBOS,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DesignMaterial::Concrete => "concrete",
            DesignMaterial::Steel => "steel",
            DesignMaterial::ShearWall => "shearwall",
            DesignMaterial::Slab => "slab",
        }
    }

    /// Whether the software has a design module for this material
    pub fn available_in(&self, software: Software) -> bool {
        match software {
            Software::Etabs => true,
            Software::Safe => matches!(self, DesignMaterial::Concrete | DesignMaterial::Slab),
            Software::Sap2000 => matches!(self, DesignMaterial::Concrete | DesignMaterial::Steel),
        }
    }

    pub fn for_software(software: Software) -> Vec<DesignMaterial> {
        DesignMaterial::ALL
            .into_iter()
            .filter(|m| m.available_in(software))
            .collect()
    }
}

impl fmt::Display for DesignMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Explode rows naming a converted combination. `None` if no row matched.
pub fn explode_design_rows(
    rows: &[DesignComboRow],
    combos: &ExpansionMap,
) -> Option<Vec<DesignComboRow>> {
    if !rows.iter().any(|r| combos.contains(&r.combo_name)) {
        return None;
    }

    let mut out: Vec<DesignComboRow> = Vec::with_capacity(rows.len());
    for row in rows {
        let exploded = match combos.get(&row.combo_name) {
            Some(exps) => exps
                .iter()
                .map(|e| DesignComboRow {
                    combo_name: e.name.clone(),
                    extra: row.extra.clone(),
                })
                .collect(),
            None => vec![row.clone()],
        };
        for candidate in exploded {
            if !out.contains(&candidate) {
                out.push(candidate);
            }
        }
    }
    Some(out)
}

/// Rewrite the design combination tables of every material the open
/// software supports. Tables that are absent or untouched are left out.
pub fn expand_design_combos<H: HostModel + ?Sized>(
    host: &H,
    combos: &ExpansionMap,
) -> ExpandResult<BTreeMap<DesignMaterial, RawTable>> {
    let mut tables = BTreeMap::new();
    if combos.is_empty() {
        return Ok(tables);
    }

    for material in DesignMaterial::for_software(host.software()) {
        let Some(table) = host.read_table(material.table_key())? else {
            continue;
        };
        let rows = decode_rows::<DesignComboRow>(&table)?;
        match explode_design_rows(&rows, combos) {
            Some(exploded) => {
                tracing::info!(
                    "{} design combinations: {} -> {} row(s)",
                    material,
                    rows.len(),
                    exploded.len()
                );
                tables.insert(material, encode_rows(&table.key, &table.fields, &exploded));
            }
            None => tracing::debug!("{} design combinations reference no converted combination", material),
        }
    }
    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expand::Expansion;
    use crate::host::SnapshotHost;
    use crate::snapshot::ModelSnapshot;

    fn combo_map() -> ExpansionMap {
        let mut map = ExpansionMap::default();
        for name in ["ULS(1/3)", "ULS(2/3)", "ULS(3/3)"] {
            map.push("ULS", Expansion::named(name));
        }
        map
    }

    fn host(software: Software) -> SnapshotHost {
        let mut snapshot = ModelSnapshot::new("Test", software);
        for material in DesignMaterial::ALL {
            snapshot.insert_table(
                material.table_key(),
                &["ComboType", "ComboName"],
                &[&["Strength", "ULS"], &["Strength", "ENV"]],
            );
        }
        SnapshotHost::new(snapshot)
    }

    #[test]
    fn test_availability() {
        assert_eq!(DesignMaterial::for_software(Software::Etabs).len(), 4);
        assert_eq!(
            DesignMaterial::for_software(Software::Safe),
            vec![DesignMaterial::Concrete, DesignMaterial::Slab]
        );
        assert_eq!(
            DesignMaterial::for_software(Software::Sap2000),
            vec![DesignMaterial::Concrete, DesignMaterial::Steel]
        );
    }

    #[test]
    fn test_explode_keeps_other_columns() {
        let rows = vec![DesignComboRow {
            combo_name: "ULS".to_string(),
            extra: [("ComboType".to_string(), "Strength".to_string())].into_iter().collect(),
        }];
        let out = explode_design_rows(&rows, &combo_map()).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[2].combo_name, "ULS(3/3)");
        assert_eq!(out[2].extra, rows[0].extra);
    }

    #[test]
    fn test_no_match_is_none() {
        let rows = vec![DesignComboRow {
            combo_name: "SLS".to_string(),
            extra: Default::default(),
        }];
        assert!(explode_design_rows(&rows, &combo_map()).is_none());
    }

    #[test]
    fn test_tables_follow_software() {
        let tables = expand_design_combos(&host(Software::Safe), &combo_map()).unwrap();
        assert_eq!(tables.keys().copied().collect::<Vec<_>>(), vec![DesignMaterial::Concrete, DesignMaterial::Slab]);

        let concrete = &tables[&DesignMaterial::Concrete];
        assert_eq!(concrete.column("ComboName").unwrap(), vec!["ULS(1/3)", "ULS(2/3)", "ULS(3/3)", "ENV"]);
    }

    #[test]
    fn test_absent_tables_are_omitted() {
        let host = SnapshotHost::new(ModelSnapshot::new("Empty", Software::Etabs));
        assert!(expand_design_combos(&host, &combo_map()).unwrap().is_empty());
    }
}
