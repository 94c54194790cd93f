//! Linear static load case expansion.
//!
//! A case that loads a split pattern is replaced by one case per element of
//! the cartesian product of the expansions of every such load. Clones are
//! named after their loads, e.g. `DEAD-0.3EXP`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::naming::case_name;
use super::{group_by_name, product_indices, Expansion, ExpansionMap};
use crate::config::{CollisionPolicy, ExpandConfig};
use crate::errors::{ExpandError, ExpandResult};
use crate::host::HostModel;
use crate::loads::CaseLoad;
use crate::tables::schema::{decode_rows, encode_rows, LoadCaseRow};
use crate::tables::{keys, RawTable};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseExpansion {
    pub rows: Vec<LoadCaseRow>,
    pub map: ExpansionMap,
}

/// All rows of one case, in table order
#[derive(Debug, Clone)]
struct CaseDef {
    name: String,
    rows: Vec<LoadCaseRow>,
}

/// Group rows by case name in first-appearance order.
pub(crate) fn group_cases(rows: &[LoadCaseRow]) -> Vec<(String, Vec<LoadCaseRow>)> {
    group_by_name(rows, |r| r.name.as_str())
        .into_iter()
        .map(|(name, members)| (name.to_string(), members.into_iter().cloned().collect()))
        .collect()
}

/// Cases in output order, with a name index for collision checks
#[derive(Default)]
struct CaseList {
    cases: Vec<CaseDef>,
    index: HashMap<String, usize>,
}

/// Loads of one case as the host's per-case API takes them.
pub fn case_loads(rows: &[LoadCaseRow]) -> ExpandResult<Vec<CaseLoad>> {
    rows.iter()
        .map(|r| {
            Ok(CaseLoad {
                load_type: r.load_type.clone(),
                name: r.load_name.clone(),
                scale_factor: r.scale()?,
            })
        })
        .collect()
}

/// Add a case to the output, resolving a clash with an earlier case of the
/// same name.
fn place(out: &mut CaseList, case: CaseDef, policy: CollisionPolicy) -> ExpandResult<()> {
    let Some(&position) = out.index.get(&case.name) else {
        out.index.insert(case.name.clone(), out.cases.len());
        out.cases.push(case);
        return Ok(());
    };
    let existing = &mut out.cases[position];
    if case_loads(&existing.rows)? == case_loads(&case.rows)? {
        tracing::debug!("Case '{}' already exists with the same loads", case.name);
        return Ok(());
    }
    match policy {
        CollisionPolicy::LastWins => {
            tracing::warn!("Case '{}' overwrites an earlier definition", case.name);
            existing.rows = case.rows;
            Ok(())
        }
        CollisionPolicy::Reject => Err(ExpandError::name_collision("case", case.name)),
    }
}

/// Expand decoded case rows against the pattern map.
pub fn expand_case_rows(
    rows: &[LoadCaseRow],
    patterns: &ExpansionMap,
    policy: CollisionPolicy,
) -> ExpandResult<CaseExpansion> {
    let mut out = CaseList::default();
    let mut map = ExpansionMap::default();

    for (name, members) in group_cases(rows) {
        let zip_positions: Vec<usize> = members
            .iter()
            .enumerate()
            .filter(|(_, r)| r.applies_pattern() && patterns.contains(&r.load_name))
            .map(|(i, _)| i)
            .collect();

        if zip_positions.is_empty() {
            place(&mut out, CaseDef { name, rows: members }, policy)?;
            continue;
        }

        let choices: Vec<&[Expansion]> = zip_positions
            .iter()
            .map(|&p| patterns.get(&members[p].load_name).unwrap_or_default())
            .collect();
        let lengths: Vec<usize> = choices.iter().map(|c| c.len()).collect();

        for indices in product_indices(&lengths) {
            let mut clone = members.clone();
            for (slot, &position) in zip_positions.iter().enumerate() {
                clone[position].load_name = choices[slot][indices[slot]].name.clone();
            }

            let scales = clone.iter().map(|r| r.scale()).collect::<ExpandResult<Vec<f64>>>()?;
            let terms: Vec<(f64, &str)> = scales
                .iter()
                .zip(clone.iter())
                .map(|(scale, r)| (*scale, r.load_name.as_str()))
                .collect();
            let new_name = case_name(&terms);
            for row in &mut clone {
                row.name = new_name.clone();
            }

            let load_type = match choices.as_slice() {
                [single] => single[indices[0]].load_type,
                _ => None,
            };
            tracing::debug!("Case '{}' -> '{}'", name, new_name);
            map.push(&name, Expansion::new(&new_name, load_type));
            place(
                &mut out,
                CaseDef {
                    name: new_name,
                    rows: clone,
                },
                policy,
            )?;
        }
    }

    Ok(CaseExpansion {
        rows: out.cases.into_iter().flat_map(|c| c.rows).collect(),
        map,
    })
}

/// Read the linear static case table and expand it against the pattern map.
///
/// `Ok(None)` when the model has no linear static cases.
pub fn expand_loadcases<H: HostModel + ?Sized>(
    host: &H,
    patterns: &ExpansionMap,
    config: &ExpandConfig,
) -> ExpandResult<Option<(RawTable, CaseExpansion)>> {
    let Some(table) = host.read_table(keys::LINEAR_STATIC_CASES)? else {
        tracing::info!("No linear static load cases in the model");
        return Ok(None);
    };
    let rows = decode_rows::<LoadCaseRow>(&table)?;
    let expansion = expand_case_rows(&rows, patterns, config.on_name_collision)?;
    tracing::info!(
        "Expanded {} load case(s) into {} row(s)",
        expansion.map.len(),
        expansion.rows.len()
    );

    let out = encode_rows(&table.key, &table.fields, &expansion.rows);
    Ok(Some((out, expansion)))
}
