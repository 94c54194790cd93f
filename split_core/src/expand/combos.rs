//! Load combination expansion.
//!
//! `Linear Add` combinations are ordered sums, so a combination that
//! references an expanded case is cloned once per expansion and the clones
//! are numbered: `ULS1` becomes `ULS1(1/3)`, `ULS1(2/3)`, `ULS1(3/3)`. A clone
//! may itself be referenced by another linear combination, so the linear
//! expansion repeats until a round converts nothing.
//!
//! `Envelope` combinations are unordered sets. A reference to an expanded
//! name is replaced by all of its expansions in place, without renaming.
//!
//! Other combination types are left as they are.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::naming::combo_clone_name;
use super::{group_by_name, product_indices, Expansion, ExpansionMap};
use crate::config::ExpandConfig;
use crate::errors::{ExpandError, ExpandResult};
use crate::host::HostModel;
use crate::loads::ComboType;
use crate::tables::schema::{decode_rows, LoadComboRow};
use crate::tables::{keys, RawTable};

/// Result of the linear fixed point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComboExpansion {
    /// The whole combination table after the last round
    pub rows: Vec<LoadComboRow>,
    /// Union of every round's conversions, flattened
    pub map: ExpansionMap,
    /// Rounds that converted at least one combination
    pub rounds: usize,
}

fn group_combos(rows: &[LoadComboRow]) -> Vec<(&str, Vec<&LoadComboRow>)> {
    group_by_name(rows, |r| r.name.as_str())
}

/// One round of linear expansion.
///
/// A combination referencing expanded names is cloned once per element of
/// the cartesian product of their expansions, the first referenced name
/// varying slowest. Members naming the same key take the same expansion in
/// a clone. Returns the new combination rows and the conversions made in
/// this round. When every referenced name has a single expansion the
/// references are substituted in place and the combination keeps its name;
/// that is not a conversion.
pub fn expand_linear_loadcombos(
    rows: &[LoadComboRow],
    expanded: &ExpansionMap,
) -> (Vec<LoadComboRow>, ExpansionMap) {
    let mut out = Vec::with_capacity(rows.len());
    let mut converted = ExpansionMap::default();

    for (name, members) in group_combos(rows) {
        let mut keys: Vec<(&str, &[Expansion])> = Vec::new();
        let slots: Vec<Option<usize>> = members
            .iter()
            .map(|&r| {
                let exps = expanded.get(&r.load_name).filter(|exps| !exps.is_empty())?;
                match keys.iter().position(|(key, _)| *key == r.load_name) {
                    Some(slot) => Some(slot),
                    None => {
                        keys.push((r.load_name.as_str(), exps));
                        Some(keys.len() - 1)
                    }
                }
            })
            .collect();
        let combo_type = members[0].combo_type.clone();

        if keys.is_empty() || combo_type == ComboType::Envelope {
            out.extend(members.into_iter().cloned());
            continue;
        }
        if combo_type != ComboType::LinearAdd {
            tracing::warn!(
                "Combination '{}' ({}) references an expanded load; left unchanged",
                name,
                combo_type
            );
            out.extend(members.into_iter().cloned());
            continue;
        }

        let lengths: Vec<usize> = keys.iter().map(|(_, exps)| exps.len()).collect();
        let tuples = product_indices(&lengths);
        let count = tuples.len();
        let substitute = |member: &LoadComboRow, slot: Option<usize>, indices: &[usize]| {
            let mut row = member.clone();
            if let Some(slot) = slot {
                row.load_name = keys[slot].1[indices[slot]].name.clone();
            }
            row
        };

        if count == 1 {
            for (&member, slot) in members.iter().zip(&slots) {
                out.push(substitute(member, *slot, tuples[0].as_slice()));
            }
            continue;
        }

        for (k, indices) in tuples.iter().enumerate() {
            let clone_name = combo_clone_name(name, k + 1, count);
            for (&member, slot) in members.iter().zip(&slots) {
                let mut row = substitute(member, *slot, indices.as_slice());
                row.name = clone_name.clone();
                out.push(row);
            }
            converted.push(name, Expansion::named(clone_name));
        }
        tracing::debug!("Combination '{}' split into {} clones", name, count);
    }

    (out, converted)
}

fn envelope_key(row: &LoadComboRow) -> (String, String, String) {
    (row.name.clone(), row.load_name.clone(), row.scale_factor.clone())
}

/// Explode envelope members that are keys of `expanded`.
///
/// Every other row is returned unchanged, repeated members included. A row
/// produced by an explosion is dropped when the same envelope already lists
/// that member with the same scale factor.
pub fn expand_envelop_loadcombos(rows: &[LoadComboRow], expanded: &ExpansionMap) -> Vec<LoadComboRow> {
    let is_exploded = |row: &LoadComboRow| row.combo_type == ComboType::Envelope && expanded.contains(&row.load_name);
    let mut seen: HashSet<(String, String, String)> = rows
        .iter()
        .filter(|&r| r.combo_type == ComboType::Envelope && !is_exploded(r))
        .map(envelope_key)
        .collect();

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(exps) = expanded.get(&row.load_name).filter(|_| is_exploded(row)) else {
            out.push(row.clone());
            continue;
        };
        for e in exps {
            let member = LoadComboRow {
                load_name: e.name.clone(),
                ..row.clone()
            };
            if seen.insert(envelope_key(&member)) {
                out.push(member);
            }
        }
    }
    out
}

/// First combination reference cycle found, as `A -> B -> A`.
fn find_cycle(rows: &[LoadComboRow]) -> Option<Vec<String>> {
    let groups = group_combos(rows);
    let names: HashSet<&str> = groups.iter().map(|(name, _)| *name).collect();
    let mut graph: HashMap<&str, Vec<&str>> = HashMap::new();
    for (name, members) in &groups {
        let mut targets: Vec<&str> = Vec::new();
        for member in members {
            let target = member.load_name.as_str();
            if names.contains(target) && !targets.contains(&target) {
                targets.push(target);
            }
        }
        graph.insert(*name, targets);
    }

    let mut done = HashSet::new();
    let mut stack = Vec::new();
    groups
        .iter()
        .find_map(|(name, _)| visit(*name, &graph, &mut stack, &mut done))
}

fn visit<'a>(
    node: &'a str,
    graph: &HashMap<&'a str, Vec<&'a str>>,
    stack: &mut Vec<&'a str>,
    done: &mut HashSet<&'a str>,
) -> Option<Vec<String>> {
    if done.contains(node) {
        return None;
    }
    if let Some(start) = stack.iter().position(|n| *n == node) {
        let mut path: Vec<String> = stack[start..].iter().map(|n| n.to_string()).collect();
        path.push(node.to_string());
        return Some(path);
    }

    stack.push(node);
    let targets = graph.get(node).map(Vec::as_slice).unwrap_or_default();
    for target in targets {
        if let Some(path) = visit(*target, graph, stack, done) {
            return Some(path);
        }
    }
    stack.pop();
    done.insert(node);
    None
}

/// Run the linear expansion to a fixed point.
///
/// Round 1 substitutes the case map; every later round substitutes the
/// clones made by the round before. Stops when a round converts nothing.
/// At most `config.max_rounds` rounds may convert.
pub fn expand_loadcombos(
    rows: &[LoadComboRow],
    case_map: &ExpansionMap,
    config: &ExpandConfig,
) -> ExpandResult<ComboExpansion> {
    if let Some(path) = find_cycle(rows) {
        return Err(ExpandError::ReferenceCycle { path });
    }

    let mut current = rows.to_vec();
    let mut frontier = case_map.clone();
    let mut combined = ExpansionMap::default();
    let mut rounds = 0;

    while !frontier.is_empty() {
        let (next, converted) = expand_linear_loadcombos(&current, &frontier);
        current = next;
        if converted.is_empty() {
            break;
        }
        rounds += 1;
        tracing::debug!("Round {}: {} combination(s) converted", rounds, converted.len());
        if rounds > config.max_rounds {
            return Err(ExpandError::FixedPointNotReached {
                rounds: config.max_rounds,
            });
        }
        combined.extend(&converted);
        frontier = converted;
    }

    Ok(ComboExpansion {
        rows: current,
        map: combined.flattened(),
        rounds,
    })
}

/// Names an envelope member may be replaced by: the case map plus the
/// flattened combination map.
pub fn envelope_lookup(case_map: &ExpansionMap, combo_map: &ExpansionMap) -> ExpansionMap {
    let mut lookup = case_map.clone();
    lookup.extend(&combo_map.flattened());
    lookup
}

/// Read and decode the combination table. `Ok(None)` when there is none.
pub fn read_loadcombos<H: HostModel + ?Sized>(
    host: &H,
) -> ExpandResult<Option<(RawTable, Vec<LoadComboRow>)>> {
    let Some(table) = host.read_table(keys::LOAD_COMBINATIONS)? else {
        tracing::info!("No load combinations in the model");
        return Ok(None);
    };
    let rows = decode_rows::<LoadComboRow>(&table)?;
    Ok(Some((table, rows)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn combo(name: &str, combo_type: ComboType, members: &[(&str, &str)]) -> Vec<LoadComboRow> {
        members
            .iter()
            .map(|(load, sf)| LoadComboRow {
                name: name.to_string(),
                combo_type: combo_type.clone(),
                load_name: load.to_string(),
                scale_factor: sf.to_string(),
                extra: Default::default(),
            })
            .collect()
    }

    /// `("A", "A1 A2")` maps A to [A1, A2]
    fn map_of(entries: &[(&str, &str)]) -> ExpansionMap {
        let mut map = ExpansionMap::default();
        for (key, values) in entries {
            for value in values.split_whitespace() {
                map.push(key, Expansion::named(value));
            }
        }
        map
    }

    fn case_map() -> ExpansionMap {
        map_of(&[("EXALL", "EX EXP EXN"), ("EYALL", "EY EYP EYN")])
    }

    fn combo_names(rows: &[LoadComboRow]) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for row in rows {
            if !names.contains(&row.name.as_str()) {
                names.push(&row.name);
            }
        }
        names
    }

    #[test]
    fn test_linear_clones() {
        let rows = combo("ULS", ComboType::LinearAdd, &[("DEAD", "1.2"), ("EXALL", "1")]);
        let (out, converted) = expand_linear_loadcombos(&rows, &case_map());

        assert_eq!(combo_names(&out), vec!["ULS(1/3)", "ULS(2/3)", "ULS(3/3)"]);
        assert_eq!(out.len(), 6);
        assert_eq!(out[2].load_name, "DEAD");
        assert_eq!(out[3].load_name, "EXP");
        assert_eq!(out[3].scale_factor, "1");
        assert_eq!(converted.names("ULS"), vec!["ULS(1/3)", "ULS(2/3)", "ULS(3/3)"]);
    }

    #[test]
    fn test_two_references_multiply() {
        let map = map_of(&[("EXALL", "EX EXP EXN"), ("EYALL", "EY EYP")]);
        let rows = combo("ORTH", ComboType::LinearAdd, &[("EXALL", "1"), ("EYALL", "0.3")]);
        let (out, converted) = expand_linear_loadcombos(&rows, &map);

        assert_eq!(converted.names("ORTH").len(), 6);
        assert_eq!(converted.names("ORTH")[0], "ORTH(1/6)");
        let pairs: Vec<String> = out
            .chunks(2)
            .map(|pair| format!("{}={}+{}", pair[0].name, pair[0].load_name, pair[1].load_name))
            .collect();
        assert_eq!(
            pairs,
            vec![
                "ORTH(1/6)=EX+EY",
                "ORTH(2/6)=EX+EYP",
                "ORTH(3/6)=EXP+EY",
                "ORTH(4/6)=EXP+EYP",
                "ORTH(5/6)=EXN+EY",
                "ORTH(6/6)=EXN+EYP",
            ]
        );
        assert!(out.iter().step_by(2).all(|r| r.scale_factor == "1"));
        assert!(out.iter().skip(1).step_by(2).all(|r| r.scale_factor == "0.3"));
    }

    #[test]
    fn test_repeated_reference_takes_one_expansion() {
        let map = map_of(&[("EXALL", "EX EXP")]);
        let rows = combo("C", ComboType::LinearAdd, &[("EXALL", "1"), ("DEAD", "1"), ("EXALL", "0.5")]);
        let (out, _) = expand_linear_loadcombos(&rows, &map);

        let loads: Vec<&str> = out.iter().map(|r| r.load_name.as_str()).collect();
        assert_eq!(loads, vec!["EX", "DEAD", "EX", "EXP", "DEAD", "EXP"]);
        assert_eq!(combo_names(&out), vec!["C(1/2)", "C(2/2)"]);
    }

    #[test]
    fn test_single_expansion_substitutes_in_place() {
        let map = map_of(&[("OLD", "NEW")]);
        let rows = combo("C", ComboType::LinearAdd, &[("OLD", "1.5")]);
        let (out, converted) = expand_linear_loadcombos(&rows, &map);

        assert_eq!(out[0].name, "C");
        assert_eq!(out[0].load_name, "NEW");
        assert!(converted.is_empty());
    }

    #[test]
    fn test_other_types_pass_through() {
        let mut rows = combo("S", ComboType::Srss, &[("EXALL", "1")]);
        rows.extend(combo("E", ComboType::Envelope, &[("EXALL", "1")]));
        let (out, converted) = expand_linear_loadcombos(&rows, &case_map());
        assert_eq!(out, rows);
        assert!(converted.is_empty());
    }

    #[test]
    fn test_fixed_point_chains() {
        let mut rows = combo("C1", ComboType::LinearAdd, &[("EXALL", "1")]);
        rows.extend(combo("C2", ComboType::LinearAdd, &[("C1", "1"), ("DEAD", "1")]));
        rows.extend(combo("C3", ComboType::LinearAdd, &[("C2", "0.5")]));

        let expansion = expand_loadcombos(&rows, &case_map(), &ExpandConfig::default()).unwrap();
        assert_eq!(expansion.rounds, 3);
        assert_eq!(expansion.map.names("C3"), vec!["C3(1/3)", "C3(2/3)", "C3(3/3)"]);
        assert_eq!(expansion.rows.iter().filter(|r| r.name.starts_with("C2(")).count(), 6);

        // No combination still references a converted name
        for row in &expansion.rows {
            assert!(!expansion.map.contains(&row.load_name));
            assert!(!case_map().contains(&row.load_name));
        }
        for key in expansion.map.keys() {
            for name in expansion.map.names(key) {
                assert!(!expansion.map.contains(name));
            }
        }
    }

    #[test]
    fn test_nothing_to_convert() {
        let rows = combo("C", ComboType::LinearAdd, &[("DEAD", "1")]);
        let expansion = expand_loadcombos(&rows, &case_map(), &ExpandConfig::default()).unwrap();
        assert_eq!(expansion.rows, rows);
        assert_eq!(expansion.rounds, 0);
        assert!(expansion.map.is_empty());
    }

    #[test]
    fn test_cycle_is_rejected() {
        let mut rows = combo("A", ComboType::LinearAdd, &[("B", "1")]);
        rows.extend(combo("B", ComboType::LinearAdd, &[("EXALL", "1"), ("A", "1")]));

        assert_eq!(
            expand_loadcombos(&rows, &case_map(), &ExpandConfig::default()),
            Err(ExpandError::ReferenceCycle {
                path: vec!["A".to_string(), "B".to_string(), "A".to_string()]
            })
        );
    }

    #[test]
    fn test_single_round_budget_is_enough_without_chains() {
        let rows = combo("ULS", ComboType::LinearAdd, &[("EXALL", "1")]);
        let map = map_of(&[("EXALL", "EX EXP")]);
        let config = ExpandConfig {
            max_rounds: 1,
            ..ExpandConfig::default()
        };

        let expansion = expand_loadcombos(&rows, &map, &config).unwrap();
        assert_eq!(expansion.rounds, 1);
        assert_eq!(expansion.map.names("ULS"), vec!["ULS(1/2)", "ULS(2/2)"]);
    }

    #[test]
    fn test_in_place_substitution_survives_the_last_round() {
        let rows = combo("C", ComboType::LinearAdd, &[("OLD", "1")]);
        let expansion = expand_loadcombos(&rows, &map_of(&[("OLD", "NEW")]), &ExpandConfig::default()).unwrap();
        assert_eq!(expansion.rounds, 0);
        assert_eq!(expansion.rows[0].load_name, "NEW");
    }

    #[test]
    fn test_round_limit() {
        let mut rows = combo("C1", ComboType::LinearAdd, &[("EXALL", "1")]);
        rows.extend(combo("C2", ComboType::LinearAdd, &[("C1", "1")]));
        let config = ExpandConfig {
            max_rounds: 1,
            ..ExpandConfig::default()
        };
        assert_eq!(
            expand_loadcombos(&rows, &case_map(), &config),
            Err(ExpandError::FixedPointNotReached { rounds: 1 })
        );
    }

    #[test]
    fn test_envelope_three_keys_nine_rows() {
        let map = map_of(&[("A", "A1 A2 A3"), ("B", "B1 B2 B3"), ("C", "C1 C2 C3")]);
        let rows = combo("ENV", ComboType::Envelope, &[("A", "1"), ("B", "1"), ("C", "1")]);
        let out = expand_envelop_loadcombos(&rows, &map);

        assert_eq!(out.len(), 9);
        assert!(out.iter().all(|r| r.name == "ENV"));
        assert_eq!(out[4].load_name, "B2");
    }

    #[test]
    fn test_envelope_order_independent() {
        let map = case_map();
        let rows = combo("ENV", ComboType::Envelope, &[("EXALL", "1"), ("DEAD", "1"), ("EX", "1")]);
        let mut reversed = rows.clone();
        reversed.reverse();

        let mut first: Vec<String> = expand_envelop_loadcombos(&rows, &map)
            .into_iter()
            .map(|r| r.load_name)
            .collect();
        let mut second: Vec<String> = expand_envelop_loadcombos(&reversed, &map)
            .into_iter()
            .map(|r| r.load_name)
            .collect();
        first.sort();
        second.sort();
        assert_eq!(first, second);
        // EX is listed once even though EXALL expands to it too
        assert_eq!(first, vec!["DEAD", "EX", "EXN", "EXP"]);
    }

    #[test]
    fn test_envelope_keeps_members_listed_twice() {
        let rows = combo("ENV", ComboType::Envelope, &[("DEAD", "1"), ("DEAD", "1"), ("EXALL", "1")]);
        let out = expand_envelop_loadcombos(&rows, &case_map());

        let loads: Vec<&str> = out.iter().map(|r| r.load_name.as_str()).collect();
        assert_eq!(loads, vec!["DEAD", "DEAD", "EX", "EXP", "EXN"]);
    }

    #[test]
    fn test_envelope_of_linear_clones() {
        let mut rows = combo("ULS", ComboType::LinearAdd, &[("DEAD", "1.2"), ("EXALL", "1")]);
        rows.extend(combo("ENV", ComboType::Envelope, &[("ULS", "1"), ("LIVE", "1")]));

        let linear = expand_loadcombos(&rows, &case_map(), &ExpandConfig::default()).unwrap();
        let lookup = envelope_lookup(&case_map(), &linear.map);
        let out = expand_envelop_loadcombos(&linear.rows, &lookup);

        let envelope: Vec<&str> = out
            .iter()
            .filter(|r| r.name == "ENV")
            .map(|r| r.load_name.as_str())
            .collect();
        assert_eq!(envelope, vec!["ULS(1/3)", "ULS(2/3)", "ULS(3/3)", "LIVE"]);
    }
}
