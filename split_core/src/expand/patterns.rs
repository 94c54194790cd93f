//! Zip seismic pattern splitting.
//!
//! A zip pattern row is split into one simple row per active flag. The new
//! row is a copy of the zip row (same coefficients, eccentricity and story
//! range) with a single flag set, named after the flag's suffix. Rows split
//! off a drift pattern get the drift prefix and suffix and the drift type.
//!
//! When the model already holds exactly one simple pattern for `XDir`
//! (or `YDir`) in the same drift group, that pattern is reused instead of
//! creating a duplicate, unless the config asks to replace it.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::{Expansion, ExpansionMap};
use crate::config::{CollisionPolicy, ExpandConfig};
use crate::errors::{ExpandError, ExpandResult};
use crate::host::HostModel;
use crate::loads::{Direction, LoadPatternType};
use crate::tables::schema::{decode_rows, encode_rows, LoadPatternRow, SeismicPatternRow};
use crate::tables::{keys, RawTable};

/// Result of splitting the auto-seismic table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternExpansion {
    /// Simple rows only: untouched simple rows first, then split rows
    pub rows: Vec<SeismicPatternRow>,
    pub map: ExpansionMap,
    /// Patterns the split created, in creation order
    pub new_patterns: Vec<(String, LoadPatternType)>,
}

fn pattern_type(drift: bool) -> LoadPatternType {
    if drift {
        LoadPatternType::SeismicDrift
    } else {
        LoadPatternType::Seismic
    }
}

/// The one simple row of a drift group carrying only `direction`, if unique
fn unique_canonical<'a>(
    rows: &'a [SeismicPatternRow],
    drift_names: &HashSet<String>,
    drift: bool,
    direction: Direction,
) -> Option<&'a SeismicPatternRow> {
    let mut matches = rows.iter().filter(|r| {
        r.directions.only() == Some(direction) && drift_names.contains(&r.name) == drift
    });
    let first = matches.next()?;
    match matches.next() {
        Some(_) => None,
        None => Some(first),
    }
}

/// Split zip rows. `Ok(None)` when the table has no zip row.
pub fn expand_patterns(
    rows: &[SeismicPatternRow],
    drift_names: &HashSet<String>,
    config: &ExpandConfig,
) -> ExpandResult<Option<PatternExpansion>> {
    let zip_rows: Vec<&SeismicPatternRow> = rows.iter().filter(|r| r.directions.is_zip()).collect();
    if zip_rows.is_empty() {
        return Ok(None);
    }

    // Canonical patterns a zip row would duplicate and the config replaces
    let mut replaced: Vec<(bool, Direction, &SeismicPatternRow)> = Vec::new();
    for zip in &zip_rows {
        let drift = drift_names.contains(&zip.name);
        for direction in zip.directions.iter().filter(|d| d.is_canonical() && config.replaces(*d)) {
            if let Some(existing) = unique_canonical(rows, drift_names, drift, direction) {
                if !replaced.iter().any(|(g, d, _)| *g == drift && *d == direction) {
                    replaced.push((drift, direction, existing));
                }
            }
        }
    }

    let mut out: Vec<SeismicPatternRow> = rows
        .iter()
        .filter(|r| !r.directions.is_zip())
        .filter(|r| !replaced.iter().any(|(_, _, existing)| existing.name == r.name))
        .cloned()
        .collect();
    let mut map = ExpansionMap::default();
    let mut new_patterns: Vec<(String, LoadPatternType)> = Vec::new();

    for zip in zip_rows {
        let drift = drift_names.contains(&zip.name);
        let load_type = pattern_type(drift);

        for direction in zip.directions.iter() {
            if direction.is_canonical() && !config.replaces(direction) {
                if let Some(existing) = unique_canonical(rows, drift_names, drift, direction) {
                    tracing::debug!(
                        "{}: reusing existing {} pattern '{}'",
                        zip.name,
                        direction,
                        existing.name
                    );
                    map.push(&zip.name, Expansion::new(&existing.name, Some(load_type)));
                    continue;
                }
            }

            let name = config.split_name(direction, drift);
            let row = zip.split(&name, direction);
            match out.iter().position(|r| r.name == name) {
                Some(position) if out[position] == row => {}
                Some(position) => match config.on_name_collision {
                    CollisionPolicy::LastWins => {
                        tracing::warn!("Pattern '{}' from '{}' overwrites an earlier definition", name, zip.name);
                        out[position] = row;
                    }
                    CollisionPolicy::Reject => {
                        return Err(ExpandError::name_collision("pattern", name));
                    }
                },
                None => out.push(row),
            }

            if !new_patterns.iter().any(|(n, _)| *n == name) {
                new_patterns.push((name.clone(), load_type));
            }
            map.push(&zip.name, Expansion::new(&name, Some(load_type)));

            if let Some((_, _, existing)) = replaced
                .iter()
                .find(|(g, d, _)| *g == drift && *d == direction)
            {
                if existing.name != name {
                    map.push(&existing.name, Expansion::new(&name, Some(load_type)));
                }
            }
        }
    }

    Ok(Some(PatternExpansion {
        rows: out,
        map,
        new_patterns,
    }))
}

/// Names of all patterns of type `Seismic (Drift)`
pub fn drift_load_pattern_names<H: HostModel + ?Sized>(host: &H) -> ExpandResult<HashSet<String>> {
    let Some(table) = host.read_table(keys::LOAD_PATTERNS)? else {
        return Ok(HashSet::new());
    };
    Ok(decode_rows::<LoadPatternRow>(&table)?
        .into_iter()
        .filter(|r| r.load_type() == Some(LoadPatternType::SeismicDrift))
        .map(|r| r.name)
        .collect())
}

/// Read the auto-seismic table, split its zip rows and register the new
/// patterns with the host.
///
/// Returns the table to write back together with the split details, or
/// `Ok(None)` when the table is absent or holds no zip row; in that case
/// the model is not touched.
pub fn expand_seismic_load_patterns<H: HostModel + ?Sized>(
    host: &mut H,
    config: &ExpandConfig,
) -> ExpandResult<Option<(RawTable, PatternExpansion)>> {
    let Some(table) = host.read_table(keys::AUTO_SEISMIC_USER_COEFFICIENT)? else {
        tracing::info!("No auto seismic user coefficient table in the model");
        return Ok(None);
    };
    let rows = decode_rows::<SeismicPatternRow>(&table)?;
    let drift_names = drift_load_pattern_names(host)?;

    let Some(expansion) = expand_patterns(&rows, &drift_names, config)? else {
        tracing::info!("No seismic load pattern with more than one direction");
        return Ok(None);
    };

    host.unlock()?;
    for (name, load_type) in &expansion.new_patterns {
        host.add_load_pattern(name, *load_type, 0.0, true)?;
    }
    tracing::info!(
        "Split {} zip pattern(s) into {} new pattern(s)",
        expansion.map.len(),
        expansion.new_patterns.len()
    );

    let out = encode_rows(&table.key, &table.fields, &expansion.rows);
    Ok(Some((out, expansion)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::SnapshotHost;
    use crate::loads::DirectionSet;
    use crate::snapshot::{ModelSnapshot, Software};
    use crate::tables::schema::ExtraColumns;

    fn row(name: &str, directions: &[Direction]) -> SeismicPatternRow {
        let mut extra = ExtraColumns::new();
        extra.insert("EccRatio".to_string(), "0.05".to_string());
        extra.insert("C".to_string(), format!("0.1{}", name.len()));
        SeismicPatternRow {
            name: name.to_string(),
            directions: directions.iter().copied().collect::<DirectionSet>(),
            extra,
        }
    }

    const X_ALL: [Direction; 3] = [Direction::XDir, Direction::XDirPlusE, Direction::XDirMinusE];
    const Y_ALL: [Direction; 3] = [Direction::YDir, Direction::YDirPlusE, Direction::YDirMinusE];

    fn drift(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn names(rows: &[SeismicPatternRow]) -> Vec<&str> {
        rows.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn test_no_zip_rows_is_noop() {
        let rows = vec![row("EX", &[Direction::XDir]), row("EY", &[Direction::YDir])];
        let result = expand_patterns(&rows, &HashSet::new(), &ExpandConfig::default()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_four_zip_patterns_make_twelve_rows() {
        let rows = vec![
            row("EXALL", &X_ALL),
            row("EYALL", &Y_ALL),
            row("EXDRIFT", &X_ALL),
            row("EYDRIFT", &Y_ALL),
        ];
        let expansion = expand_patterns(&rows, &drift(&["EXDRIFT", "EYDRIFT"]), &ExpandConfig::default())
            .unwrap()
            .unwrap();

        assert_eq!(expansion.rows.len(), 12);
        assert!(expansion.rows.iter().all(|r| r.directions.is_simple()));
        assert_eq!(expansion.map.keys().collect::<Vec<_>>(), vec!["EXALL", "EYALL", "EXDRIFT", "EYDRIFT"]);
        assert_eq!(expansion.map.names("EXALL"), vec!["EX", "EXP", "EXN"]);
        assert_eq!(expansion.map.names("EYDRIFT"), vec!["EY_DRIFT", "EYP_DRIFT", "EYN_DRIFT"]);
        assert_eq!(
            expansion.map.get("EXDRIFT").unwrap()[0].load_type,
            Some(LoadPatternType::SeismicDrift)
        );
        assert_eq!(expansion.new_patterns.len(), 12);
    }

    #[test]
    fn test_simple_rows_pass_through_unchanged() {
        let simple = row("WX", &[Direction::XDirPlusE]);
        let rows = vec![simple.clone(), row("EYALL", &Y_ALL)];
        let expansion = expand_patterns(&rows, &HashSet::new(), &ExpandConfig::default())
            .unwrap()
            .unwrap();

        assert_eq!(expansion.rows[0], simple);
        assert_eq!(names(&expansion.rows), vec!["WX", "EY", "EYP", "EYN"]);
    }

    #[test]
    fn test_split_rows_copy_zip_columns() {
        let zip = row("EXALL", &X_ALL);
        let expansion = expand_patterns(&[zip.clone()], &HashSet::new(), &ExpandConfig::default())
            .unwrap()
            .unwrap();
        for split in &expansion.rows {
            assert_eq!(split.extra, zip.extra);
        }
        assert_eq!(expansion.rows[1].directions.only(), Some(Direction::XDirPlusE));
    }

    #[test]
    fn test_existing_canonical_is_reused() {
        let rows = vec![row("QX", &[Direction::XDir]), row("EXALL", &X_ALL)];
        let expansion = expand_patterns(&rows, &HashSet::new(), &ExpandConfig::default())
            .unwrap()
            .unwrap();

        // k = 3 flags, one skipped duplicate
        assert_eq!(names(&expansion.rows), vec!["QX", "EXP", "EXN"]);
        assert_eq!(expansion.map.names("EXALL"), vec!["QX", "EXP", "EXN"]);
        assert!(!expansion.new_patterns.iter().any(|(n, _)| n == "QX"));
    }

    #[test]
    fn test_ambiguous_canonical_is_not_reused() {
        let rows = vec![
            row("QX1", &[Direction::XDir]),
            row("QX2", &[Direction::XDir]),
            row("EXALL", &X_ALL),
        ];
        let expansion = expand_patterns(&rows, &HashSet::new(), &ExpandConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(names(&expansion.rows), vec!["QX1", "QX2", "EX", "EXP", "EXN"]);
    }

    #[test]
    fn test_replace_ex_removes_existing_canonical() {
        let rows = vec![
            row("QX", &[Direction::XDir]),
            row("QY", &[Direction::YDir]),
            row("EALL", &[Direction::XDir, Direction::YDir]),
        ];
        let config = ExpandConfig {
            replace_ex: true,
            ..ExpandConfig::default()
        };
        let expansion = expand_patterns(&rows, &HashSet::new(), &config).unwrap().unwrap();

        assert_eq!(names(&expansion.rows), vec!["QY", "EX"]);
        assert_eq!(expansion.map.names("EALL"), vec!["EX", "QY"]);
        assert_eq!(expansion.map.names("QX"), vec!["EX"]);
    }

    #[test]
    fn test_drift_group_is_separate() {
        let rows = vec![row("QX", &[Direction::XDir]), row("EXDRIFT", &X_ALL)];
        let expansion = expand_patterns(&rows, &drift(&["EXDRIFT"]), &ExpandConfig::default())
            .unwrap()
            .unwrap();
        // QX is a strength pattern, so the drift split still gets its own X row
        assert_eq!(names(&expansion.rows), vec!["QX", "EX_DRIFT", "EXP_DRIFT", "EXN_DRIFT"]);
    }

    #[test]
    fn test_collision_last_wins() {
        let first = row("EX1", &[Direction::XDir, Direction::YDir]);
        let second = row("EX22", &[Direction::XDir, Direction::YDir]);
        let expansion = expand_patterns(&[first, second.clone()], &HashSet::new(), &ExpandConfig::default())
            .unwrap()
            .unwrap();

        assert_eq!(names(&expansion.rows), vec!["EX", "EY"]);
        assert_eq!(expansion.rows[0].extra, second.extra);
        assert_eq!(expansion.map.names("EX1"), vec!["EX", "EY"]);
        assert_eq!(expansion.map.names("EX22"), vec!["EX", "EY"]);
    }

    #[test]
    fn test_collision_reject() {
        let rows = vec![
            row("EX1", &[Direction::XDir, Direction::YDir]),
            row("EX22", &[Direction::XDir, Direction::YDir]),
        ];
        let config = ExpandConfig {
            on_name_collision: CollisionPolicy::Reject,
            ..ExpandConfig::default()
        };
        assert_eq!(
            expand_patterns(&rows, &HashSet::new(), &config),
            Err(ExpandError::name_collision("pattern", "EX"))
        );
    }

    #[test]
    fn test_host_registers_new_patterns() {
        let mut snapshot = ModelSnapshot::new("Test", Software::Etabs);
        snapshot.insert_table(
            keys::LOAD_PATTERNS,
            &["Name", "Type", "SelfWtMult"],
            &[&["DEAD", "Dead", "1"], &["EXALL", "Seismic", "0"]],
        );
        snapshot.insert_table(
            keys::AUTO_SEISMIC_USER_COEFFICIENT,
            &["Name", "XDir", "XDirPlusE", "XDirMinusE", "YDir", "YDirPlusE", "YDirMinusE", "EccRatio"],
            &[&["EXALL", "Yes", "Yes", "Yes", "No", "No", "No", "0.05"]],
        );
        let mut host = SnapshotHost::new(snapshot);
        host.run_analysis().unwrap();

        let (table, expansion) = expand_seismic_load_patterns(&mut host, &ExpandConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(table.column("Name").unwrap(), vec!["EX", "EXP", "EXN"]);
        assert_eq!(table.value(1, "XDirPlusE"), Some("Yes"));
        assert_eq!(table.value(1, "XDir"), Some("No"));
        assert_eq!(expansion.new_patterns.len(), 3);

        let patterns = host.read_table(keys::LOAD_PATTERNS).unwrap().unwrap();
        assert_eq!(patterns.column("Name").unwrap(), vec!["DEAD", "EXALL", "EX", "EXP", "EXN"]);
        assert_eq!(patterns.value(2, "Type"), Some("Seismic"));
    }

    #[test]
    fn test_host_without_zip_rows_is_untouched() {
        let mut snapshot = ModelSnapshot::new("Test", Software::Etabs);
        snapshot.insert_table(
            keys::AUTO_SEISMIC_USER_COEFFICIENT,
            &["Name", "XDir", "XDirPlusE", "XDirMinusE", "YDir", "YDirPlusE", "YDirMinusE"],
            &[&["EX", "Yes", "No", "No", "No", "No", "No"]],
        );
        let mut host = SnapshotHost::new(snapshot);
        let before = host.snapshot().tables.clone();

        assert!(expand_seismic_load_patterns(&mut host, &ExpandConfig::default())
            .unwrap()
            .is_none());
        assert_eq!(host.snapshot().tables, before);
    }
}
