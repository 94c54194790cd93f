//! Seismic direction / eccentricity flags
//!
//! An auto-seismic pattern carries six Yes/No flags. A pattern with one flag
//! set is "simple"; a pattern with several is a "zip" pattern that stands
//! for several simple patterns at once.

use serde::{Deserialize, Serialize};

/// One of the six auto-seismic direction flags, in table column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    XDir,
    XDirPlusE,
    XDirMinusE,
    YDir,
    YDirPlusE,
    YDirMinusE,
}

impl Direction {
    pub const ALL: [Direction; 6] = [
        Direction::XDir,
        Direction::XDirPlusE,
        Direction::XDirMinusE,
        Direction::YDir,
        Direction::YDirPlusE,
        Direction::YDirMinusE,
    ];

    /// Column name in the auto-seismic table
    pub fn field(&self) -> &'static str {
        match self {
            Direction::XDir => "XDir",
            Direction::XDirPlusE => "XDirPlusE",
            Direction::XDirMinusE => "XDirMinusE",
            Direction::YDir => "YDir",
            Direction::YDirPlusE => "YDirPlusE",
            Direction::YDirMinusE => "YDirMinusE",
        }
    }

    /// Default pattern-name suffix for this direction
    pub fn default_suffix(&self) -> &'static str {
        match self {
            Direction::XDir => "EX",
            Direction::XDirPlusE => "EXP",
            Direction::XDirMinusE => "EXN",
            Direction::YDir => "EY",
            Direction::YDirPlusE => "EYP",
            Direction::YDirMinusE => "EYN",
        }
    }

    /// Whether this is one of the two flags without eccentricity
    pub fn is_canonical(&self) -> bool {
        matches!(self, Direction::XDir | Direction::YDir)
    }

    fn bit(&self) -> u8 {
        1 << (*self as u8)
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.field())
    }
}

/// Set of active direction flags.
///
/// # Example
/// ```
/// use split_core::loads::{Direction, DirectionSet};
///
/// let set = DirectionSet::from_iter([Direction::XDir, Direction::XDirPlusE]);
/// assert!(set.is_zip());
/// assert_eq!(set.iter().collect::<Vec<_>>(), vec![Direction::XDir, Direction::XDirPlusE]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DirectionSet(u8);

impl DirectionSet {
    pub fn single(direction: Direction) -> Self {
        DirectionSet(direction.bit())
    }

    pub fn insert(&mut self, direction: Direction) {
        self.0 |= direction.bit();
    }

    pub fn contains(&self, direction: Direction) -> bool {
        self.0 & direction.bit() != 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Exactly one flag set
    pub fn is_simple(&self) -> bool {
        self.len() == 1
    }

    /// More than one flag set
    pub fn is_zip(&self) -> bool {
        self.len() > 1
    }

    /// The single active flag of a simple set
    pub fn only(&self) -> Option<Direction> {
        if self.is_simple() {
            self.iter().next()
        } else {
            None
        }
    }

    /// Active flags in column order
    pub fn iter(&self) -> impl Iterator<Item = Direction> + '_ {
        Direction::ALL.into_iter().filter(move |d| self.contains(*d))
    }
}

impl FromIterator<Direction> for DirectionSet {
    fn from_iter<I: IntoIterator<Item = Direction>>(iter: I) -> Self {
        let mut set = DirectionSet::default();
        for direction in iter {
            set.insert(direction);
        }
        set
    }
}
