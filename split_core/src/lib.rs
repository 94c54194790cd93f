//! # split_core - Seismic Load Expansion Engine
//!
//! `split_core` splits "zip" seismic load patterns (one auto-seismic row with
//! several direction/eccentricity flags set) into simple patterns, and carries
//! the split through every table of a structural model that references them:
//! linear static load cases, linear and envelope load combinations, and the
//! per-material design combination tables.
//!
//! The model itself lives in a host application. The engine only talks to it
//! through the [`host::HostModel`] trait; [`host::SnapshotHost`] implements
//! that trait over a JSON snapshot of the host's tables.
//!
//! ## Design Philosophy
//!
//! - **Explicit state**: settings travel in an [`config::ExpandConfig`], the model in a host handle
//! - **Typed rows**: tables are decoded into typed rows at the boundary
//! - **Deterministic**: every generated name depends on table order only
//! - **Rich Errors**: structured error types, not just strings
//!
//! ## Quick Start
//!
//! ```rust
//! use split_core::config::ExpandConfig;
//! use split_core::expand::{expand_loads, ProgressEvent};
//! use split_core::host::SnapshotHost;
//! use split_core::snapshot::{ModelSnapshot, Software};
//! use split_core::tables::keys;
//!
//! let mut snapshot = ModelSnapshot::new("Tower", Software::Etabs);
//! snapshot.insert_table(
//!     keys::LOAD_PATTERNS,
//!     &["Name", "IsAuto", "Type", "SelfWtMult"],
//!     &[&["EXALL", "No", "Seismic", "0"]],
//! );
//! snapshot.insert_table(
//!     keys::AUTO_SEISMIC_USER_COEFFICIENT,
//!     &["Name", "XDir", "XDirPlusE", "XDirMinusE", "YDir", "YDirPlusE", "YDirMinusE"],
//!     &[&["EXALL", "Yes", "Yes", "Yes", "No", "No", "No"]],
//! );
//!
//! let mut host = SnapshotHost::new(snapshot);
//! for event in expand_loads(&mut host, ExpandConfig::default()) {
//!     match event.unwrap() {
//!         ProgressEvent::Progress { message, percent } => println!("{percent:>3}% {message}"),
//!         ProgressEvent::Finished { success, .. } => assert!(success),
//!     }
//! }
//! ```
//!
//! ## Modules
//!
//! - [`tables`] - Raw host tables and typed row schemas
//! - [`loads`] - Pattern types, direction flags, combination types
//! - [`expand`] - The expansion tiers and the pipeline driver
//! - [`host`] - Host capabilities and the snapshot host
//! - [`snapshot`] - Model snapshot container
//! - [`config`] - Expansion settings
//! - [`errors`] - Structured error types
//! - [`file_io`] - Snapshot files with atomic saves and locking

pub mod config;
pub mod errors;
pub mod expand;
pub mod file_io;
pub mod host;
pub mod loads;
pub mod snapshot;
pub mod tables;

// Re-export commonly used types at crate root for convenience
pub use config::{CollisionPolicy, ExpandConfig};
pub use errors::{ExpandError, ExpandResult};
pub use expand::{expand_loads, ExpansionMap, ExpansionReport, ProgressEvent};
pub use file_io::{load_snapshot, save_snapshot};
#[cfg(not(target_arch = "wasm32"))]
pub use file_io::ModelLock;
pub use host::{HostModel, SnapshotHost};
pub use snapshot::{ModelSnapshot, Software};
pub use tables::RawTable;
