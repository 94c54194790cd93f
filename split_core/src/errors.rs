//! # Error Types
//!
//! Structured error types for split_core. Absence of data is never an error
//! here: a missing table or a model with nothing to expand is reported as
//! `None` by the stage that noticed it. These variants cover malformed
//! tables, host refusals and broken reference graphs.
//!
//! ## Example
//!
//! ```rust
//! use split_core::errors::{ExpandError, ExpandResult};
//!
//! fn parse_flag(value: &str) -> ExpandResult<bool> {
//!     match value {
//!         "Yes" => Ok(true),
//!         "No" => Ok(false),
//!         other => Err(ExpandError::invalid_input("XDir", other, "Expected Yes or No")),
//!     }
//! }
//!
//! assert!(parse_flag("Maybe").is_err());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for split_core operations
pub type ExpandResult<T> = Result<T, ExpandError>;

/// Structured error type for table and expansion operations.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "details")]
pub enum ExpandError {
    /// A cell value could not be interpreted
    #[error("Invalid input for '{field}': {value} - {reason}")]
    InvalidInput {
        field: String,
        value: String,
        reason: String,
    },

    /// A column the expansion needs is not present in the table
    #[error("Missing field '{field}' in table '{table}'")]
    MissingField { table: String, field: String },

    /// Flat value array does not fit the field list
    #[error("Malformed table '{table}': {reason}")]
    TableShape { table: String, reason: String },

    /// Table key not known to the typed schema layer
    #[error("Unknown table: {table}")]
    UnknownTable { table: String },

    /// The host refuses edits until the model is unlocked
    #[error("Model is locked - unlock it before editing tables")]
    ModelLocked,

    /// A row references a load pattern, case or combination the host does not know
    #[error("Unknown reference '{name}' in table '{table}'")]
    UnknownReference { table: String, name: String },

    /// Two expansions produced the same name and the policy forbids overwriting
    #[error("Name collision at {tier} tier: '{name}' already exists")]
    NameCollision { tier: String, name: String },

    /// Load combinations reference each other in a loop
    #[error("Load combination reference cycle: {}", path.join(" -> "))]
    ReferenceCycle { path: Vec<String> },

    /// Combination expansion kept producing new names
    #[error("Load combination expansion did not converge after {rounds} rounds")]
    FixedPointNotReached { rounds: usize },

    /// File I/O error
    #[error("File error: {operation} on '{path}' - {reason}")]
    FileError {
        operation: String,
        path: String,
        reason: String,
    },

    /// Model file is locked by another user/process
    #[error("File locked: '{path}' is locked by {locked_by} since {locked_at}")]
    FileLocked {
        path: String,
        locked_by: String,
        locked_at: String,
    },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {reason}")]
    SerializationError { reason: String },

    /// Schema version mismatch
    #[error("Version mismatch: file version {file_version}, expected {expected_version}")]
    VersionMismatch {
        file_version: String,
        expected_version: String,
    },

    /// Generic internal error (should be rare)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ExpandError {
    /// Create an InvalidInput error
    pub fn invalid_input(field: impl Into<String>, value: impl Into<String>, reason: impl Into<String>) -> Self {
        ExpandError::InvalidInput {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a MissingField error
    pub fn missing_field(table: impl Into<String>, field: impl Into<String>) -> Self {
        ExpandError::MissingField {
            table: table.into(),
            field: field.into(),
        }
    }

    /// Create a TableShape error
    pub fn table_shape(table: impl Into<String>, reason: impl Into<String>) -> Self {
        ExpandError::TableShape {
            table: table.into(),
            reason: reason.into(),
        }
    }

    /// Create an UnknownReference error
    pub fn unknown_reference(table: impl Into<String>, name: impl Into<String>) -> Self {
        ExpandError::UnknownReference {
            table: table.into(),
            name: name.into(),
        }
    }

    /// Create a NameCollision error
    pub fn name_collision(tier: impl Into<String>, name: impl Into<String>) -> Self {
        ExpandError::NameCollision {
            tier: tier.into(),
            name: name.into(),
        }
    }

    /// Create a FileError
    pub fn file_error(operation: impl Into<String>, path: impl Into<String>, reason: impl Into<String>) -> Self {
        ExpandError::FileError {
            operation: operation.into(),
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a FileLocked error
    pub fn file_locked(path: impl Into<String>, locked_by: impl Into<String>, locked_at: impl Into<String>) -> Self {
        ExpandError::FileLocked {
            path: path.into(),
            locked_by: locked_by.into(),
            locked_at: locked_at.into(),
        }
    }

    /// Check if this is a recoverable error (e.g., can retry)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ExpandError::FileLocked { .. } | ExpandError::ModelLocked)
    }

    /// Get a short error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ExpandError::InvalidInput { .. } => "INVALID_INPUT",
            ExpandError::MissingField { .. } => "MISSING_FIELD",
            ExpandError::TableShape { .. } => "TABLE_SHAPE",
            ExpandError::UnknownTable { .. } => "UNKNOWN_TABLE",
            ExpandError::ModelLocked => "MODEL_LOCKED",
            ExpandError::UnknownReference { .. } => "UNKNOWN_REFERENCE",
            ExpandError::NameCollision { .. } => "NAME_COLLISION",
            ExpandError::ReferenceCycle { .. } => "REFERENCE_CYCLE",
            ExpandError::FixedPointNotReached { .. } => "FIXED_POINT_NOT_REACHED",
            ExpandError::FileError { .. } => "FILE_ERROR",
            ExpandError::FileLocked { .. } => "FILE_LOCKED",
            ExpandError::SerializationError { .. } => "SERIALIZATION_ERROR",
            ExpandError::VersionMismatch { .. } => "VERSION_MISMATCH",
            ExpandError::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

impl From<serde_json::Error> for ExpandError {
    fn from(e: serde_json::Error) -> Self {
        ExpandError::SerializationError {
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serialization() {
        let error = ExpandError::invalid_input("XDir", "Maybe", "Expected Yes or No");
        let json = serde_json::to_string(&error).unwrap();
        let roundtrip: ExpandError = serde_json::from_str(&json).unwrap();
        assert_eq!(error, roundtrip);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(ExpandError::missing_field("t", "XDir").error_code(), "MISSING_FIELD");
        assert_eq!(ExpandError::ModelLocked.error_code(), "MODEL_LOCKED");
        assert_eq!(
            ExpandError::FixedPointNotReached { rounds: 3 }.error_code(),
            "FIXED_POINT_NOT_REACHED"
        );
    }

    #[test]
    fn test_cycle_message_lists_path() {
        let error = ExpandError::ReferenceCycle {
            path: vec!["A".into(), "B".into(), "A".into()],
        };
        assert_eq!(error.to_string(), "Load combination reference cycle: A -> B -> A");
    }

    #[test]
    fn test_recoverable() {
        assert!(ExpandError::ModelLocked.is_recoverable());
        assert!(!ExpandError::name_collision("pattern", "EX").is_recoverable());
    }
}
