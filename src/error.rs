//! Error types for the rollup engine and report loader.

use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, KpiError>;

/// Errors that can occur while loading, aggregating, ranking or selecting.
#[derive(Debug, Error)]
pub enum KpiError {
    /// A record lacks a field required by a registry, plan or rule.
    #[error("record '{record}' is missing field '{field}'")]
    MissingField {
        /// Name of the offending record
        record: String,
        /// Field that was looked up
        field: String,
    },

    /// A group key did not match any known group.
    #[error("group key '{key}' does not resolve in {context}")]
    UnresolvedGroupKey {
        /// Key that failed to resolve
        key: String,
        /// Where the lookup happened (family or directory)
        context: String,
    },

    /// An entity name maps to more than one group.
    #[error("'{name}' belongs to both '{first}' and '{second}'")]
    AmbiguousGroup {
        /// Entity name
        name: String,
        /// Group seen first
        first: String,
        /// Conflicting group
        second: String,
    },

    /// A ratio aggregate was read as a number but its denominator summed to zero.
    #[error("ratio '{field}' for group '{group}' is undefined (denominator sums to zero)")]
    ZeroDenominator {
        /// Group key of the aggregate
        group: String,
        /// Output field name
        field: String,
    },

    /// A field holds something that is not a finite number.
    #[error("record '{record}' has invalid value {raw:?} for field '{field}'")]
    InvalidValue {
        /// Name of the offending record
        record: String,
        /// Field name
        field: String,
        /// Raw text as read
        raw: String,
    },

    /// Two joined families supply the same field for a group.
    #[error("field '{field}' for group '{group}' is supplied by more than one family")]
    DuplicateField {
        /// Group key
        group: String,
        /// Field supplied twice
        field: String,
    },

    /// An operation that needs at least one record got none.
    #[error("no records to aggregate for {0}")]
    EmptyInput(String),

    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl KpiError {
    pub(crate) fn missing(record: &str, field: &str) -> Self {
        Self::MissingField {
            record: record.to_string(),
            field: field.to_string(),
        }
    }
}
