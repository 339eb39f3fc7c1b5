//! Error types for pgdat

use std::time::Duration;
use thiserror::Error;

/// Result type alias for pgdat operations
pub type DatResult<T> = Result<T, DatError>;

/// Errors recorded by a builder while its fluent chain runs.
///
/// Builders keep the first one and report it from `to_sql`, so the type is `Clone`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("no table specified")]
    NoTable,

    #[error("no columns specified")]
    NoColumns,

    #[error("no values or records specified")]
    NoValues,

    #[error("\"*\" can only be used with record")]
    StarRequiresRecord,

    #[error("blacklist can only be used with record")]
    BlacklistRequiresRecord,

    #[error("pair allows only a single row")]
    PairSingleRow,

    #[error("where clause required for upsert")]
    UpsertWhereRequired,

    #[error("invalid join kind: {0}")]
    InvalidJoinKind(String),

    #[error("column {0} not in insert columns")]
    ColumnNotInInsert(String),

    #[error("column {0} not found in record")]
    ColumnNotInRecord(String),

    /// A literal fragment whose highest `$N` does not match its argument count.
    #[error("fragment {sql:?} uses {placeholders} placeholder(s) but got {args} argument(s)")]
    FragmentArity {
        sql: String,
        placeholders: usize,
        args: usize,
    },

    #[error("missing scope field: {0}")]
    MissingScopeField(String),

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("{0}")]
    Invalid(String),
}

/// Error types for building, interpolating and executing statements
#[derive(Debug, Error)]
pub enum DatError {
    /// Deferred builder error
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    /// Placeholder count and argument count differ (strict mode)
    #[error("Placeholder/argument mismatch: {placeholders} placeholder(s), {args} argument(s)")]
    ArgumentMismatch { placeholders: usize, args: usize },

    /// Argument shape cannot be written as a literal
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// List element of an unsupported type
    #[error("Invalid slice value: {0}")]
    InvalidSliceValue(String),

    /// Empty list where at least one element is required
    #[error("Invalid slice length: list must not be empty")]
    InvalidSliceLength,

    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution error
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// More rows than the operation allows
    #[error("Too many rows: expected {expected}, got {got}")]
    TooManyRows { expected: usize, got: usize },

    /// Unique constraint violation
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Query timeout error
    #[error("Query timeout after {0:?}")]
    Timeout(Duration),

    /// Operation the handle cannot perform (e.g. cancel without a backend key)
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// The executor was never bound to a live database handle
    #[error("Disconnected executor: no database handle bound")]
    Disconnected,

    #[error("Transaction already committed")]
    AlreadyCommitted,

    #[error("Transaction already rolled back")]
    AlreadyRolledBack,

    /// Cache store error
    #[error("Cache error: {0}")]
    Cache(String),

    /// Session/config precondition failure
    #[error("Config error: {0}")]
    Config(String),

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl DatError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a too-many-rows error
    pub fn too_many_rows(expected: usize, got: usize) -> Self {
        Self::TooManyRows { expected, got }
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }

    /// Parse a tokio_postgres error into a more specific DatError
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let constraint = db_err.constraint().unwrap_or("unknown");
            let message = db_err.message();

            match db_err.code().code() {
                "23505" => return Self::UniqueViolation(format!("{}: {}", constraint, message)),
                "23503" => {
                    return Self::ForeignKeyViolation(format!("{}: {}", constraint, message));
                }
                "23514" => return Self::CheckViolation(format!("{}: {}", constraint, message)),
                _ => {}
            }
        }
        Self::Query(err)
    }
}

impl From<serde_json::Error> for DatError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for DatError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}
