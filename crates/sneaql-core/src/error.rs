//! Transform error types.

use thiserror::Error;

use crate::registry::CapabilityKind;

/// Errors that can occur while parsing, validating or running a transform.
///
/// Step exits and transform exits are not errors; they travel as
/// [`ControlSignal`](crate::commands::ControlSignal) values instead.
#[derive(Debug, Clone, Error)]
pub enum SneaqlError {
    /// Tag text could not be split into tokens.
    #[error("Tokenization error at position {position}: {message}")]
    Tokenization { position: usize, message: String },

    /// Step file contained no tag blocks.
    #[error("No statements found in step file")]
    NoStatementsFound,

    /// Tag was malformed or failed argument validation.
    #[error("Statement parsing error: {0}")]
    StatementParsing(String),

    /// Expression or SQL substitution failed.
    #[error("Error evaluating expression: {0}")]
    ExpressionEvaluation(String),

    /// Comparison operator is not one of the supported operators.
    #[error("Invalid or no comparison operator provided: {0}")]
    InvalidComparisonOperator(String),

    /// Session variable name rejected.
    #[error("Invalid session variable name: {0}")]
    InvalidVariableName(String),

    /// Recordset records do not share one field set or hold non-scalar values.
    #[error("Recordset is inconsistent or contains invalid types: {0}")]
    InvalidRecordset(String),

    /// Named recordset does not exist.
    #[error("Recordset does not exist: {0}")]
    RecordsetNotFound(String),

    /// Nothing registered under this kind and name.
    #[error("No {kind} registered as '{name}'")]
    CapabilityNotFound { kind: CapabilityKind, name: String },

    /// A command failure was not handled by the statement that followed it.
    #[error("Previous error was not handled: {0}")]
    UnhandledError(Box<SneaqlError>),

    /// Raised by `fail_if` and `on_error fail`.
    #[error("Transform failed: {0}")]
    ForcedFailure(String),

    /// Another holder owns the transform lock.
    #[error("Transform {0} is locked by another process")]
    TransformIsLocked(String),

    /// Environment variable value matched the SQL injection filter.
    #[error("Environment variable {0} rejected by SQL injection check")]
    InjectionRejected(String),

    /// Database driver error.
    #[error("Database error: {0}")]
    Database(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),

    /// External process error.
    #[error("Process error: {0}")]
    Process(String),
}

impl SneaqlError {
    /// Variant name without the enum path.
    pub fn variant_name(&self) -> &'static str {
        match self {
            SneaqlError::Tokenization { .. } => "Tokenization",
            SneaqlError::NoStatementsFound => "NoStatementsFound",
            SneaqlError::StatementParsing(_) => "StatementParsing",
            SneaqlError::ExpressionEvaluation(_) => "ExpressionEvaluation",
            SneaqlError::InvalidComparisonOperator(_) => "InvalidComparisonOperator",
            SneaqlError::InvalidVariableName(_) => "InvalidVariableName",
            SneaqlError::InvalidRecordset(_) => "InvalidRecordset",
            SneaqlError::RecordsetNotFound(_) => "RecordsetNotFound",
            SneaqlError::CapabilityNotFound { .. } => "CapabilityNotFound",
            SneaqlError::UnhandledError(_) => "UnhandledError",
            SneaqlError::ForcedFailure(_) => "ForcedFailure",
            SneaqlError::TransformIsLocked(_) => "TransformIsLocked",
            SneaqlError::InjectionRejected(_) => "InjectionRejected",
            SneaqlError::Database(_) => "Database",
            SneaqlError::Configuration(_) => "Configuration",
            SneaqlError::Io(_) => "Io",
            SneaqlError::Json(_) => "Json",
            SneaqlError::Process(_) => "Process",
        }
    }

    /// Fully-qualified error name, substituted for `:err_type` by `on_error execute`.
    pub fn qualified_name(&self) -> String {
        format!("{}::SneaqlError::{}", module_path!(), self.variant_name())
    }
}

/// Result type alias using SneaqlError.
pub type SneaqlResult<T> = Result<T, SneaqlError>;

impl From<std::io::Error> for SneaqlError {
    fn from(e: std::io::Error) -> Self {
        SneaqlError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for SneaqlError {
    fn from(e: serde_json::Error) -> Self {
        SneaqlError::Json(e.to_string())
    }
}

impl From<duckdb::Error> for SneaqlError {
    fn from(e: duckdb::Error) -> Self {
        SneaqlError::Database(e.to_string())
    }
}

impl From<tokio_postgres::Error> for SneaqlError {
    fn from(e: tokio_postgres::Error) -> Self {
        SneaqlError::Database(e.to_string())
    }
}

impl From<reqwest::Error> for SneaqlError {
    fn from(e: reqwest::Error) -> Self {
        SneaqlError::Io(format!("HTTP request failed: {}", e))
    }
}

impl From<zip::result::ZipError> for SneaqlError {
    fn from(e: zip::result::ZipError) -> Self {
        SneaqlError::Io(format!("Archive extraction failed: {}", e))
    }
}

impl From<envy::Error> for SneaqlError {
    fn from(e: envy::Error) -> Self {
        SneaqlError::Configuration(e.to_string())
    }
}
