use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// SQLSTATE reported when a parameter index is outside the statement's range.
pub const SQLSTATE_INVALID_PARAMETER_INDEX: &str = "07009";
/// SQLSTATE reported when an execution is attempted with an unbound parameter.
pub const SQLSTATE_UNBOUND_PARAMETER: &str = "07004";
/// SQLSTATE reported for statement timeouts and interruptions.
pub const SQLSTATE_QUERY_INTERRUPTED: &str = "70100";
/// SQLSTATE reported for forbidden operations.
pub const SQLSTATE_FEATURE_NOT_SUPPORTED: &str = "0A000";
/// SQLSTATE reported when operating on a closed statement.
pub const SQLSTATE_GENERAL_ERROR: &str = "HY000";

/// Error reported by the server (through the protocol collaborator) and enriched with
/// the connection context it happened on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerError {
    pub message: String,
    pub sql_state: Option<String>,
    pub error_code: i32,
    /// Connection / query details appended to the message, e.g. `conn:12(M)`.
    pub context: String,
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.error_code != 0 {
            write!(f, "({}) ", self.error_code)?;
        }
        f.write_str(&self.message)?;
        if !self.context.is_empty() {
            write!(f, "\n{}", self.context)?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum SqlPreparedError {
    #[error("Could not set parameter at position {index} (values was {value})\nQuery - {context}")]
    BindingRange {
        index: usize,
        value: String,
        context: String,
    },

    #[error("Parameter at position {position} is not set (statement expects {param_count} parameters)")]
    UnboundParameter { position: usize, param_count: usize },

    #[error("Syntax error: {0}")]
    Syntax(ServerError),

    #[error("SQL execution error: {0}")]
    ServerExecution(ServerError),

    #[error("Statement is closed")]
    StatementClosed,

    #[error("Query timed out after {0:?}")]
    Timeout(Duration),

    #[error("Statement execution interrupted: {0}")]
    Interrupted(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl SqlPreparedError {
    /// The five-character SQLSTATE for this error, when one is known.
    #[must_use]
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            Self::BindingRange { .. } => Some(SQLSTATE_INVALID_PARAMETER_INDEX),
            Self::UnboundParameter { .. } => Some(SQLSTATE_UNBOUND_PARAMETER),
            Self::Syntax(err) | Self::ServerExecution(err) => err.sql_state.as_deref(),
            Self::StatementClosed => Some(SQLSTATE_GENERAL_ERROR),
            Self::Timeout(_) | Self::Interrupted(_) => Some(SQLSTATE_QUERY_INTERRUPTED),
            Self::Unsupported(_) => Some(SQLSTATE_FEATURE_NOT_SUPPORTED),
            Self::ConfigError(_) => None,
        }
    }

    /// Vendor error code reported by the server, `0` for locally raised errors.
    #[must_use]
    pub fn error_code(&self) -> i32 {
        match self {
            Self::Syntax(err) | Self::ServerExecution(err) => err.error_code,
            _ => 0,
        }
    }

    /// `true` when the error was raised before anything was sent to the server.
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::BindingRange { .. }
                | Self::UnboundParameter { .. }
                | Self::StatementClosed
                | Self::Unsupported(_)
                | Self::ConfigError(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SqlPreparedError>;
