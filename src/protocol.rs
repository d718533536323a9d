//! Contracts of the collaborators the statement core drives.
//!
//! Wire encoding, session management and row decoding live behind [`Protocol`]; the
//! statement only hands it compiled queries, parameter snapshots and a [`Results`] handle.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::compiler::CompiledQuery;
use crate::metadata::{ParameterMetadata, ResultSetMetadata};
use crate::results::Results;
use crate::types::{ParameterSet, ParameterValue};

/// Broad classification of a protocol failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolErrorKind {
    /// The server rejected the SQL text itself.
    Syntax,
    /// The statement was accepted but failed while running.
    Execution,
    /// The feature is not available on this server or connection.
    Unsupported,
    /// The caller asked for the running work to stop.
    Interrupted,
    /// The connection is unusable.
    Connection,
}

/// Failure reported by a [`Protocol`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProtocolError {
    pub kind: ProtocolErrorKind,
    pub message: String,
    pub sql_state: Option<String>,
    pub error_code: i32,
}

impl ProtocolError {
    #[must_use]
    pub fn new(kind: ProtocolErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            sql_state: None,
            error_code: 0,
        }
    }

    #[must_use]
    pub fn syntax(message: impl Into<String>) -> Self {
        Self::new(ProtocolErrorKind::Syntax, message).with_sql_state("42000")
    }

    #[must_use]
    pub fn execution(message: impl Into<String>) -> Self {
        Self::new(ProtocolErrorKind::Execution, message)
    }

    #[must_use]
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(ProtocolErrorKind::Unsupported, message).with_sql_state("0A000")
    }

    #[must_use]
    pub fn interrupted() -> Self {
        Self::new(ProtocolErrorKind::Interrupted, "query was interrupted").with_sql_state("70100")
    }

    #[must_use]
    pub fn with_sql_state(mut self, sql_state: impl Into<String>) -> Self {
        self.sql_state = Some(sql_state.into());
        self
    }

    #[must_use]
    pub fn with_error_code(mut self, error_code: i32) -> Self {
        self.error_code = error_code;
        self
    }

    /// Syntax-class failures: explicit kind, or SQLSTATE class `42`.
    #[must_use]
    pub fn is_syntax(&self) -> bool {
        self.kind == ProtocolErrorKind::Syntax
            || self.sql_state.as_deref().is_some_and(|s| s.starts_with("42"))
    }
}

/// Metadata returned by a metadata probe.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeMetadata {
    /// `None` for statements that do not produce rows.
    pub result: Option<ResultSetMetadata>,
    pub parameters: ParameterMetadata,
}

/// The execution service a statement runs on.
///
/// Implementations append what the server reports to the [`Results`] handle they are
/// given: [`Results::add_stats`] for update counts and [`Results::add_result_set`] for
/// row-producing results.
#[async_trait]
pub trait Protocol: Send + Sync {
    /// `true` when talking to the primary of a replicated setup.
    fn is_primary_connection(&self) -> bool {
        true
    }

    /// Server-side connection id, used in error messages.
    fn server_thread_id(&self) -> u64;

    /// `true` when the server runs with `NO_BACKSLASH_ESCAPES`.
    fn no_backslash_escapes(&self) -> bool {
        false
    }

    /// `true` when the server can enforce a statement timeout itself.
    fn supports_server_timeout(&self) -> bool {
        false
    }

    /// Execute one parameter set. `timeout` is only given when the server enforces it.
    async fn execute_query(
        &self,
        primary: bool,
        results: &mut Results,
        query: &CompiledQuery,
        params: &[ParameterValue],
        timeout: Option<Duration>,
    ) -> Result<(), ProtocolError>;

    /// Try to execute every entry in as few round trips as possible.
    ///
    /// Returns `Ok(false)` when bulk execution is not possible (nothing was sent), in which
    /// case the caller falls back to one round trip per entry.
    async fn execute_batch_client(
        &self,
        primary: bool,
        results: &mut Results,
        query: &CompiledQuery,
        entries: &[ParameterSet],
        has_long_data: bool,
    ) -> Result<bool, ProtocolError>;

    /// Fail with an `Interrupted` error when the caller has requested cancellation.
    fn stop_if_interrupted(&self) -> Result<(), ProtocolError>;

    /// Open a throwaway server-side prepared form of `sql` for metadata discovery.
    async fn open_probe(&self, sql: &str) -> Result<Box<dyn ServerPrepared>, ProtocolError>;
}

/// A server-side prepared handle opened only to discover metadata.
#[async_trait]
pub trait ServerPrepared: Send {
    async fn describe(&mut self) -> Result<ProbeMetadata, ProtocolError>;

    /// Release the server-side handle. Called exactly once by the probe.
    async fn close(&mut self) -> Result<(), ProtocolError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_classification_uses_kind_or_sql_state() {
        assert!(ProtocolError::syntax("bad").is_syntax());
        assert!(
            ProtocolError::execution("table missing")
                .with_sql_state("42S02")
                .is_syntax()
        );
        assert!(!ProtocolError::execution("duplicate").with_sql_state("23000").is_syntax());
        assert!(!ProtocolError::unsupported("no binary protocol").is_syntax());
    }
}
