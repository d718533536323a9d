//! Client-side prepared statements.
//!
//! A [`ClientPreparedStatement`] binds values to a [`CompiledQuery`], executes it once or as
//! a batch, and discovers metadata lazily through a throwaway server-side prepare.

mod batch;
mod execute;
mod probe;
mod slots;
mod strategy;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::Span;

use crate::compiler::CompiledQuery;
use crate::config::StatementOptions;
use crate::connection::{Connection, StatementEvent};
use crate::error::{Result, SqlPreparedError};
use crate::error_factory::ErrorFactory;
use crate::metadata::{ParameterMetadata, ResultSetMetadata};
use crate::protocol::Protocol;
use crate::results::{ResultSet, Results};
use crate::types::ParameterValue;

use batch::BatchQueue;
use execute::ExecutionGuard;
use probe::MetadataCache;
use slots::ParameterSlots;
pub use strategy::BatchPath;

/// Operations every prepared statement flavour offers, whichever side does the preparing.
#[async_trait]
pub trait PreparedStatement: Send + fmt::Display {
    fn parameter_count(&self) -> usize;

    /// Bind `value` at 1-based `index`.
    fn set_parameter_value(&mut self, index: usize, value: ParameterValue) -> Result<()>;

    /// Execute once; `true` when the first result produced rows.
    async fn execute(&mut self) -> Result<bool>;

    /// Execute every queued parameter set, returning one count per entry.
    async fn execute_batch(&mut self) -> Result<Vec<i32>>;

    async fn metadata(&mut self) -> Result<Option<Arc<ResultSetMetadata>>>;

    async fn parameter_metadata(&mut self) -> Result<Arc<ParameterMetadata>>;

    /// Independent statement on the same connection sharing the compiled query.
    fn try_clone_boxed(&self) -> Result<Box<dyn PreparedStatement>>;

    async fn close(&mut self) -> Result<()>;
}

/// A statement whose parameters are interpolated client-side by the protocol.
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use sql_prepared::prelude::*;
/// # async fn demo(conn: Arc<Connection>) -> Result<(), SqlPreparedError> {
/// let mut stmt = conn.prepare_statement("INSERT INTO users (id, name) VALUES (?, ?)")?;
/// for (id, name) in [(1, "alice"), (2, "bob")] {
///     stmt.set_parameter(1, id)?;
///     stmt.set_parameter(2, name)?;
///     stmt.add_batch()?;
/// }
/// let counts = stmt.execute_batch().await?;
/// assert_eq!(counts.len(), 2);
/// # Ok(()) }
/// ```
pub struct ClientPreparedStatement {
    connection: Option<Arc<Connection>>,
    compiled: Arc<CompiledQuery>,
    options: StatementOptions,
    errors: ErrorFactory,
    slots: ParameterSlots,
    batch: BatchQueue,
    metadata: MetadataCache,
    results: Option<Results>,
    last_batch_path: Option<BatchPath>,
    lock: Arc<Mutex<()>>,
    span: Span,
    closed: bool,
}

impl fmt::Debug for ClientPreparedStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientPreparedStatement")
            .field("sql", &self.compiled.sql())
            .field("param_count", &self.slots.len())
            .field("batch_size", &self.batch.len())
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for ClientPreparedStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sql : '{}', parameters : [", self.compiled.sql())?;
        for (i, slot) in self.slots.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            match slot {
                Some(value) => write!(f, "{value}")?,
                None => f.write_str("null")?,
            }
        }
        f.write_str("]")
    }
}

impl ClientPreparedStatement {
    pub(crate) fn new(
        connection: Arc<Connection>,
        compiled: Arc<CompiledQuery>,
        options: StatementOptions,
    ) -> Self {
        let errors = connection.error_factory(&options);
        let span = tracing::debug_span!(
            parent: connection.span(),
            "prepared_statement",
            sql = %errors.query_excerpt(compiled.sql())
        );
        Self {
            slots: ParameterSlots::new(compiled.param_count()),
            connection: Some(connection),
            compiled,
            options,
            errors,
            batch: BatchQueue::default(),
            metadata: MetadataCache::default(),
            results: None,
            last_batch_path: None,
            lock: Arc::new(Mutex::new(())),
            span,
            closed: false,
        }
    }

    fn check_closed(&self) -> Result<()> {
        if self.closed {
            Err(SqlPreparedError::StatementClosed)
        } else {
            Ok(())
        }
    }

    fn protocol(&self) -> Result<&Arc<dyn Protocol>> {
        self.connection
            .as_deref()
            .map(Connection::protocol)
            .ok_or(SqlPreparedError::StatementClosed)
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        self.compiled.sql()
    }

    #[must_use]
    pub fn compiled(&self) -> &Arc<CompiledQuery> {
        &self.compiled
    }

    #[must_use]
    pub fn parameter_count(&self) -> usize {
        self.compiled.param_count()
    }

    #[must_use]
    pub fn options(&self) -> &StatementOptions {
        &self.options
    }

    /// The connection this statement runs on; `None` once a pooled close detached it.
    #[must_use]
    pub fn connection(&self) -> Option<&Arc<Connection>> {
        self.connection.as_ref()
    }

    /// # Errors
    /// `ConfigError` for a zero timeout, `StatementClosed` after close.
    pub fn set_query_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.check_closed()?;
        if timeout.is_some_and(|t| t.is_zero()) {
            return Err(SqlPreparedError::ConfigError(
                "query timeout must be greater than zero".into(),
            ));
        }
        self.options.query_timeout = timeout;
        Ok(())
    }

    /// # Errors
    /// `StatementClosed` after close.
    pub fn set_fetch_size(&mut self, fetch_size: u32) -> Result<()> {
        self.check_closed()?;
        self.options.fetch_size = fetch_size;
        Ok(())
    }

    /// # Errors
    /// `StatementClosed` after close.
    pub fn set_continue_batch_on_error(&mut self, enabled: bool) -> Result<()> {
        self.check_closed()?;
        self.options.continue_batch_on_error = enabled;
        Ok(())
    }

    /// Bind `value` at 1-based `index`, replacing whatever was bound there.
    ///
    /// # Errors
    /// `BindingRange` when `index` is outside `1..=parameter_count()`, `StatementClosed`
    /// after close.
    pub fn set_parameter(&mut self, index: usize, value: impl Into<ParameterValue>) -> Result<()> {
        self.check_closed()?;
        let value = value.into();
        let long_data = value.is_long_data();
        match self.slots.set(index, value) {
            Ok(()) => {
                if long_data {
                    self.batch.mark_long_data();
                }
                Ok(())
            }
            Err(value) => {
                tracing::error!(
                    parent: &self.span,
                    index,
                    param_count = self.slots.len(),
                    "parameter index out of range"
                );
                Err(self.errors.binding_range(index, &value, self.compiled.sql()))
            }
        }
    }

    /// # Errors
    /// Same as [`ClientPreparedStatement::set_parameter`].
    pub fn set_null(&mut self, index: usize) -> Result<()> {
        self.set_parameter(index, ParameterValue::Null)
    }

    /// Value currently bound at 1-based `index`.
    #[must_use]
    pub fn parameter(&self, index: usize) -> Option<&ParameterValue> {
        self.slots.get(index)
    }

    /// Unset every parameter. The batch queue is left alone.
    ///
    /// # Errors
    /// `StatementClosed` after close.
    pub fn clear_parameters(&mut self) -> Result<()> {
        self.check_closed()?;
        self.slots.reset(self.compiled.param_count());
        Ok(())
    }

    /// Queue a snapshot of the current parameters. The parameters stay bound.
    ///
    /// # Errors
    /// `UnboundParameter` when a parameter is unset (the queue is left unchanged),
    /// `StatementClosed` after close.
    pub fn add_batch(&mut self) -> Result<()> {
        self.check_closed()?;
        let entry = self.validated_parameters()?;
        self.batch.push(entry);
        Ok(())
    }

    /// Raw SQL cannot be queued on a prepared statement.
    ///
    /// # Errors
    /// Always `Unsupported`.
    pub fn add_batch_sql(&mut self, _sql: &str) -> Result<()> {
        Err(SqlPreparedError::Unsupported(
            "Cannot do addBatch(String) on preparedStatement".into(),
        ))
    }

    /// Empty the batch queue. Bound parameters are left alone.
    ///
    /// # Errors
    /// `StatementClosed` after close.
    pub fn clear_batch(&mut self) -> Result<()> {
        self.check_closed()?;
        self.batch.clear();
        Ok(())
    }

    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch.len()
    }

    /// `true` when a streamed value was bound since the batch was last cleared.
    #[must_use]
    pub fn has_long_data(&self) -> bool {
        self.batch.has_long_data()
    }

    /// Execute once with the bound parameters.
    ///
    /// Returns `true` when the first result produced rows.
    ///
    /// # Errors
    /// `UnboundParameter` before anything is sent, otherwise whatever the server or the
    /// timer reported.
    pub async fn execute(&mut self) -> Result<bool> {
        self.execute_internal(self.options.fetch_size).await
    }

    /// Execute once and return the produced rows; empty for statements that only update.
    ///
    /// # Errors
    /// Same as [`ClientPreparedStatement::execute`].
    pub async fn execute_query(&mut self) -> Result<ResultSet> {
        self.execute_internal(self.options.fetch_size).await?;
        Ok(self
            .results
            .as_ref()
            .and_then(Results::result_set)
            .cloned()
            .unwrap_or_else(ResultSet::empty))
    }

    /// Execute once and return the update count, `0` when rows were produced.
    ///
    /// # Errors
    /// Same as [`ClientPreparedStatement::execute`].
    pub async fn execute_update(&mut self) -> Result<i32> {
        let count = self.execute_large_update().await?;
        Ok(i32::try_from(count).unwrap_or(i32::MAX))
    }

    /// # Errors
    /// Same as [`ClientPreparedStatement::execute`].
    pub async fn execute_large_update(&mut self) -> Result<i64> {
        if self.execute_internal(self.options.fetch_size).await? {
            return Ok(0);
        }
        Ok(self.update_count().unwrap_or(0))
    }

    /// Execute every queued entry and return one count per entry, in queue order.
    ///
    /// Entries covered by a coalesced round trip report `SUCCESS_NO_INFO`. The queue is not
    /// cleared.
    ///
    /// # Errors
    /// The first failure. With `continue_batch_on_error` every entry has been sent
    /// before it is returned; [`ClientPreparedStatement::server_update_counts`] then holds
    /// the counts of the entries that succeeded.
    pub async fn execute_batch(&mut self) -> Result<Vec<i32>> {
        if !self.run_batch().await? {
            return Ok(Vec::new());
        }
        Ok(self
            .results
            .as_ref()
            .map(|r| r.cmd_information().update_counts())
            .unwrap_or_default())
    }

    /// Like [`ClientPreparedStatement::execute_batch`] with 64-bit counts.
    ///
    /// # Errors
    /// Same as [`ClientPreparedStatement::execute_batch`].
    pub async fn execute_large_batch(&mut self) -> Result<Vec<i64>> {
        if !self.run_batch().await? {
            return Ok(Vec::new());
        }
        Ok(self
            .results
            .as_ref()
            .map(|r| r.cmd_information().large_update_counts())
            .unwrap_or_default())
    }

    /// `false` when the queue was empty and nothing ran.
    async fn run_batch(&mut self) -> Result<bool> {
        self.check_closed()?;
        if self.batch.is_empty() {
            return Ok(false);
        }
        self.execute_batch_internal().await?;
        Ok(true)
    }

    /// Counts the server reported during the last execution, failed entries excluded.
    #[must_use]
    pub fn server_update_counts(&self) -> Vec<i32> {
        self.results
            .as_ref()
            .map(|r| r.cmd_information().server_update_counts())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn large_server_update_counts(&self) -> Vec<i64> {
        self.results
            .as_ref()
            .map(|r| r.cmd_information().large_server_update_counts())
            .unwrap_or_default()
    }

    /// Results of the last execution, kept even when it failed.
    #[must_use]
    pub fn results(&self) -> Option<&Results> {
        self.results.as_ref()
    }

    /// Update count of the last execution; `None` when it produced rows or nothing ran.
    #[must_use]
    pub fn update_count(&self) -> Option<i64> {
        self.results.as_ref().and_then(Results::update_count)
    }

    #[must_use]
    pub fn result_set(&self) -> Option<&ResultSet> {
        self.results.as_ref().and_then(Results::result_set)
    }

    /// How the last non-empty batch was sent, if it completed.
    #[must_use]
    pub fn last_batch_path(&self) -> Option<BatchPath> {
        self.last_batch_path
    }

    /// A new statement on the same connection sharing the compiled query and any cached
    /// metadata, with its own parameters, queue and lock.
    ///
    /// # Errors
    /// `StatementClosed` after close or once the connection was detached.
    pub fn clone_statement(&self) -> Result<Self> {
        self.check_closed()?;
        let connection = self
            .connection
            .as_ref()
            .ok_or(SqlPreparedError::StatementClosed)?;
        self.clone_for(Arc::clone(connection))
    }

    /// Like [`ClientPreparedStatement::clone_statement`] on another connection.
    ///
    /// # Errors
    /// `StatementClosed` after close.
    pub fn clone_for(&self, connection: Arc<Connection>) -> Result<Self> {
        self.check_closed()?;
        let mut clone = Self::new(connection, Arc::clone(&self.compiled), self.options.clone());
        clone.metadata = self.metadata.clone();
        Ok(clone)
    }

    /// Release results and queued entries and mark the statement closed. Idempotent.
    ///
    /// When the connection is pooled and has statement listeners they are told, and the
    /// statement lets go of the connection.
    ///
    /// # Errors
    /// Currently infallible; kept fallible for protocol-backed flavours.
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let _guard = ExecutionGuard::acquire(&self.lock, &self.span, "close").await;
        self.closed = true;
        self.results = None;
        self.batch.clear();

        let listeners = self.connection.as_ref().and_then(|conn| {
            conn.pooled()
                .filter(|pooled| !pooled.no_stmt_event_listeners())
                .map(|pooled| (Arc::clone(pooled), conn.protocol().server_thread_id()))
        });
        if let Some((pooled, thread_id)) = listeners {
            pooled.fire_statement_closed(&StatementEvent {
                sql: self.compiled.sql().to_owned(),
                thread_id,
            });
            self.connection = None;
        }
        tracing::debug!(parent: &self.span, "statement closed");
        Ok(())
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[async_trait]
impl PreparedStatement for ClientPreparedStatement {
    fn parameter_count(&self) -> usize {
        ClientPreparedStatement::parameter_count(self)
    }

    fn set_parameter_value(&mut self, index: usize, value: ParameterValue) -> Result<()> {
        self.set_parameter(index, value)
    }

    async fn execute(&mut self) -> Result<bool> {
        ClientPreparedStatement::execute(self).await
    }

    async fn execute_batch(&mut self) -> Result<Vec<i32>> {
        ClientPreparedStatement::execute_batch(self).await
    }

    async fn metadata(&mut self) -> Result<Option<Arc<ResultSetMetadata>>> {
        ClientPreparedStatement::metadata(self).await
    }

    async fn parameter_metadata(&mut self) -> Result<Arc<ParameterMetadata>> {
        ClientPreparedStatement::parameter_metadata(self).await
    }

    fn try_clone_boxed(&self) -> Result<Box<dyn PreparedStatement>> {
        Ok(Box::new(self.clone_statement()?))
    }

    async fn close(&mut self) -> Result<()> {
        ClientPreparedStatement::close(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockProtocol;

    fn statement(sql: &str) -> (ClientPreparedStatement, Arc<MockProtocol>) {
        let mock = Arc::new(MockProtocol::new());
        let conn = Arc::new(Connection::new(mock.clone(), StatementOptions::default()));
        (conn.prepare_statement(sql).unwrap(), mock)
    }

    #[tokio::test]
    async fn empty_batch_does_not_wait_for_the_lock() {
        let (mut stmt, mock) = statement("INSERT INTO t VALUES (?)");
        let _held = Arc::clone(&stmt.lock).lock_owned().await;

        let counts = tokio::time::timeout(Duration::from_secs(1), stmt.execute_batch())
            .await
            .expect("empty batch must not block")
            .unwrap();
        assert!(counts.is_empty());
        assert_eq!(mock.bulk_attempts(), 0);
    }

    #[tokio::test]
    async fn queued_batch_waits_for_an_execution_in_flight() {
        let (mut stmt, mock) = statement("INSERT INTO t VALUES (?)");
        stmt.set_parameter(1, 1).unwrap();
        stmt.add_batch().unwrap();
        let held = Arc::clone(&stmt.lock).lock_owned().await;

        let blocked =
            tokio::time::timeout(Duration::from_millis(20), stmt.execute_batch()).await;
        assert!(blocked.is_err());
        assert_eq!(mock.bulk_attempts(), 0);

        drop(held);
        assert_eq!(stmt.execute_batch().await.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn unbound_parameter_is_reported_before_locking() {
        let (mut stmt, mock) = statement("SELECT ?, ?");
        stmt.set_parameter(1, 1).unwrap();
        let _held = Arc::clone(&stmt.lock).lock_owned().await;

        let err = tokio::time::timeout(Duration::from_secs(1), stmt.execute())
            .await
            .expect("validation must not block")
            .unwrap_err();
        assert!(matches!(err, SqlPreparedError::UnboundParameter { position: 2, .. }));
        assert!(mock.executed().is_empty());
    }

    #[test]
    fn display_lists_bound_and_unset_slots() {
        let (mut stmt, _mock) = statement("SELECT ?, ?, ?");
        stmt.set_parameter(1, 1).unwrap();
        stmt.set_parameter(3, "x").unwrap();
        assert_eq!(stmt.to_string(), "sql : 'SELECT ?, ?, ?', parameters : [1,null,'x']");
    }
}
