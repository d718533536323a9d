use std::sync::{Arc, Mutex};

use tracing::Span;

use crate::compiler::CompiledQuery;
use crate::config::StatementOptions;
use crate::error::Result;
use crate::error_factory::ErrorFactory;
use crate::protocol::Protocol;
use crate::statement::ClientPreparedStatement;

/// Event delivered to pooled-connection listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementEvent {
    pub sql: String,
    pub thread_id: u64,
}

/// Receives statement lifecycle notifications from a pooled connection.
pub trait StatementEventListener: Send + Sync {
    fn statement_closed(&self, event: &StatementEvent);
}

/// Pool-side view of a physical connection: the listeners interested in its statements.
#[derive(Default)]
pub struct PooledConnection {
    listeners: Mutex<Vec<Arc<dyn StatementEventListener>>>,
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl PooledConnection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_statement_event_listener(&self, listener: Arc<dyn StatementEventListener>) {
        self.lock_listeners().push(listener);
    }

    pub fn remove_statement_event_listener(&self, listener: &Arc<dyn StatementEventListener>) {
        self.lock_listeners().retain(|l| !Arc::ptr_eq(l, listener));
    }

    #[must_use]
    pub fn no_stmt_event_listeners(&self) -> bool {
        self.lock_listeners().is_empty()
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.lock_listeners().len()
    }

    pub fn fire_statement_closed(&self, event: &StatementEvent) {
        // Snapshot so a listener may (de)register others while being notified.
        let listeners: Vec<_> = self.lock_listeners().clone();
        for listener in listeners {
            listener.statement_closed(event);
        }
    }

    fn lock_listeners(&self) -> std::sync::MutexGuard<'_, Vec<Arc<dyn StatementEventListener>>> {
        match self.listeners.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// A logical connection: the protocol to execute on plus the defaults for its statements.
///
/// ```rust
/// # use std::sync::Arc;
/// # use sql_prepared::prelude::*;
/// # fn demo(protocol: Arc<dyn Protocol>) -> Result<(), SqlPreparedError> {
/// let conn = Arc::new(Connection::new(protocol, StatementOptions::default()));
/// let mut stmt = conn.prepare_statement("SELECT * FROM t WHERE id = ?")?;
/// stmt.set_parameter(1, 42)?;
/// # Ok(()) }
/// ```
pub struct Connection {
    protocol: Arc<dyn Protocol>,
    options: StatementOptions,
    pooled: Option<Arc<PooledConnection>>,
    span: Span,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("protocol", &"<dyn Protocol>")
            .field("options", &self.options)
            .field("pooled", &self.pooled)
            .finish()
    }
}

impl Connection {
    #[must_use]
    pub fn new(protocol: Arc<dyn Protocol>, options: StatementOptions) -> Self {
        let span = tracing::info_span!(
            "connection",
            thread_id = protocol.server_thread_id(),
            primary = protocol.is_primary_connection()
        );
        Self {
            protocol,
            options,
            pooled: None,
            span,
        }
    }

    /// Attach the pool-side connection whose listeners are told about closed statements.
    #[must_use]
    pub fn with_pooled(mut self, pooled: Arc<PooledConnection>) -> Self {
        self.pooled = Some(pooled);
        self
    }

    /// Use `span` as the parent of every statement span created on this connection.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    #[must_use]
    pub fn protocol(&self) -> &Arc<dyn Protocol> {
        &self.protocol
    }

    #[must_use]
    pub fn options(&self) -> &StatementOptions {
        &self.options
    }

    #[must_use]
    pub fn pooled(&self) -> Option<&Arc<PooledConnection>> {
        self.pooled.as_ref()
    }

    #[must_use]
    pub fn span(&self) -> &Span {
        &self.span
    }

    #[must_use]
    pub fn error_factory(&self, options: &StatementOptions) -> ErrorFactory {
        ErrorFactory::new(
            self.protocol.server_thread_id(),
            self.protocol.is_primary_connection(),
            options,
        )
    }

    /// Compile `sql` once and return a client-side prepared statement using the
    /// connection's default options.
    ///
    /// # Errors
    /// Returns `SqlPreparedError::ConfigError` if the connection options are invalid.
    pub fn prepare_statement(self: &Arc<Self>, sql: &str) -> Result<ClientPreparedStatement> {
        self.prepare_statement_with(sql, self.options.clone())
    }

    /// Like [`Connection::prepare_statement`] with per-statement options.
    ///
    /// # Errors
    /// Returns `SqlPreparedError::ConfigError` if `options` are invalid.
    pub fn prepare_statement_with(
        self: &Arc<Self>,
        sql: &str,
        options: StatementOptions,
    ) -> Result<ClientPreparedStatement> {
        options.validate()?;
        let no_backslash_escapes = self.protocol.no_backslash_escapes();
        let compiled = if options.rewrite_batched_statements {
            CompiledQuery::rewritable_parts(sql, no_backslash_escapes)
        } else {
            CompiledQuery::parameter_parts(sql, no_backslash_escapes)
        };
        Ok(ClientPreparedStatement::new(
            Arc::clone(self),
            Arc::new(compiled),
            options,
        ))
    }
}
