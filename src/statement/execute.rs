use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::Span;

use super::ClientPreparedStatement;
use super::strategy::BatchRun;
use crate::error::{Result, SqlPreparedError};
use crate::protocol::Protocol;
use crate::results::Results;
use crate::types::ParameterSet;

/// Holds the statement lock for one execution. Dropping it releases the lock and traces
/// the elapsed time, on every exit path.
pub(crate) struct ExecutionGuard {
    _lock: OwnedMutexGuard<()>,
    span: Span,
    kind: &'static str,
    started: Instant,
}

impl ExecutionGuard {
    pub(crate) async fn acquire(lock: &Arc<Mutex<()>>, span: &Span, kind: &'static str) -> Self {
        let guard = Arc::clone(lock).lock_owned().await;
        Self {
            _lock: guard,
            span: span.clone(),
            kind,
            started: Instant::now(),
        }
    }
}

impl Drop for ExecutionGuard {
    fn drop(&mut self) {
        let elapsed_us = u64::try_from(self.started.elapsed().as_micros()).unwrap_or(u64::MAX);
        tracing::trace!(parent: &self.span, kind = self.kind, elapsed_us, "execution finished");
    }
}

/// Await `fut`, bounded by `limit` when one is given.
async fn with_local_timer<T, F>(limit: Option<Duration>, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .unwrap_or_else(|_| Err(SqlPreparedError::Timeout(limit))),
        None => fut.await,
    }
}

impl ClientPreparedStatement {
    /// Freeze the slot table, failing on the first unset position.
    pub(super) fn validated_parameters(&self) -> Result<ParameterSet> {
        self.slots.snapshot().map_err(|position| {
            tracing::error!(parent: &self.span, position, "parameter is not set");
            self.errors.unbound_parameter(position, self.slots.len())
        })
    }

    /// `(server_timeout, local_timeout)` for a single execution: at most one of them is set.
    fn timeouts(&self, protocol: &dyn Protocol) -> (Option<Duration>, Option<Duration>) {
        match self.options.query_timeout {
            Some(limit) if protocol.supports_server_timeout() => (Some(limit), None),
            Some(limit) => (None, Some(limit)),
            None => (None, None),
        }
    }

    /// Run one execution with the current parameters.
    ///
    /// Returns `true` when the first result produced rows.
    pub(super) async fn execute_internal(&mut self, fetch_size: u32) -> Result<bool> {
        self.check_closed()?;
        let params = self.validated_parameters()?;
        let protocol = Arc::clone(self.protocol()?);

        let _guard = ExecutionGuard::acquire(&self.lock, &self.span, "execute").await;
        self.results = None;

        let mut results = Results::new(fetch_size, false, 1, self.options.result_set_type);
        let (server_timeout, local_timeout) = self.timeouts(protocol.as_ref());
        let primary = protocol.is_primary_connection();
        let values = params.values();
        let outcome = with_local_timer(local_timeout, async {
            protocol
                .execute_query(primary, &mut results, &self.compiled, values, server_timeout)
                .await
                .map_err(|e| self.errors.from_protocol(e, self.compiled.sql(), Some(values)))
        })
        .await;

        results.command_end();
        let row_producing = results.is_first_result_set();
        self.results = Some(results);
        if let Err(err) = &outcome {
            tracing::debug!(parent: &self.span, error = %err, "execution failed");
        }
        outcome.map(|()| row_producing)
    }

    /// Run every queued entry. The caller has already handled the empty queue.
    pub(super) async fn execute_batch_internal(&mut self) -> Result<()> {
        let protocol = Arc::clone(self.protocol()?);

        let _guard = ExecutionGuard::acquire(&self.lock, &self.span, "batch").await;
        self.results = None;
        self.last_batch_path = None;

        let mut results = Results::new(0, true, self.batch.len(), self.options.result_set_type);
        // The bulk call carries no timeout, so batches are always bounded locally.
        let local_timeout = self.options.query_timeout;
        let run = BatchRun {
            protocol: protocol.as_ref(),
            query: &self.compiled,
            entries: self.batch.entries(),
            has_long_data: self.batch.has_long_data(),
            continue_on_error: self.options.continue_batch_on_error,
            timeout: self.options.query_timeout,
            errors: &self.errors,
            span: &self.span,
        };
        let outcome = with_local_timer(local_timeout, run.execute(&mut results)).await;

        results.command_end();
        self.results = Some(results);
        match outcome {
            Ok(path) => {
                tracing::debug!(parent: &self.span, ?path, entries = self.batch.len(), "batch executed");
                self.last_batch_path = Some(path);
                Ok(())
            }
            Err(err) => {
                tracing::debug!(parent: &self.span, error = %err, "batch failed");
                Err(err)
            }
        }
    }
}
