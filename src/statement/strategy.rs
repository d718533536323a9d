use std::time::Duration;

use tracing::Span;

use crate::compiler::CompiledQuery;
use crate::error::{Result, SqlPreparedError};
use crate::error_factory::ErrorFactory;
use crate::protocol::Protocol;
use crate::results::Results;
use crate::types::ParameterSet;

/// How a batch ended up being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPath {
    /// The protocol coalesced the entries itself.
    Bulk,
    /// One round trip per entry.
    Sequential,
}

/// Everything the strategy needs, borrowed from the statement for one batch run.
pub(crate) struct BatchRun<'a> {
    pub(crate) protocol: &'a dyn Protocol,
    pub(crate) query: &'a CompiledQuery,
    pub(crate) entries: &'a [ParameterSet],
    pub(crate) has_long_data: bool,
    pub(crate) continue_on_error: bool,
    /// Statement timeout, if any. Its presence turns on interrupt polling between entries;
    /// the limit itself is enforced by the caller's local timer around the whole run.
    pub(crate) timeout: Option<Duration>,
    pub(crate) errors: &'a ErrorFactory,
    pub(crate) span: &'a Span,
}

impl BatchRun<'_> {
    /// Try the bulk path, then fall back to sequential issuance.
    ///
    /// With `continue_on_error` every entry is issued and only the first failure is
    /// returned once the loop is done; otherwise the first failure stops the loop.
    pub(crate) async fn execute(&self, results: &mut Results) -> Result<BatchPath> {
        let primary = self.protocol.is_primary_connection();
        let sql = self.query.sql();

        let bulk = self
            .protocol
            .execute_batch_client(primary, results, self.query, self.entries, self.has_long_data)
            .await
            .map_err(|e| self.errors.from_protocol(e, sql, None))?;
        if bulk {
            return Ok(BatchPath::Bulk);
        }
        tracing::debug!(
            parent: self.span,
            entries = self.entries.len(),
            "bulk batch not performed, sending entries one by one"
        );

        let mut first_error: Option<SqlPreparedError> = None;
        for (i, entry) in self.entries.iter().enumerate() {
            if self.timeout.is_some() {
                self.protocol
                    .stop_if_interrupted()
                    .map_err(|e| self.errors.from_protocol(e, sql, None))?;
            }
            let outcome = self
                .protocol
                .execute_query(primary, results, self.query, entry.values(), None)
                .await;
            if let Err(err) = outcome {
                results.add_error_stat();
                let err = self.errors.from_protocol(err, sql, Some(entry.values()));
                if !self.continue_on_error {
                    return Err(err);
                }
                tracing::debug!(
                    parent: self.span,
                    entry = i + 1,
                    error = %err,
                    "batch entry failed, continuing"
                );
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(BatchPath::Sequential),
        }
    }
}
