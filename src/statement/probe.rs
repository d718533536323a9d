use std::sync::Arc;

use tracing::Span;

use super::ClientPreparedStatement;
use crate::error::Result;
use crate::metadata::{ParameterMetadata, ResultSetMetadata};
use crate::protocol::{ProbeMetadata, Protocol, ProtocolError};
use crate::results::{ResultSet, Results};

/// Metadata discovered by the probe, shared with clones.
///
/// `parameters` is set once a probe has run (successfully or not). `result` stays unset
/// until a probe describes rows, so `metadata()` keeps probing until then.
#[derive(Debug, Clone, Default)]
pub(crate) struct MetadataCache {
    pub(crate) result: Option<Arc<ResultSetMetadata>>,
    pub(crate) parameters: Option<Arc<ParameterMetadata>>,
}

/// Prepare `sql` on the server, describe it, and release the handle whatever happened.
async fn probe(
    protocol: &dyn Protocol,
    sql: &str,
    span: &Span,
) -> std::result::Result<ProbeMetadata, ProtocolError> {
    let mut handle = protocol.open_probe(sql).await?;
    let described = handle.describe().await;
    if let Err(err) = handle.close().await {
        tracing::debug!(parent: span, error = %err, "closing metadata probe failed");
    }
    described
}

impl ClientPreparedStatement {
    /// Metadata of the rows this statement produces, `None` when it produces none or the
    /// server could not describe it.
    ///
    /// # Errors
    /// `StatementClosed` after close, `Syntax` when the server rejects the query text.
    pub async fn metadata(&mut self) -> Result<Option<Arc<ResultSetMetadata>>> {
        self.check_closed()?;
        if let Some(current) = self
            .results
            .as_ref()
            .and_then(Results::result_set)
            .and_then(ResultSet::metadata)
        {
            return Ok(Some(Arc::clone(current)));
        }
        if self.metadata.result.is_none() {
            self.load_parameters_data().await?;
        }
        Ok(self.metadata.result.clone())
    }

    /// Parameter metadata; [`ParameterMetadata::Unknown`] when the server could not
    /// describe the statement.
    ///
    /// # Errors
    /// `StatementClosed` after close, `Syntax` when the server rejects the query text.
    pub async fn parameter_metadata(&mut self) -> Result<Arc<ParameterMetadata>> {
        self.check_closed()?;
        match &self.metadata.parameters {
            Some(parameters) => Ok(Arc::clone(parameters)),
            None => self.load_parameters_data().await,
        }
    }

    async fn load_parameters_data(&mut self) -> Result<Arc<ParameterMetadata>> {
        let protocol = Arc::clone(self.protocol()?);
        let sql = self.compiled.sql();
        tracing::debug!(parent: &self.span, "probing statement metadata");

        match probe(protocol.as_ref(), sql, &self.span).await {
            Ok(described) => {
                let parameters = Arc::new(described.parameters);
                self.metadata.result = described.result.map(Arc::new);
                self.metadata.parameters = Some(Arc::clone(&parameters));
                Ok(parameters)
            }
            Err(err) if err.is_syntax() => Err(self.errors.from_protocol(err, sql, None)),
            Err(err) => {
                tracing::warn!(
                    parent: &self.span,
                    error = %err,
                    "metadata probe failed, parameter metadata unknown"
                );
                let parameters = self
                    .metadata
                    .parameters
                    .get_or_insert_with(|| Arc::new(ParameterMetadata::Unknown));
                Ok(Arc::clone(parameters))
            }
        }
    }
}
