use std::sync::Arc;

use super::row::Row;
use crate::metadata::ResultSetMetadata;
use crate::types::ParameterValue;

/// Rows produced by one execution.
///
/// Row decoding belongs to the protocol; it pushes already-decoded values here. A result set
/// with no metadata is the empty result returned by `execute_query` for update-only
/// statements.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    rows: Vec<Row>,
    metadata: Option<Arc<ResultSetMetadata>>,
}

impl ResultSet {
    #[must_use]
    pub fn new(metadata: Arc<ResultSetMetadata>) -> Self {
        Self {
            rows: Vec::new(),
            metadata: Some(metadata),
        }
    }

    /// A result set with no columns and no rows.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(metadata: Arc<ResultSetMetadata>, capacity: usize) -> Self {
        Self {
            rows: Vec::with_capacity(capacity),
            metadata: Some(metadata),
        }
    }

    #[must_use]
    pub fn metadata(&self) -> Option<&Arc<ResultSetMetadata>> {
        self.metadata.as_ref()
    }

    /// Add a row to the result set. Rows are ignored when the set carries no metadata.
    pub fn add_row_values(&mut self, values: Vec<ParameterValue>) {
        if let Some(metadata) = &self.metadata {
            self.rows.push(Row::new(Arc::clone(metadata), values));
        }
    }

    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
