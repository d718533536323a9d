use std::sync::Arc;

use crate::metadata::ResultSetMetadata;
use crate::types::ParameterValue;

/// One decoded row; `values` line up with the columns of `metadata`.
#[derive(Debug, Clone)]
pub struct Row {
    pub metadata: Arc<ResultSetMetadata>,
    pub values: Vec<ParameterValue>,
}

impl Row {
    #[must_use]
    pub fn new(metadata: Arc<ResultSetMetadata>, values: Vec<ParameterValue>) -> Self {
        Self { metadata, values }
    }

    /// Value of the first column labelled `column_name`.
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&ParameterValue> {
        self.metadata
            .index_of(column_name)
            .and_then(|idx| self.values.get(idx))
    }

    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&ParameterValue> {
        self.values.get(index)
    }
}
