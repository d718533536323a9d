use std::collections::HashMap;

use serde::Serialize;

/// Description of one result column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDefinition {
    pub name: String,
    pub table: String,
    pub type_name: String,
    pub nullable: bool,
    pub precision: u32,
    pub scale: u32,
}

impl ColumnDefinition {
    #[must_use]
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: String::new(),
            type_name: type_name.into(),
            nullable: true,
            precision: 0,
            scale: 0,
        }
    }
}

/// Shape of the rows a statement produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultSetMetadata {
    columns: Vec<ColumnDefinition>,
    #[serde(skip)]
    index_by_name: HashMap<String, usize>,
}

impl ResultSetMetadata {
    #[must_use]
    pub fn new(columns: Vec<ColumnDefinition>) -> Self {
        let mut index_by_name = HashMap::with_capacity(columns.len());
        for (i, col) in columns.iter().enumerate() {
            // First occurrence wins for duplicated labels.
            index_by_name.entry(col.name.clone()).or_insert(i);
        }
        Self {
            columns,
            index_by_name,
        }
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Column at 1-based `index`.
    #[must_use]
    pub fn column(&self, index: usize) -> Option<&ColumnDefinition> {
        index.checked_sub(1).and_then(|i| self.columns.get(i))
    }

    #[must_use]
    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    /// Zero-based position of the column labelled `name`.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index_by_name.get(name).copied()
    }

    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Description of one parameter marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterDefinition {
    pub type_name: String,
    pub nullable: bool,
    pub signed: bool,
    pub precision: u32,
    pub scale: u32,
}

/// Parameter shape of a statement.
///
/// `Unknown` is cached when the server could not describe the statement for a reason other
/// than invalid SQL; callers still get an answer rather than an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ParameterMetadata {
    Known(Vec<ParameterDefinition>),
    Unknown,
}

impl ParameterMetadata {
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    #[must_use]
    pub fn parameter_count(&self) -> Option<usize> {
        match self {
            Self::Known(params) => Some(params.len()),
            Self::Unknown => None,
        }
    }

    /// Parameter at 1-based `index`.
    #[must_use]
    pub fn parameter(&self, index: usize) -> Option<&ParameterDefinition> {
        match self {
            Self::Known(params) => index.checked_sub(1).and_then(|i| params.get(i)),
            Self::Unknown => None,
        }
    }
}
