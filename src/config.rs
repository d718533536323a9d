use std::time::Duration;

use clap::ValueEnum;
use serde::Deserialize;

use crate::error::{Result, SqlPreparedError};

/// Scrollability requested for result sets produced by a statement.
///
/// Parses from the same kebab-case names accepted in JSON options:
/// ```rust
/// use sql_prepared::prelude::*;
///
/// let kind: ResultSetType = "scroll-insensitive".parse()?;
/// assert_eq!(kind, ResultSetType::ScrollInsensitive);
/// assert!("backwards".parse::<ResultSetType>().is_err());
/// # Ok::<(), SqlPreparedError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResultSetType {
    /// Rows can only be read once, in order
    #[default]
    ForwardOnly,
    /// Fully materialised, insensitive to later changes
    ScrollInsensitive,
    /// Scrollable and sensitive to later changes
    ScrollSensitive,
}

impl std::str::FromStr for ResultSetType {
    type Err = SqlPreparedError;

    fn from_str(s: &str) -> Result<Self> {
        <Self as ValueEnum>::from_str(s, true).map_err(|_| {
            let accepted: Vec<String> = Self::value_variants()
                .iter()
                .filter_map(|variant| variant.to_possible_value())
                .map(|value| value.get_name().to_owned())
                .collect();
            SqlPreparedError::ConfigError(format!(
                "unknown result set type '{s}' (expected one of: {})",
                accepted.join(", ")
            ))
        })
    }
}

/// Options that govern how prepared statements compile, execute and report errors.
///
/// Options can be built fluently or loaded from JSON:
/// ```rust
/// use sql_prepared::prelude::*;
///
/// let opts = StatementOptions::from_json(r#"{ "continue_batch_on_error": false }"#)?;
/// assert!(!opts.continue_batch_on_error);
/// assert_eq!(opts.max_query_size_to_log, 1024);
/// # Ok::<(), SqlPreparedError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StatementOptions {
    /// Compile queries into a rewrite-capable form so batches can be coalesced.
    pub rewrite_batched_statements: bool,
    /// Keep issuing batch entries after a failure and report the first failure at the end.
    pub continue_batch_on_error: bool,
    /// Maximum number of query characters quoted in error messages (0 = no limit).
    pub max_query_size_to_log: usize,
    /// Include the full query and its parameters in server error messages.
    pub dump_queries_on_exception: bool,
    /// Per-statement execution timeout.
    pub query_timeout: Option<Duration>,
    /// Row fetch size hint handed to the results aggregator (0 = fetch everything).
    pub fetch_size: u32,
    pub result_set_type: ResultSetType,
}

impl Default for StatementOptions {
    fn default() -> Self {
        Self {
            rewrite_batched_statements: false,
            continue_batch_on_error: true,
            max_query_size_to_log: 1024,
            dump_queries_on_exception: false,
            query_timeout: None,
            fetch_size: 0,
            result_set_type: ResultSetType::ForwardOnly,
        }
    }
}

impl StatementOptions {
    #[must_use]
    pub fn builder() -> StatementOptionsBuilder {
        StatementOptionsBuilder::new()
    }

    /// Parse options from a JSON object; missing keys keep their defaults.
    ///
    /// # Errors
    /// Returns `SqlPreparedError::ConfigError` if the document is not valid JSON or a
    /// field has the wrong type.
    pub fn from_json(json: &str) -> Result<Self> {
        let opts: Self = serde_json::from_str(json)
            .map_err(|e| SqlPreparedError::ConfigError(format!("invalid statement options: {e}")))?;
        opts.validate()?;
        Ok(opts)
    }

    /// # Errors
    /// Returns `SqlPreparedError::ConfigError` for a zero-length timeout.
    pub fn validate(&self) -> Result<()> {
        if self.query_timeout.is_some_and(|t| t.is_zero()) {
            return Err(SqlPreparedError::ConfigError(
                "query_timeout must be greater than zero (use None to disable)".to_string(),
            ));
        }
        Ok(())
    }
}

/// Fluent builder for [`StatementOptions`].
#[derive(Debug, Clone, Default)]
pub struct StatementOptionsBuilder {
    opts: StatementOptions,
}

impl StatementOptionsBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn rewrite_batched_statements(mut self, enabled: bool) -> Self {
        self.opts.rewrite_batched_statements = enabled;
        self
    }

    #[must_use]
    pub fn continue_batch_on_error(mut self, enabled: bool) -> Self {
        self.opts.continue_batch_on_error = enabled;
        self
    }

    #[must_use]
    pub fn max_query_size_to_log(mut self, size: usize) -> Self {
        self.opts.max_query_size_to_log = size;
        self
    }

    #[must_use]
    pub fn dump_queries_on_exception(mut self, enabled: bool) -> Self {
        self.opts.dump_queries_on_exception = enabled;
        self
    }

    #[must_use]
    pub fn query_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.opts.query_timeout = timeout;
        self
    }

    #[must_use]
    pub fn fetch_size(mut self, fetch_size: u32) -> Self {
        self.opts.fetch_size = fetch_size;
        self
    }

    #[must_use]
    pub fn result_set_type(mut self, result_set_type: ResultSetType) -> Self {
        self.opts.result_set_type = result_set_type;
        self
    }

    /// # Errors
    /// Returns `SqlPreparedError::ConfigError` if the options are inconsistent.
    pub fn build(self) -> Result<StatementOptions> {
        self.opts.validate()?;
        Ok(self.opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_set_type_parses_like_json_names() {
        assert_eq!(
            "FORWARD-ONLY".parse::<ResultSetType>().unwrap(),
            ResultSetType::ForwardOnly
        );
        let err = "random".parse::<ResultSetType>().unwrap_err();
        let SqlPreparedError::ConfigError(msg) = err else {
            panic!("unexpected error {err:?}");
        };
        assert!(msg.contains("forward-only, scroll-insensitive, scroll-sensitive"));
    }

    #[test]
    fn defaults_continue_on_error() {
        let opts = StatementOptions::default();
        assert!(opts.continue_batch_on_error);
        assert!(!opts.rewrite_batched_statements);
        assert_eq!(opts.query_timeout, None);
    }

    #[test]
    fn json_overrides_only_given_keys() {
        let opts = StatementOptions::from_json(
            r#"{ "rewrite_batched_statements": true, "result_set_type": "scroll-insensitive",
                 "query_timeout": { "secs": 3, "nanos": 0 } }"#,
        )
        .unwrap();
        assert!(opts.rewrite_batched_statements);
        assert!(opts.continue_batch_on_error);
        assert_eq!(opts.result_set_type, ResultSetType::ScrollInsensitive);
        assert_eq!(opts.query_timeout, Some(Duration::from_secs(3)));
    }

    #[test]
    fn rejects_bad_json_and_zero_timeout() {
        assert!(matches!(
            StatementOptions::from_json("{ \"fetch_size\": \"many\" }"),
            Err(SqlPreparedError::ConfigError(_))
        ));
        let err = StatementOptions::builder()
            .query_timeout(Some(Duration::ZERO))
            .build()
            .unwrap_err();
        assert!(matches!(err, SqlPreparedError::ConfigError(_)));
    }
}
