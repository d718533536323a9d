use crate::config::StatementOptions;
use crate::error::{ServerError, SqlPreparedError};
use crate::protocol::{ProtocolError, ProtocolErrorKind};
use crate::types::ParameterValue;

/// Builds coded errors that carry the connection context they were raised on.
#[derive(Debug, Clone)]
pub struct ErrorFactory {
    thread_id: u64,
    primary: bool,
    max_query_size_to_log: usize,
    dump_queries_on_exception: bool,
}

impl ErrorFactory {
    #[must_use]
    pub fn new(thread_id: u64, primary: bool, options: &StatementOptions) -> Self {
        Self {
            thread_id,
            primary,
            max_query_size_to_log: options.max_query_size_to_log,
            dump_queries_on_exception: options.dump_queries_on_exception,
        }
    }

    /// `sql`, cut to `max_query_size_to_log` characters with a trailing `...`.
    #[must_use]
    pub fn query_excerpt(&self, sql: &str) -> String {
        truncate_query(sql, self.max_query_size_to_log)
    }

    /// `conn:<thread id>(M|S)`.
    #[must_use]
    pub fn connection_label(&self) -> String {
        format!(
            "conn:{}({})",
            self.thread_id,
            if self.primary { "M" } else { "S" }
        )
    }

    #[must_use]
    pub fn binding_range(&self, index: usize, value: &ParameterValue, sql: &str) -> SqlPreparedError {
        SqlPreparedError::BindingRange {
            index,
            value: value.to_string(),
            context: format!("{} - \"{}\"", self.connection_label(), self.query_excerpt(sql)),
        }
    }

    #[must_use]
    pub fn unbound_parameter(&self, position: usize, param_count: usize) -> SqlPreparedError {
        SqlPreparedError::UnboundParameter {
            position,
            param_count,
        }
    }

    /// Map a protocol failure onto the crate taxonomy.
    ///
    /// Syntax-class failures become [`SqlPreparedError::Syntax`], interruptions become
    /// [`SqlPreparedError::Interrupted`], everything else is wrapped as
    /// [`SqlPreparedError::ServerExecution`].
    #[must_use]
    pub fn from_protocol(
        &self,
        err: ProtocolError,
        sql: &str,
        params: Option<&[ParameterValue]>,
    ) -> SqlPreparedError {
        if err.kind == ProtocolErrorKind::Interrupted {
            return SqlPreparedError::Interrupted(err.message);
        }
        let syntax = err.is_syntax();
        let server = ServerError {
            context: self.server_context(sql, params),
            message: err.message,
            sql_state: err.sql_state,
            error_code: err.error_code,
        };
        if syntax {
            SqlPreparedError::Syntax(server)
        } else {
            SqlPreparedError::ServerExecution(server)
        }
    }

    fn server_context(&self, sql: &str, params: Option<&[ParameterValue]>) -> String {
        let mut context = format!("Query - {}", self.connection_label());
        if self.dump_queries_on_exception {
            context.push_str(" - \"");
            context.push_str(&self.query_excerpt(sql));
            context.push('"');
            if let Some(params) = params
                && !params.is_empty()
            {
                let rendered: Vec<String> = params.iter().map(ToString::to_string).collect();
                context.push_str(", parameters [");
                context.push_str(&rendered.join(","));
                context.push(']');
            }
        }
        context
    }
}

/// Cut `sql` to `max_len` characters, appending `...` when shortened. `0` disables the limit.
#[must_use]
pub fn truncate_query(sql: &str, max_len: usize) -> String {
    if max_len == 0 {
        return sql.to_string();
    }
    match sql.char_indices().nth(max_len) {
        Some((cut, _)) => format!("{}...", &sql[..cut]),
        None => sql.to_string(),
    }
}
