//! Client-side prepared statement execution.
//!
//! Binds positional parameters to a compiled query, executes it once or as a batch, picks
//! between a bulk path and one round trip per entry, and discovers result and parameter
//! metadata lazily. Everything that touches the wire sits behind the [`Protocol`] trait.

pub mod compiler;
pub mod config;
pub mod connection;
pub mod error;
pub mod error_factory;
pub mod metadata;
pub mod prelude;
pub mod protocol;
pub mod results;
pub mod statement;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use compiler::{CompiledQuery, RewriteParts};
pub use config::{ResultSetType, StatementOptions, StatementOptionsBuilder};
pub use connection::{Connection, PooledConnection, StatementEvent, StatementEventListener};
pub use error::{Result, ServerError, SqlPreparedError};
pub use error_factory::ErrorFactory;
pub use metadata::{ColumnDefinition, ParameterDefinition, ParameterMetadata, ResultSetMetadata};
pub use protocol::{ProbeMetadata, Protocol, ProtocolError, ProtocolErrorKind, ServerPrepared};
pub use results::{CmdInformation, EXECUTE_FAILED, ResultSet, Results, Row, SUCCESS_NO_INFO};
pub use statement::{BatchPath, ClientPreparedStatement, PreparedStatement};
pub use types::{ParameterSet, ParameterValue};
