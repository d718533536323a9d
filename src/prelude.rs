//! Convenient imports for common functionality.
//!
//! This module re-exports the types needed to prepare, bind and execute statements and to
//! implement a [`Protocol`].

pub use crate::compiler::CompiledQuery;
pub use crate::config::{ResultSetType, StatementOptions};
pub use crate::connection::{Connection, PooledConnection, StatementEvent, StatementEventListener};
pub use crate::error::SqlPreparedError;
pub use crate::metadata::{ParameterMetadata, ResultSetMetadata};
pub use crate::protocol::{ProbeMetadata, Protocol, ProtocolError, ServerPrepared};
pub use crate::results::{EXECUTE_FAILED, ResultSet, Results, SUCCESS_NO_INFO};
pub use crate::statement::{BatchPath, ClientPreparedStatement, PreparedStatement};
pub use crate::types::{ParameterSet, ParameterValue};
