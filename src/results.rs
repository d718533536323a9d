mod cmd_information;
mod result_set;
mod row;

pub use cmd_information::{CmdInformation, EXECUTE_FAILED, SUCCESS_NO_INFO};
pub use result_set::ResultSet;
pub use row::Row;

use crate::config::ResultSetType;

/// Aggregates everything one execution (or one batch) produced.
///
/// A fresh handle is created for every `execute*` call. The protocol records update
/// counts and result sets on it; the statement finalises it with [`Results::command_end`]
/// whether the execution succeeded or not.
#[derive(Debug, Clone)]
pub struct Results {
    fetch_size: u32,
    batch: bool,
    result_set_type: ResultSetType,
    cmd_information: CmdInformation,
    result_set: Option<ResultSet>,
    ended: bool,
}

impl Results {
    #[must_use]
    pub fn new(
        fetch_size: u32,
        batch: bool,
        expected_size: usize,
        result_set_type: ResultSetType,
    ) -> Self {
        Self {
            fetch_size,
            batch,
            result_set_type,
            cmd_information: CmdInformation::new(expected_size),
            result_set: None,
            ended: false,
        }
    }

    /// Record an update result.
    pub fn add_stats(&mut self, update_count: i64, insert_id: i64) {
        self.cmd_information.add_success_stat(update_count, insert_id);
    }

    /// Record a row-producing result. The first one becomes the current result set.
    pub fn add_result_set(&mut self, result_set: ResultSet) {
        self.cmd_information.add_result_set_stat();
        if self.result_set.is_none() {
            self.result_set = Some(result_set);
        }
    }

    /// Record a failed batch entry.
    pub fn add_error_stat(&mut self) {
        self.cmd_information.add_error_stat();
    }

    /// Mark the batch as sent in rewritten (coalesced) form.
    pub fn set_rewritten(&mut self, rewritten: bool) {
        self.cmd_information.set_rewritten(rewritten);
    }

    /// Finalise the handle. Idempotent.
    pub fn command_end(&mut self) {
        self.ended = true;
    }

    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    #[must_use]
    pub fn is_batch(&self) -> bool {
        self.batch
    }

    #[must_use]
    pub fn fetch_size(&self) -> u32 {
        self.fetch_size
    }

    #[must_use]
    pub fn result_set_type(&self) -> ResultSetType {
        self.result_set_type
    }

    #[must_use]
    pub fn result_set(&self) -> Option<&ResultSet> {
        self.result_set.as_ref()
    }

    /// `true` when the first result produced rows.
    #[must_use]
    pub fn is_first_result_set(&self) -> bool {
        self.cmd_information.first_is_result_set()
    }

    /// Update count of the first result, `None` when it produced rows.
    #[must_use]
    pub fn update_count(&self) -> Option<i64> {
        self.cmd_information.first_update_count()
    }

    #[must_use]
    pub fn cmd_information(&self) -> &CmdInformation {
        &self.cmd_information
    }
}
