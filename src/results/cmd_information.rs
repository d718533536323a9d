/// Update count reported for a batch entry that succeeded without a known row count.
pub const SUCCESS_NO_INFO: i64 = -2;
/// Update count reported for a batch entry that failed.
pub const EXECUTE_FAILED: i64 = -3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmdEntry {
    Update { count: i64, insert_id: i64 },
    ResultSet,
    Failed,
}

/// Per-command outcome of one execution or one batch.
#[derive(Debug, Clone, Default)]
pub struct CmdInformation {
    expected_size: usize,
    entries: Vec<CmdEntry>,
    rewritten: bool,
}

impl CmdInformation {
    pub(crate) fn new(expected_size: usize) -> Self {
        Self {
            expected_size,
            entries: Vec::with_capacity(expected_size),
            rewritten: false,
        }
    }

    pub(crate) fn add_success_stat(&mut self, count: i64, insert_id: i64) {
        self.entries.push(CmdEntry::Update { count, insert_id });
    }

    pub(crate) fn add_result_set_stat(&mut self) {
        self.entries.push(CmdEntry::ResultSet);
    }

    pub(crate) fn add_error_stat(&mut self) {
        self.entries.push(CmdEntry::Failed);
    }

    pub(crate) fn set_rewritten(&mut self, rewritten: bool) {
        self.rewritten = rewritten;
    }

    #[must_use]
    pub fn is_rewritten(&self) -> bool {
        self.rewritten
    }

    /// Number of commands recorded so far, failures included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Per-entry counts in queue order.
    ///
    /// When the batch was rewritten into fewer statements than entries, the server counts
    /// cannot be attributed to entries and every entry reports [`SUCCESS_NO_INFO`].
    #[must_use]
    pub fn large_update_counts(&self) -> Vec<i64> {
        if self.rewritten && self.entries.len() != self.expected_size {
            return vec![SUCCESS_NO_INFO; self.expected_size];
        }
        self.entries
            .iter()
            .map(|entry| match entry {
                CmdEntry::Update { count, .. } => *count,
                CmdEntry::ResultSet => SUCCESS_NO_INFO,
                CmdEntry::Failed => EXECUTE_FAILED,
            })
            .collect()
    }

    #[must_use]
    pub fn update_counts(&self) -> Vec<i32> {
        self.large_update_counts()
            .into_iter()
            .map(clamp_count)
            .collect()
    }

    /// Counts exactly as the server reported them; failed entries are left out.
    #[must_use]
    pub fn large_server_update_counts(&self) -> Vec<i64> {
        self.entries
            .iter()
            .filter_map(|entry| match entry {
                CmdEntry::Update { count, .. } => Some(*count),
                CmdEntry::ResultSet | CmdEntry::Failed => None,
            })
            .collect()
    }

    #[must_use]
    pub fn server_update_counts(&self) -> Vec<i32> {
        self.large_server_update_counts()
            .into_iter()
            .map(clamp_count)
            .collect()
    }

    /// Auto-generated ids reported with each successful update.
    #[must_use]
    pub fn insert_ids(&self) -> Vec<i64> {
        self.entries
            .iter()
            .filter_map(|entry| match entry {
                CmdEntry::Update { insert_id, .. } => Some(*insert_id),
                CmdEntry::ResultSet | CmdEntry::Failed => None,
            })
            .collect()
    }

    /// Update count of the first command, `None` when it produced rows or nothing ran.
    #[must_use]
    pub fn first_update_count(&self) -> Option<i64> {
        match self.entries.first() {
            Some(CmdEntry::Update { count, .. }) => Some(*count),
            _ => None,
        }
    }

    #[must_use]
    pub fn first_is_result_set(&self) -> bool {
        matches!(self.entries.first(), Some(CmdEntry::ResultSet))
    }
}

fn clamp_count(count: i64) -> i32 {
    i32::try_from(count).unwrap_or(if count < 0 { i32::MIN } else { i32::MAX })
}
