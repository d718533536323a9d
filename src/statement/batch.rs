use crate::types::ParameterSet;

/// Parameter sets queued by `add_batch`, in execution order.
#[derive(Debug, Clone, Default)]
pub(crate) struct BatchQueue {
    entries: Vec<ParameterSet>,
    has_long_data: bool,
}

impl BatchQueue {
    pub(crate) fn push(&mut self, entry: ParameterSet) {
        self.entries.push(entry);
    }

    /// Drop every entry and forget that long data was bound.
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.has_long_data = false;
    }

    pub(crate) fn mark_long_data(&mut self) {
        self.has_long_data = true;
    }

    pub(crate) fn has_long_data(&self) -> bool {
        self.has_long_data
    }

    pub(crate) fn entries(&self) -> &[ParameterSet] {
        &self.entries
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
