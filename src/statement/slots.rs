use crate::types::{ParameterSet, ParameterValue};

/// Positionally indexed values bound for the next execution.
#[derive(Debug, Clone, Default)]
pub(crate) struct ParameterSlots {
    slots: Vec<Option<ParameterValue>>,
}

impl ParameterSlots {
    pub(crate) fn new(param_count: usize) -> Self {
        Self {
            slots: vec![None; param_count],
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// Store `value` at 1-based `index`; hands the value back when out of range.
    pub(crate) fn set(&mut self, index: usize, value: ParameterValue) -> Result<(), ParameterValue> {
        match index.checked_sub(1).and_then(|i| self.slots.get_mut(i)) {
            Some(slot) => {
                *slot = Some(value);
                Ok(())
            }
            None => Err(value),
        }
    }

    /// Value bound at 1-based `index`, if any.
    pub(crate) fn get(&self, index: usize) -> Option<&ParameterValue> {
        index
            .checked_sub(1)
            .and_then(|i| self.slots.get(i))
            .and_then(Option::as_ref)
    }

    /// Replace the table with `param_count` unset slots.
    pub(crate) fn reset(&mut self, param_count: usize) {
        self.slots = vec![None; param_count];
    }

    /// 1-based position of the first unset slot.
    pub(crate) fn first_unset(&self) -> Option<usize> {
        self.slots.iter().position(Option::is_none).map(|i| i + 1)
    }

    /// Freeze the current values; fails with the first unset 1-based position.
    pub(crate) fn snapshot(&self) -> Result<ParameterSet, usize> {
        if let Some(position) = self.first_unset() {
            return Err(position);
        }
        Ok(ParameterSet::new(self.slots.iter().flatten().cloned().collect()))
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = Option<&ParameterValue>> {
        self.slots.iter().map(Option::as_ref)
    }
}
