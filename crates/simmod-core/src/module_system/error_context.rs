use std::collections::VecDeque;

use crate::kernel::constants::ERROR_HISTORY_CAPACITY;
use crate::module_system::interface::ModuleFailure;

/// Errors recorded against one module while it is initialized.
///
/// Keeps the most recent [`ERROR_HISTORY_CAPACITY`] entries; the oldest is
/// evicted first.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    history: VecDeque<ModuleFailure>,
    total: usize,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, failure: ModuleFailure) {
        if self.history.len() == ERROR_HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(failure);
        self.total += 1;
    }

    pub fn last(&self) -> Option<&ModuleFailure> {
        self.history.back()
    }

    /// Oldest first
    pub fn history(&self) -> impl Iterator<Item = &ModuleFailure> {
        self.history.iter()
    }

    /// Errors recorded since creation, including evicted ones
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}
