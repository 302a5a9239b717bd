use std::cell::RefCell;
use std::rc::Rc;

use shared::HistoryRecord;

use super::HistoryStore;
use crate::error::HistoryResult;

/// In-process history. Clones share the same records.
#[derive(Debug, Clone, Default)]
pub struct MemoryHistory {
    records: Rc<RefCell<Vec<HistoryRecord>>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }
}

impl HistoryStore for MemoryHistory {
    fn append(&self, record: HistoryRecord) -> HistoryResult<()> {
        self.records.borrow_mut().insert(0, record);
        Ok(())
    }

    fn list(&self) -> HistoryResult<Vec<HistoryRecord>> {
        Ok(self.records.borrow().clone())
    }

    fn remove(&self, id: &str) -> HistoryResult<bool> {
        let mut records = self.records.borrow_mut();
        let before = records.len();
        records.retain(|record| record.id != id);
        Ok(records.len() != before)
    }

    fn clear(&self) -> HistoryResult<()> {
        self.records.borrow_mut().clear();
        Ok(())
    }
}
