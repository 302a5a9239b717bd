//! Persistent log of completed analyses.

mod memory;
mod stats;

#[cfg(feature = "native")]
mod file;

pub use memory::MemoryHistory;
pub use stats::{export_json, ClassCount, ConfidenceBucket, HistoryStats};

#[cfg(feature = "native")]
pub use file::JsonFileHistory;

use shared::HistoryRecord;

use crate::error::HistoryResult;

/// Storage for [`HistoryRecord`]s. Records are immutable once appended.
pub trait HistoryStore {
    fn append(&self, record: HistoryRecord) -> HistoryResult<()>;

    /// All records, newest first.
    fn list(&self) -> HistoryResult<Vec<HistoryRecord>>;

    /// Delete the record with `id`. Returns whether anything was removed.
    fn remove(&self, id: &str) -> HistoryResult<bool>;

    fn clear(&self) -> HistoryResult<()>;
}

impl<S: HistoryStore + ?Sized> HistoryStore for std::rc::Rc<S> {
    fn append(&self, record: HistoryRecord) -> HistoryResult<()> {
        (**self).append(record)
    }

    fn list(&self) -> HistoryResult<Vec<HistoryRecord>> {
        (**self).list()
    }

    fn remove(&self, id: &str) -> HistoryResult<bool> {
        (**self).remove(id)
    }

    fn clear(&self) -> HistoryResult<()> {
        (**self).clear()
    }
}
