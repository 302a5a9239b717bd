use gloo_storage::errors::StorageError;
use gloo_storage::{LocalStorage, Storage};
use pipeline::error::{HistoryError, HistoryResult};
use pipeline::{HistoryStore, TokenProvider};
use shared::HistoryRecord;

const HISTORY_KEY: &str = "recognition_history";
const TOKEN_KEY: &str = "access_token";

/// History kept in `localStorage`, shared by every tab of the origin.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalHistory;

impl LocalHistory {
    fn load(&self) -> HistoryResult<Vec<HistoryRecord>> {
        match LocalStorage::get::<Vec<HistoryRecord>>(HISTORY_KEY) {
            Ok(records) => Ok(records),
            Err(StorageError::KeyNotFound(_)) => Ok(Vec::new()),
            Err(err) => Err(storage_error(err)),
        }
    }

    fn store(&self, records: &[HistoryRecord]) -> HistoryResult<()> {
        LocalStorage::set(HISTORY_KEY, records).map_err(storage_error)
    }
}

fn storage_error(err: StorageError) -> HistoryError {
    HistoryError::Storage(err.to_string())
}

impl HistoryStore for LocalHistory {
    fn append(&self, record: HistoryRecord) -> HistoryResult<()> {
        let mut records = self.load()?;
        records.insert(0, record);
        self.store(&records)
    }

    fn list(&self) -> HistoryResult<Vec<HistoryRecord>> {
        self.load()
    }

    fn remove(&self, id: &str) -> HistoryResult<bool> {
        let mut records = self.load()?;
        let before = records.len();
        records.retain(|record| record.id != id);
        if records.len() == before {
            return Ok(false);
        }
        self.store(&records)?;
        Ok(true)
    }

    fn clear(&self) -> HistoryResult<()> {
        LocalStorage::delete(HISTORY_KEY);
        Ok(())
    }
}

/// Token saved by the login page. Stored as a plain string, not JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalToken;

impl TokenProvider for LocalToken {
    fn token(&self) -> Option<String> {
        LocalStorage::raw().get_item(TOKEN_KEY).ok().flatten()
    }
}
