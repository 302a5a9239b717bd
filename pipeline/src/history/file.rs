use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use shared::HistoryRecord;

use super::HistoryStore;
use crate::error::{HistoryError, HistoryResult};

/// History kept as a single JSON array on disk, newest record first.
///
/// Every operation reads and rewrites the whole file; a missing file is an empty history.
#[derive(Debug, Clone)]
pub struct JsonFileHistory {
    path: PathBuf,
}

impl JsonFileHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> HistoryResult<Vec<HistoryRecord>> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(source) => Err(self.io_error(source)),
        }
    }

    fn store(&self, records: &[HistoryRecord]) -> HistoryResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }
        let json = serde_json::to_vec_pretty(records)?;
        fs::write(&self.path, json).map_err(|source| self.io_error(source))
    }

    fn io_error(&self, source: std::io::Error) -> HistoryError {
        HistoryError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

impl HistoryStore for JsonFileHistory {
    fn append(&self, record: HistoryRecord) -> HistoryResult<()> {
        let mut records = self.load()?;
        log::debug!("Appending history record {} to {}", record.id, self.path.display());
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
        self.store(&[])
    }
}
