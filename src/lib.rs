pub mod analytics;
pub mod api;
pub mod commands;
pub mod db;
pub mod error;
pub mod models;
pub mod sync;

use std::path::{Path, PathBuf};

pub use db::{Database, TradeStore};
pub use error::{JournalError, Result};

pub const DATA_DIR_ENV: &str = "TRADE_JOURNAL_DATA_DIR";
const DEFAULT_DATA_DIR: &str = "data";
const DB_FILE_NAME: &str = "trade_journal.db";

/// Data directory: `$TRADE_JOURNAL_DATA_DIR`, or `./data`.
pub fn default_data_dir() -> PathBuf {
    std::env::var_os(DATA_DIR_ENV)
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

/// Open (and migrate) the journal database inside `data_dir`, creating the
/// directory on first use.
pub fn open_journal(data_dir: &Path) -> Result<Database> {
    std::fs::create_dir_all(data_dir)?;

    let db_path = data_dir.join(DB_FILE_NAME);
    log::info!("Database path: {:?}", db_path);

    Database::new(&db_path.to_string_lossy()).inspect_err(|e| {
        log::error!("Database initialization failed: {}", e);
        log::error!("This might be due to a failed migration or database corruption.");
        log::error!("Backups are located at: {:?}", data_dir.join("backups"));
        log::error!("To recover, replace {} with the most recent backup.", DB_FILE_NAME);
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_journal_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("nested").join("journal");

        let db = open_journal(&data_dir).unwrap();
        assert!(data_dir.join(DB_FILE_NAME).exists());
        assert_eq!(db.checklist_items().unwrap().len(), 6);
        drop(db);

        // Reopening runs no migrations and keeps the data
        let db = open_journal(&data_dir).unwrap();
        assert_eq!(db.checklist_items().unwrap().len(), 6);
    }
}
