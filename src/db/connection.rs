use rusqlite::Connection;
use std::sync::Mutex;

use crate::db::migration_runner::MigrationRunner;
use crate::error::Result;

pub struct Database {
    pub conn: Mutex<Connection>,
}

impl Database {
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        // WAL keeps readers unblocked while an import writes
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Self::migrate(conn, db_path)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::migrate(Connection::open_in_memory()?, ":memory:")
    }

    fn migrate(conn: Connection, db_path: &str) -> Result<Self> {
        let runner = MigrationRunner::new();

        let applied = runner.run_pending_migrations(&conn, db_path)?;
        runner.verify_migrations(&conn)?;

        let version = runner.get_current_version(&conn)?.unwrap_or(0);
        if applied > 0 {
            log::info!("Journal schema at v{} ({} steps applied)", version, applied);
        } else {
            log::debug!("Journal schema at v{}", version);
        }

        Ok(Database {
            conn: Mutex::new(conn),
        })
    }
}
