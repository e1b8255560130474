use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

// Goes through `log` in the binary and straight to stdout under `cargo test`
macro_rules! migration_log {
    ($level:ident, $($arg:tt)*) => {
        #[cfg(not(test))]
        {
            log::$level!($($arg)*);
        }
        #[cfg(test)]
        {
            println!("[{}] {}", stringify!($level), format!($($arg)*));
        }
    };
}

const KEPT_BACKUPS: usize = 5;
const BACKUP_PREFIX: &str = "trade_journal_v";

/// One schema step. Versions start at 0 (the bookkeeping table) and have no gaps.
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub sql: &'static str,
}

impl Migration {
    pub const fn new(version: u32, name: &'static str, sql: &'static str) -> Self {
        Self { version, name, sql }
    }

    /// Hex SHA-256 of the SQL text, recorded when the step is applied.
    pub fn checksum(&self) -> String {
        format!("{:x}", Sha256::digest(self.sql.as_bytes()))
    }
}

const JOURNAL_MIGRATIONS: &[Migration] = &[
    Migration::new(0, "bootstrap", include_str!("migrations/000_bootstrap.sql")),
    Migration::new(1, "initial_schema", include_str!("migrations/001_initial_schema.sql")),
    Migration::new(2, "add_checklist_items", include_str!("migrations/002_add_checklist_items.sql")),
];

pub struct MigrationRunner {
    migrations: Vec<Migration>,
}

impl MigrationRunner {
    pub fn new() -> Self {
        Self {
            migrations: JOURNAL_MIGRATIONS.to_vec(),
        }
    }

    /// Bring the journal schema up to the newest version.
    ///
    /// A journal that already has tables is copied into `backups/` next to
    /// `db_path` first; fresh and in-memory databases are not.
    pub fn run_pending_migrations(&self, conn: &Connection, db_path: &str) -> Result<usize> {
        if !self.has_schema_migrations_table(conn)? {
            migration_log!(info, "New journal database, recording schema versions");
            self.apply_migration(conn, &self.migrations[0])?;
        }

        let from_version = self.get_current_version(conn)?.unwrap_or(0);
        let pending: Vec<&Migration> = self
            .migrations
            .iter()
            .filter(|m| m.version > from_version)
            .collect();

        let Some(newest) = pending.last() else {
            return Ok(0);
        };
        migration_log!(
            info,
            "Upgrading journal schema v{} -> v{} ({} steps)",
            from_version,
            newest.version,
            pending.len()
        );

        let backup = if from_version > 0 && !is_in_memory(db_path) {
            Some(self.create_backup(db_path, newest.version)?)
        } else {
            None
        };

        for (applied, migration) in pending.iter().enumerate() {
            if let Err(e) = self.apply_migration(conn, migration) {
                migration_log!(
                    error,
                    "Schema step {} ({}) failed and was rolled back: {}",
                    migration.version,
                    migration.name,
                    e
                );
                if let Some(path) = &backup {
                    migration_log!(error, "Journal as it was before the upgrade: {}", path.display());
                }
                migration_log!(warn, "{} of {} steps were applied", applied, pending.len());
                return Err(e);
            }
        }

        Ok(pending.len())
    }

    fn apply_migration(&self, conn: &Connection, migration: &Migration) -> Result<()> {
        let started = Instant::now();

        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(migration.sql)?;
        let elapsed_ms = started.elapsed().as_millis() as i64;
        tx.execute(
            "INSERT INTO schema_migrations (version, name, applied_at, checksum, execution_time_ms)
             VALUES (?, ?, ?, ?, ?)",
            params![
                migration.version,
                migration.name,
                Utc::now().timestamp(),
                migration.checksum(),
                elapsed_ms
            ],
        )?;
        tx.commit()?;

        migration_log!(info, "Schema v{} ({}) applied in {}ms", migration.version, migration.name, elapsed_ms);
        Ok(())
    }

    /// Fail if the SQL of an applied step differs from what this build ships.
    pub fn verify_migrations(&self, conn: &Connection) -> Result<()> {
        let mut stmt = conn.prepare(
            "SELECT version, name, checksum FROM schema_migrations WHERE checksum IS NOT NULL ORDER BY version",
        )?;
        let recorded = stmt
            .query_map([], |row| Ok((row.get::<_, u32>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?)))?
            .collect::<Result<Vec<_>>>()?;

        for (version, name, checksum) in recorded {
            let Some(known) = self.migrations.iter().find(|m| m.version == version) else {
                migration_log!(warn, "Journal has schema v{} ({}) from a newer build", version, name);
                continue;
            };
            if known.checksum() != checksum {
                migration_log!(error, "Schema v{} ({}) was changed after it was applied", version, name);
                return Err(sqlite_failure(format!(
                    "checksum mismatch for schema v{} ({}): recorded {}, expected {}",
                    version,
                    name,
                    checksum,
                    known.checksum()
                )));
            }
        }

        Ok(())
    }

    pub fn get_current_version(&self, conn: &Connection) -> Result<Option<u32>> {
        if !self.has_schema_migrations_table(conn)? {
            return Ok(None);
        }

        Ok(conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| row.get(0))
            .optional()?
            .flatten())
    }

    /// Online copy of the journal, checked with `integrity_check`.
    fn create_backup(&self, db_path: &str, target_version: u32) -> Result<PathBuf> {
        let backup_dir = Path::new(db_path)
            .parent()
            .ok_or_else(|| rusqlite::Error::InvalidPath(PathBuf::from(db_path)))?
            .join("backups");
        fs::create_dir_all(&backup_dir)
            .map_err(|e| io_failure("Cannot create backup directory", e))?;

        let backup_path = backup_dir.join(format!(
            "{}{}_{}.db",
            BACKUP_PREFIX,
            target_version,
            Utc::now().format("%Y%m%d_%H%M%S%3f")
        ));

        let source = Connection::open(db_path)?;
        let mut copy = Connection::open(&backup_path)?;
        rusqlite::backup::Backup::new(&source, &mut copy)?.run_to_completion(
            64,
            std::time::Duration::from_millis(50),
            None,
        )?;

        let integrity: String = copy.pragma_query_value(None, "integrity_check", |row| row.get(0))?;
        if integrity != "ok" {
            return Err(sqlite_failure(format!(
                "backup {} failed integrity check: {}",
                backup_path.display(),
                integrity
            )));
        }
        migration_log!(info, "Journal backed up to {}", backup_path.display());

        prune_backups(&backup_dir, KEPT_BACKUPS)?;
        Ok(backup_path)
    }

    fn has_schema_migrations_table(&self, conn: &Connection) -> Result<bool> {
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_migrations')",
            [],
            |row| row.get(0),
        )
    }
}

/// Delete all but the `keep` newest journal backups. Names embed a sortable
/// timestamp, so name order is age order.
fn prune_backups(backup_dir: &Path, keep: usize) -> Result<()> {
    let mut names: Vec<String> = fs::read_dir(backup_dir)
        .map_err(|e| io_failure("Cannot list backups", e))?
        .filter_map(|entry| entry.ok()?.file_name().into_string().ok())
        .filter(|name| name.starts_with(BACKUP_PREFIX) && name.ends_with(".db"))
        .collect();
    names.sort();

    let excess = names.len().saturating_sub(keep);
    for name in &names[..excess] {
        if let Err(e) = fs::remove_file(backup_dir.join(name)) {
            migration_log!(warn, "Could not remove old backup {}: {}", name, e);
        }
    }
    Ok(())
}

fn is_in_memory(db_path: &str) -> bool {
    db_path.is_empty() || db_path == ":memory:"
}

fn sqlite_failure(message: String) -> rusqlite::Error {
    rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(1), Some(message))
}

fn io_failure(context: &str, err: std::io::Error) -> rusqlite::Error {
    sqlite_failure(format!("{}: {}", context, err))
}
