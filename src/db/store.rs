use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{BTreeMap, HashSet};

use crate::db::Database;
use crate::error::{JournalError, Result};
use crate::models::Trade;

/// Persistence capability the application works through. The analytics
/// engine never sees it; callers load a snapshot and hand it over.
pub trait TradeStore {
    /// All trades, newest first.
    fn load_trades(&self) -> Result<Vec<Trade>>;

    fn get_trade(&self, id: &str) -> Result<Trade>;

    fn insert_trade(&self, trade: &Trade) -> Result<()>;

    /// Overwrite the stored record with the same id.
    fn save_trade(&self, trade: &Trade) -> Result<()>;

    fn delete_trade(&self, id: &str) -> Result<()>;

    /// Swap the whole collection in one transaction. The checklist list is
    /// replaced only when given.
    fn replace_all(&self, trades: &[Trade], checklist_items: Option<&[String]>) -> Result<usize>;

    fn checklist_items(&self) -> Result<Vec<String>>;

    fn set_checklist_items(&self, items: &[String]) -> Result<()>;
}

const TRADE_COLUMNS: &str = "id, screenshot, category, tags, outcome, pnl, notes, checklist, \
                             timestamp, hour, created_at, updated_at";

/// Helper function to map a database row to a Trade struct
fn map_row_to_trade(row: &rusqlite::Row) -> rusqlite::Result<Trade> {
    let category: Option<String> = row.get(2)?;
    let outcome: Option<String> = row.get(4)?;
    let checklist: String = row.get(7)?;
    let hour: Option<i64> = row.get(9)?;

    Ok(Trade {
        id: row.get(0)?,
        screenshot: row.get(1)?,
        category: category.and_then(|c| c.parse().ok()),
        tags: row.get(3)?,
        outcome: outcome.and_then(|o| o.parse().ok()),
        pnl: row.get(5)?,
        notes: row.get(6)?,
        checklist: serde_json::from_str::<BTreeMap<String, bool>>(&checklist).unwrap_or_else(|e| {
            log::warn!("Unreadable checklist on a stored trade, treating as empty: {}", e);
            BTreeMap::new()
        }),
        timestamp: row.get(8)?,
        hour: hour.filter(|h| (0..24).contains(h)).map(|h| h as u32),
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn write_trade(conn: &Connection, verb: &str, trade: &Trade) -> Result<()> {
    let checklist = serde_json::to_string(&trade.checklist)?;
    conn.execute(
        &format!(
            "{} INTO trades ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            verb, TRADE_COLUMNS
        ),
        params![
            trade.id,
            trade.screenshot,
            trade.category.map(|c| c.as_str()),
            trade.tags,
            trade.outcome.map(|o| o.as_str()),
            trade.pnl,
            trade.notes,
            checklist,
            trade.timestamp,
            trade.hour.filter(|h| *h < 24),
            trade.created_at,
            trade.updated_at,
        ],
    )?;
    Ok(())
}

fn write_checklist(conn: &Connection, items: &[String]) -> Result<()> {
    conn.execute("DELETE FROM checklist_items", [])?;
    for (position, label) in normalize_labels(items).iter().enumerate() {
        conn.execute(
            "INSERT INTO checklist_items (label, position) VALUES (?, ?)",
            params![label, position as i64],
        )?;
    }
    Ok(())
}

/// Trim labels, drop blanks and keep the first of any duplicates.
pub fn normalize_labels(items: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.to_string()))
        .map(str::to_string)
        .collect()
}

impl TradeStore for Database {
    fn load_trades(&self) -> Result<Vec<Trade>> {
        let conn = self.conn.lock()?;
        // NULL timestamps sort last under DESC
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM trades ORDER BY timestamp DESC, rowid DESC",
            TRADE_COLUMNS
        ))?;
        let trades = stmt
            .query_map([], map_row_to_trade)?
            .collect::<rusqlite::Result<Vec<Trade>>>()?;
        Ok(trades)
    }

    fn get_trade(&self, id: &str) -> Result<Trade> {
        let conn = self.conn.lock()?;
        conn.query_row(
            &format!("SELECT {} FROM trades WHERE id = ?", TRADE_COLUMNS),
            [id],
            map_row_to_trade,
        )
        .optional()?
        .ok_or_else(|| JournalError::NotFound(id.to_string()))
    }

    fn insert_trade(&self, trade: &Trade) -> Result<()> {
        let conn = self.conn.lock()?;
        write_trade(&conn, "INSERT", trade).map_err(|e| match e {
            JournalError::Database(msg) if msg.contains("UNIQUE") => {
                JournalError::InvalidInput(format!("duplicate trade id {}", trade.id))
            }
            other => other,
        })
    }

    fn save_trade(&self, trade: &Trade) -> Result<()> {
        let conn = self.conn.lock()?;
        let checklist = serde_json::to_string(&trade.checklist)?;
        let changed = conn.execute(
            "UPDATE trades SET screenshot = ?, category = ?, tags = ?, outcome = ?, pnl = ?,
                notes = ?, checklist = ?, timestamp = ?, hour = ?, updated_at = ?
             WHERE id = ?",
            params![
                trade.screenshot,
                trade.category.map(|c| c.as_str()),
                trade.tags,
                trade.outcome.map(|o| o.as_str()),
                trade.pnl,
                trade.notes,
                checklist,
                trade.timestamp,
                trade.hour.filter(|h| *h < 24),
                trade.updated_at,
                trade.id,
            ],
        )?;
        if changed == 0 {
            return Err(JournalError::NotFound(trade.id.clone()));
        }
        Ok(())
    }

    fn delete_trade(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock()?;
        let deleted = conn.execute("DELETE FROM trades WHERE id = ?", [id])?;
        if deleted == 0 {
            return Err(JournalError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn replace_all(&self, trades: &[Trade], checklist_items: Option<&[String]>) -> Result<usize> {
        let conn = self.conn.lock()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute("DELETE FROM trades", [])?;
        // Insert oldest first so rowid order matches the newest-first input
        for trade in trades.iter().rev() {
            write_trade(&tx, "INSERT OR REPLACE", trade)?;
        }
        if let Some(items) = checklist_items {
            write_checklist(&tx, items)?;
        }

        let stored: i64 = tx.query_row("SELECT COUNT(*) FROM trades", [], |row| row.get(0))?;
        tx.commit()?;

        Ok(stored as usize)
    }

    fn checklist_items(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock()?;
        let mut stmt = conn.prepare("SELECT label FROM checklist_items ORDER BY position ASC")?;
        let items = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(items)
    }

    fn set_checklist_items(&self, items: &[String]) -> Result<()> {
        let conn = self.conn.lock()?;
        let tx = conn.unchecked_transaction()?;
        write_checklist(&tx, items)?;
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, Outcome};

    fn trade(id: &str, timestamp: Option<i64>) -> Trade {
        Trade {
            id: id.to_string(),
            screenshot: "data:image/png;base64,AAAA".to_string(),
            category: Some(Category::BPlus),
            tags: "london, breakout".to_string(),
            outcome: Some(Outcome::Win),
            pnl: Some("1.5".to_string()),
            notes: "clean retest".to_string(),
            checklist: BTreeMap::from([("Swept liquidity".to_string(), true)]),
            timestamp,
            hour: Some(10),
            created_at: 1,
            updated_at: 1,
        }
    }

    fn ids(trades: &[Trade]) -> Vec<&str> {
        trades.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn test_insert_and_load_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let original = trade("a", Some(1_000));
        db.insert_trade(&original).unwrap();

        assert_eq!(db.get_trade("a").unwrap(), original);
        assert_eq!(db.load_trades().unwrap(), vec![original]);
    }

    #[test]
    fn test_load_is_newest_first() {
        let db = Database::open_in_memory().unwrap();
        db.insert_trade(&trade("old", Some(1_000))).unwrap();
        db.insert_trade(&trade("undated", None)).unwrap();
        db.insert_trade(&trade("new", Some(3_000))).unwrap();
        db.insert_trade(&trade("tie-first", Some(2_000))).unwrap();
        db.insert_trade(&trade("tie-second", Some(2_000))).unwrap();

        let loaded = db.load_trades().unwrap();
        assert_eq!(
            ids(&loaded),
            vec!["new", "tie-second", "tie-first", "old", "undated"]
        );
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        db.insert_trade(&trade("a", Some(1))).unwrap();
        let err = db.insert_trade(&trade("a", Some(2))).unwrap_err();
        assert!(matches!(err, JournalError::InvalidInput(_)));
    }

    #[test]
    fn test_save_and_delete_require_existing_id() {
        let db = Database::open_in_memory().unwrap();
        let mut t = trade("a", Some(1));
        assert!(matches!(db.save_trade(&t), Err(JournalError::NotFound(_))));
        assert!(matches!(db.delete_trade("a"), Err(JournalError::NotFound(_))));

        db.insert_trade(&t).unwrap();
        t.outcome = Some(Outcome::Loss);
        t.category = None;
        db.save_trade(&t).unwrap();
        let stored = db.get_trade("a").unwrap();
        assert_eq!(stored.outcome, Some(Outcome::Loss));
        assert_eq!(stored.category, None);

        db.delete_trade("a").unwrap();
        assert!(matches!(db.get_trade("a"), Err(JournalError::NotFound(_))));
    }

    #[test]
    fn test_replace_all_swaps_collection() {
        let db = Database::open_in_memory().unwrap();
        db.insert_trade(&trade("stale", Some(1))).unwrap();

        let incoming = vec![trade("n2", Some(20)), trade("n1", Some(10))];
        let labels = vec!["  Clean price action ".to_string(), "Clean price action".to_string()];
        let stored = db.replace_all(&incoming, Some(&labels)).unwrap();

        assert_eq!(stored, 2);
        assert_eq!(ids(&db.load_trades().unwrap()), vec!["n2", "n1"]);
        assert_eq!(db.checklist_items().unwrap(), vec!["Clean price action"]);
    }

    #[test]
    fn test_replace_all_keeps_checklist_when_absent() {
        let db = Database::open_in_memory().unwrap();
        let before = db.checklist_items().unwrap();
        db.replace_all(&[], None).unwrap();
        assert_eq!(db.checklist_items().unwrap(), before);
        assert!(db.load_trades().unwrap().is_empty());
    }

    #[test]
    fn test_checklist_defaults_and_updates() {
        let db = Database::open_in_memory().unwrap();
        let defaults = db.checklist_items().unwrap();
        assert_eq!(defaults.len(), 6);
        assert_eq!(defaults[0], "Confirmed trend direction");

        db.set_checklist_items(&["B".to_string(), "".to_string(), "A".to_string()])
            .unwrap();
        assert_eq!(db.checklist_items().unwrap(), vec!["B", "A"]);
    }

    #[test]
    fn test_unknown_stored_values_are_tolerated() {
        let db = Database::open_in_memory().unwrap();
        {
            let conn = db.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO trades (id, category, outcome, checklist, created_at, updated_at)
                 VALUES ('x', 'S', 'scratch', 'not json', 0, 0)",
                [],
            )
            .unwrap();
        }
        let t = db.get_trade("x").unwrap();
        assert_eq!(t.category, None);
        assert_eq!(t.outcome, None);
        assert!(t.checklist.is_empty());
    }
}
