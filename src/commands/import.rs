use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::db::{Database, TradeStore};
use crate::error::{JournalError, Result};
use crate::models::Trade;

pub const BACKUP_VERSION: &str = "1.0";

/// Backup document, compatible with files exported by the browser journal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupData {
    pub trades: Vec<Trade>,
    #[serde(rename = "checklistItems", alias = "checklist_items", default)]
    pub checklist_items: Option<Vec<String>>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub trades_imported: usize,
    pub checklist_replaced: bool,
}

/// Export trades and checklist labels as pretty JSON.
pub fn export_all_data(db: &Database) -> Result<String> {
    let backup = BackupData {
        trades: db.load_trades()?,
        checklist_items: Some(db.checklist_items()?),
        timestamp: Some(Utc::now().to_rfc3339()),
        version: Some(BACKUP_VERSION.to_string()),
    };

    log::info!("Exporting {} trades", backup.trades.len());
    Ok(serde_json::to_string_pretty(&backup)?)
}

/// Replace the journal with the contents of a backup.
///
/// The document must carry a `trades` array; anything else is rejected and
/// the stored journal is left untouched.
pub fn import_all_data(db: &Database, json_data: &str) -> Result<ImportSummary> {
    let backup = parse_backup(json_data)?;

    let checklist_replaced = backup.checklist_items.is_some();
    let trades_imported =
        db.replace_all(&backup.trades, backup.checklist_items.as_deref())?;

    if trades_imported < backup.trades.len() {
        log::warn!(
            "Backup contained {} trades but only {} distinct ids",
            backup.trades.len(),
            trades_imported
        );
    }
    log::info!(
        "Imported {} trades (version {})",
        trades_imported,
        backup.version.as_deref().unwrap_or("unknown")
    );

    Ok(ImportSummary {
        trades_imported,
        checklist_replaced,
    })
}

fn parse_backup(json_data: &str) -> Result<BackupData> {
    let value: serde_json::Value = serde_json::from_str(json_data)
        .map_err(|e| JournalError::InvalidBackup(e.to_string()))?;

    if !value.get("trades").is_some_and(|t| t.is_array()) {
        return Err(JournalError::InvalidBackup(
            "expected a 'trades' array".to_string(),
        ));
    }

    serde_json::from_value(value).map_err(|e| JournalError::InvalidBackup(e.to_string()))
}

/// Write one CSV row per trade (screenshots are left out).
pub fn export_trades_csv<W: Write>(db: &Database, writer: W) -> Result<usize> {
    let trades = db.load_trades()?;
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer.write_record([
        "id", "timestamp", "category", "outcome", "pnl", "tags", "notes", "checklist",
    ])?;

    for trade in &trades {
        let timestamp = trade
            .timestamp
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();

        csv_writer.write_record([
            trade.id.as_str(),
            timestamp.as_str(),
            trade.category.map(|c| c.as_str()).unwrap_or(""),
            trade.outcome.map(|o| o.as_str()).unwrap_or(""),
            trade.pnl.as_deref().unwrap_or(""),
            trade.tag_list().join(", ").as_str(),
            trade.notes.as_str(),
            trade.checked_labels().join("; ").as_str(),
        ])?;
    }

    csv_writer.flush()?;
    Ok(trades.len())
}
