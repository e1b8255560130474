use crate::db::{Database, TradeStore};
use crate::error::{JournalError, Result};
use crate::models::{Settings, UpdateSettingsInput};

pub fn get_settings(db: &Database) -> Result<Settings> {
    let conn = db.conn.lock()?;

    let settings = conn.query_row(
        "SELECT id, price_feed_enabled, price_poll_interval_secs, currency, created_at, updated_at FROM settings WHERE id = 1",
        [],
        |row| {
            Ok(Settings {
                id: row.get(0)?,
                price_feed_enabled: row.get::<_, i32>(1)? == 1,
                price_poll_interval_secs: row.get(2)?,
                currency: row.get(3)?,
                created_at: row.get(4)?,
                updated_at: row.get(5)?,
            })
        },
    )?;

    Ok(settings)
}

pub fn update_settings(db: &Database, settings: UpdateSettingsInput) -> Result<Settings> {
    if settings.price_poll_interval_secs.is_some_and(|secs| secs < 1) {
        return Err(JournalError::InvalidInput(
            "price_poll_interval_secs must be at least 1".to_string(),
        ));
    }

    {
        let conn = db.conn.lock()?;

        // Build dynamic UPDATE query
        let mut updates = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(val) = settings.price_feed_enabled {
            updates.push("price_feed_enabled = ?");
            values.push(Box::new(val as i32));
        }
        if let Some(val) = settings.price_poll_interval_secs {
            updates.push("price_poll_interval_secs = ?");
            values.push(Box::new(val));
        }
        if let Some(val) = settings.currency {
            updates.push("currency = ?");
            values.push(Box::new(val));
        }

        updates.push("updated_at = strftime('%s', 'now')");

        let query = format!("UPDATE settings SET {} WHERE id = 1", updates.join(", "));
        let params: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();

        conn.execute(&query, params.as_slice())?;
    }

    get_settings(db)
}

pub fn get_checklist_items(db: &Database) -> Result<Vec<String>> {
    db.checklist_items()
}

/// Append a checklist label. Blank and duplicate labels are rejected.
pub fn add_checklist_item(db: &Database, label: &str) -> Result<Vec<String>> {
    let label = label.trim();
    if label.is_empty() {
        return Err(JournalError::InvalidInput("checklist item is empty".to_string()));
    }

    let mut items = db.checklist_items()?;
    if items.iter().any(|existing| existing == label) {
        return Err(JournalError::InvalidInput(format!(
            "checklist item '{}' already exists",
            label
        )));
    }
    items.push(label.to_string());
    db.set_checklist_items(&items)?;

    Ok(items)
}

/// Remove a checklist label. Trades that ticked it keep the entry; it just
/// stops appearing in reports.
pub fn remove_checklist_item(db: &Database, label: &str) -> Result<Vec<String>> {
    let mut items = db.checklist_items()?;
    let before = items.len();
    items.retain(|existing| existing != label);
    if items.len() == before {
        return Err(JournalError::NotFound(format!("checklist item '{}'", label)));
    }
    db.set_checklist_items(&items)?;

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let db = Database::open_in_memory().unwrap();
        let settings = get_settings(&db).unwrap();
        assert!(settings.price_feed_enabled);
        assert_eq!(settings.price_poll_interval_secs, 5);
        assert_eq!(settings.currency, "USD");
    }

    #[test]
    fn test_partial_settings_update() {
        let db = Database::open_in_memory().unwrap();
        let updated = update_settings(
            &db,
            UpdateSettingsInput {
                price_feed_enabled: Some(false),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(!updated.price_feed_enabled);
        assert_eq!(updated.price_poll_interval_secs, 5);

        let bad = UpdateSettingsInput {
            price_poll_interval_secs: Some(0),
            ..Default::default()
        };
        assert!(update_settings(&db, bad).is_err());
    }

    #[test]
    fn test_checklist_add_and_remove() {
        let db = Database::open_in_memory().unwrap();

        let items = add_checklist_item(&db, "  Waited for candle close ").unwrap();
        assert_eq!(items.len(), 7);
        assert_eq!(items.last().unwrap(), "Waited for candle close");

        assert!(add_checklist_item(&db, "Waited for candle close").is_err());
        assert!(add_checklist_item(&db, "   ").is_err());

        let items = remove_checklist_item(&db, "Swept liquidity").unwrap();
        assert_eq!(items.len(), 6);
        assert!(!items.iter().any(|i| i == "Swept liquidity"));
        assert_eq!(get_checklist_items(&db).unwrap(), items);

        assert!(matches!(
            remove_checklist_item(&db, "Swept liquidity"),
            Err(JournalError::NotFound(_))
        ));
    }
}
