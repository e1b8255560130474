use chrono::{DateTime, Local, TimeZone, Utc};

use crate::analytics::{filter_trades, TradeFilters};
use crate::db::{Database, TradeStore};
use crate::error::{JournalError, Result};
use crate::models::{CreateTradeInput, Trade, UpdateTradeInput};

pub fn get_trades(db: &Database, filters: Option<TradeFilters>) -> Result<Vec<Trade>> {
    let trades = db.load_trades()?;
    let Some(filters) = filters else {
        return Ok(trades);
    };
    Ok(filter_trades(&trades, &filters).into_iter().cloned().collect())
}

pub fn get_trade(db: &Database, id: &str) -> Result<Trade> {
    db.get_trade(id)
}

pub fn create_trade(db: &Database, trade: CreateTradeInput) -> Result<Trade> {
    create_trade_at(db, trade, &Local::now())
}

/// Create a trade stamped at `now`; the hour of day is taken in `now`'s zone.
pub fn create_trade_at<Tz: TimeZone>(
    db: &Database,
    trade: CreateTradeInput,
    now: &DateTime<Tz>,
) -> Result<Trade> {
    if trade.screenshot.trim().is_empty() {
        return Err(JournalError::InvalidInput(
            "Please upload a screenshot".to_string(),
        ));
    }

    let trade = Trade::from_input(trade, now);
    db.insert_trade(&trade)?;
    log::info!("Created trade {}", trade.id);

    Ok(trade)
}

pub fn update_trade(db: &Database, id: &str, trade_update: UpdateTradeInput) -> Result<Trade> {
    if trade_update
        .screenshot
        .as_deref()
        .is_some_and(|s| s.trim().is_empty())
    {
        return Err(JournalError::InvalidInput(
            "A trade must keep its screenshot".to_string(),
        ));
    }

    let mut trade = db.get_trade(id)?;
    trade.apply_update(trade_update);
    trade.updated_at = Utc::now().timestamp();
    db.save_trade(&trade)?;
    log::info!("Updated trade {}", id);

    Ok(trade)
}

pub fn delete_trade(db: &Database, id: &str) -> Result<()> {
    db.delete_trade(id)?;
    log::info!("Deleted trade {}", id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{CategoryFilter, OutcomeFilter};
    use crate::models::{Category, Outcome};
    use chrono::FixedOffset;

    fn input(category: Option<Category>, outcome: Option<Outcome>) -> CreateTradeInput {
        CreateTradeInput {
            screenshot: "data:image/png;base64,AAAA".to_string(),
            category,
            outcome,
            ..Default::default()
        }
    }

    #[test]
    fn test_create_requires_screenshot() {
        let db = Database::open_in_memory().unwrap();
        let err = create_trade(&db, CreateTradeInput::default()).unwrap_err();
        assert!(matches!(err, JournalError::InvalidInput(_)));
        assert!(db.load_trades().unwrap().is_empty());
    }

    #[test]
    fn test_create_captures_local_hour() {
        let db = Database::open_in_memory().unwrap();
        let tz = FixedOffset::east_opt(9 * 3600).unwrap();
        let now = tz.with_ymd_and_hms(2024, 2, 1, 7, 45, 0).unwrap();

        let trade = create_trade_at(&db, input(Some(Category::APlus), None), &now).unwrap();
        assert_eq!(trade.hour, Some(7));
        assert_eq!(trade.timestamp, Some(now.timestamp_millis()));
        assert_eq!(get_trade(&db, &trade.id).unwrap(), trade);
    }

    #[test]
    fn test_rapid_creates_get_distinct_ids() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        for _ in 0..20 {
            create_trade_at(&db, input(None, None), &now).unwrap();
        }
        assert_eq!(get_trades(&db, None).unwrap().len(), 20);
    }

    #[test]
    fn test_get_trades_applies_filters() {
        let db = Database::open_in_memory().unwrap();
        create_trade(&db, input(Some(Category::APlus), Some(Outcome::Win))).unwrap();
        create_trade(&db, input(Some(Category::F), Some(Outcome::Win))).unwrap();
        create_trade(&db, input(None, Some(Outcome::Loss))).unwrap();

        let filters = TradeFilters {
            category: CategoryFilter::All,
            outcome: OutcomeFilter::Only(Outcome::Win),
        };
        let wins = get_trades(&db, Some(filters)).unwrap();
        assert_eq!(wins.len(), 2);
        assert!(wins.iter().all(|t| t.outcome == Some(Outcome::Win)));
    }

    #[test]
    fn test_update_merges_fields() {
        let db = Database::open_in_memory().unwrap();
        let created = create_trade(&db, input(Some(Category::CPlus), None)).unwrap();

        let update: UpdateTradeInput =
            serde_json::from_str(r#"{"outcome": "loss", "pnl": "-0.8", "tags": "nyse, fade"}"#)
                .unwrap();
        let updated = update_trade(&db, &created.id, update).unwrap();

        assert_eq!(updated.category, Some(Category::CPlus));
        assert_eq!(updated.outcome, Some(Outcome::Loss));
        assert_eq!(updated.pnl_value(), Some(-0.8));
        assert_eq!(updated.timestamp, created.timestamp);
        assert_eq!(get_trade(&db, &created.id).unwrap(), updated);
    }

    #[test]
    fn test_update_rejects_blank_screenshot() {
        let db = Database::open_in_memory().unwrap();
        let created = create_trade(&db, input(None, None)).unwrap();
        let update = UpdateTradeInput {
            screenshot: Some(String::new()),
            ..Default::default()
        };
        assert!(update_trade(&db, &created.id, update).is_err());
    }

    #[test]
    fn test_delete_missing_trade_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            delete_trade(&db, "TRADE-0-missing"),
            Err(JournalError::NotFound(_))
        ));
    }
}
