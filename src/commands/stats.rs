use chrono::{Local, TimeZone, Utc};

use crate::analytics::{
    aggregate_daily_pnl, compute_report, month_view, CalendarMonth, CalendarView, StatisticsReport,
};
use crate::db::{Database, TradeStore};
use crate::error::Result;

/// Statistics over the whole journal as of now, in the machine's time zone.
pub fn get_statistics_report(db: &Database) -> Result<StatisticsReport> {
    statistics_report_at(db, Utc::now().timestamp_millis(), &Local)
}

pub fn statistics_report_at<Tz: TimeZone>(
    db: &Database,
    now_ms: i64,
    tz: &Tz,
) -> Result<StatisticsReport> {
    let trades = db.load_trades()?;
    let checklist_items = db.checklist_items()?;
    log::debug!(
        "Computing report over {} trades and {} checklist items",
        trades.len(),
        checklist_items.len()
    );
    Ok(compute_report(&trades, &checklist_items, now_ms, tz))
}

/// Calendar view for `month`, or the current month when none is given.
pub fn get_calendar_month(db: &Database, month: Option<CalendarMonth>) -> Result<CalendarView> {
    let month = month.unwrap_or_else(|| CalendarMonth::containing(&Local::now()));
    calendar_month_in(db, month, &Local)
}

pub fn calendar_month_in<Tz: TimeZone>(
    db: &Database,
    month: CalendarMonth,
    tz: &Tz,
) -> Result<CalendarView> {
    let trades = db.load_trades()?;
    let daily = aggregate_daily_pnl(&trades, tz);
    Ok(month_view(&daily, month))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::WinStats;
    use crate::commands::trades::create_trade_at;
    use crate::models::{Category, CreateTradeInput, Outcome};
    use std::collections::BTreeMap;

    fn input(outcome: Outcome, pnl: &str, checked: &[&str]) -> CreateTradeInput {
        CreateTradeInput {
            screenshot: "data:image/png;base64,AAAA".to_string(),
            category: Some(Category::APlus),
            outcome: Some(outcome),
            pnl: Some(pnl.to_string()),
            checklist: checked
                .iter()
                .map(|label| (label.to_string(), true))
                .collect::<BTreeMap<_, _>>(),
            ..Default::default()
        }
    }

    #[test]
    fn test_report_reflects_store_snapshot() {
        let db = Database::open_in_memory().unwrap();
        let earlier = Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 6, 12, 14, 0, 0).unwrap();
        create_trade_at(&db, input(Outcome::Loss, "-1.0", &[]), &earlier).unwrap();
        create_trade_at(&db, input(Outcome::Win, "2.0", &["Swept liquidity"]), &later).unwrap();

        let now = Utc.with_ymd_and_hms(2024, 6, 12, 18, 0, 0).unwrap();
        let report = statistics_report_at(&db, now.timestamp_millis(), &Utc).unwrap();

        assert_eq!(report.total, 2);
        assert_eq!(report.win_rate, 50.0);
        assert_eq!(report.current_streak, 1);
        assert_eq!(report.streak_type, Some(Outcome::Win));
        assert_eq!(report.today_trades, 1);
        assert_eq!(report.avg_per_day, 0.3);
        assert_eq!(report.hourly_stats[14].wins, 1);
        assert_eq!(report.hourly_stats[9].total, 1);
        assert_eq!(
            report.checklist_correlation["Swept liquidity"],
            WinStats { total: 1, wins: 1, rate: 100.0 }
        );
        assert_eq!(report.checklist_correlation.len(), 6);
    }

    #[test]
    fn test_calendar_month_sums_pnl() {
        let db = Database::open_in_memory().unwrap();
        let day = Utc.with_ymd_and_hms(2024, 6, 12, 14, 0, 0).unwrap();
        create_trade_at(&db, input(Outcome::Win, "2.0", &[]), &day).unwrap();
        create_trade_at(&db, input(Outcome::Loss, "-0.5", &[]), &day).unwrap();

        let view = calendar_month_in(&db, CalendarMonth::new(2024, 5).unwrap(), &Utc).unwrap();
        assert_eq!(view.label, "June 2024");
        assert_eq!(view.trade_count, 2);
        assert_eq!(view.total_pnl, 1.5);

        let cell = view
            .weeks
            .iter()
            .flatten()
            .flatten()
            .find(|c| c.day == 12)
            .unwrap();
        assert_eq!(cell.aggregate.unwrap().trade_count, 2);

        let other = calendar_month_in(&db, CalendarMonth::new(2024, 6).unwrap(), &Utc).unwrap();
        assert_eq!(other.trade_count, 0);
    }
}
