use chrono::{DateTime, Datelike, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::Trade;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DayAggregate {
    pub total_pnl: f64,
    pub trade_count: u32,
}

/// P&L per local calendar date, across the whole log.
pub type DailyPnl = BTreeMap<NaiveDate, DayAggregate>;

/// One calendar row, Sunday first. `None` cells pad the month.
pub type Week = [Option<u32>; 7];

/// Group trades that carry both a P&L and a timestamp by local date.
pub fn aggregate_daily_pnl<Tz: TimeZone>(trades: &[Trade], tz: &Tz) -> DailyPnl {
    let mut daily = DailyPnl::new();
    for trade in trades {
        let (Some(pnl), Some(date)) = (trade.pnl_value(), trade.local_date_in(tz)) else {
            continue;
        };
        let entry = daily.entry(date).or_default();
        entry.total_pnl += pnl;
        entry.trade_count += 1;
    }
    daily
}

/// A displayed month. `month0` is zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarMonth {
    pub year: i32,
    pub month0: u32,
}

impl CalendarMonth {
    /// Month indices outside 0..=11 roll into neighbouring years. `None` when
    /// the rolled year does not fit in an `i32`.
    pub fn new(year: i32, month0: i32) -> Option<Self> {
        Some(Self {
            year: year.checked_add(month0.div_euclid(12))?,
            month0: month0.rem_euclid(12) as u32,
        })
    }

    pub fn containing<Tz: TimeZone>(at: &DateTime<Tz>) -> Self {
        let date = at.date_naive();
        Self {
            year: date.year(),
            month0: date.month0(),
        }
    }

    pub fn prev(self) -> Option<Self> {
        Self::new(self.year, self.month0 as i32 - 1)
    }

    pub fn next(self) -> Option<Self> {
        Self::new(self.year, self.month0 as i32 + 1)
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month0 + 1, 1)
    }

    pub fn days_in_month(&self) -> u32 {
        let (Some(first), Some(next)) = (self.first_day(), self.next().and_then(|m| m.first_day()))
        else {
            return 0;
        };
        (next - first).num_days() as u32
    }

    pub fn date(&self, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month0 + 1, day)
    }

    /// e.g. "March 2024"
    pub fn label(&self) -> String {
        self.first_day()
            .map(|d| d.format("%B %Y").to_string())
            .unwrap_or_default()
    }
}

/// Week-major grid for a month: the first row starts on the Sunday on or
/// before the 1st, and rows stop once the last day has been placed.
pub fn month_grid(year: i32, month0: i32) -> Vec<Week> {
    let Some(month) = CalendarMonth::new(year, month0) else {
        return Vec::new();
    };
    let Some(first) = month.first_day() else {
        return Vec::new();
    };
    let lead = first.weekday().num_days_from_sunday() as usize;
    let days = month.days_in_month();

    let mut weeks = Vec::with_capacity(6);
    let mut day = 1;
    while day <= days {
        let mut week: Week = [None; 7];
        let start = if weeks.is_empty() { lead } else { 0 };
        for cell in week.iter_mut().skip(start) {
            if day > days {
                break;
            }
            *cell = Some(day);
            day += 1;
        }
        weeks.push(week);
    }
    weeks
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalendarCell {
    pub day: u32,
    pub aggregate: Option<DayAggregate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarView {
    pub month: CalendarMonth,
    pub label: String,
    pub weeks: Vec<[Option<CalendarCell>; 7]>,
    pub total_pnl: f64,
    pub trade_count: u32,
}

/// Join the month grid with the aggregates for its dates.
pub fn month_view(daily: &DailyPnl, month: CalendarMonth) -> CalendarView {
    let mut total_pnl = 0.0;
    let mut trade_count = 0;

    let weeks = month_grid(month.year, month.month0 as i32)
        .into_iter()
        .map(|week| {
            week.map(|cell| {
                cell.map(|day| {
                    let aggregate = month.date(day).and_then(|d| daily.get(&d)).copied();
                    if let Some(agg) = aggregate {
                        total_pnl += agg.total_pnl;
                        trade_count += agg.trade_count;
                    }
                    CalendarCell { day, aggregate }
                })
            })
        })
        .collect();

    CalendarView {
        month,
        label: month.label(),
        weeks,
        total_pnl,
        trade_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    fn trade(id: &str, pnl: Option<&str>, timestamp: Option<i64>) -> Trade {
        let mut t: Trade = serde_json::from_str(&format!(r#"{{"id": "{}"}}"#, id)).unwrap();
        t.pnl = pnl.map(str::to_string);
        t.timestamp = timestamp;
        t
    }

    fn ms(y: i32, m: u32, d: u32, h: u32) -> i64 {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap().timestamp_millis()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_thirty_day_month_starting_wednesday() {
        // November 2023 starts on a Wednesday
        let grid = month_grid(2023, 10);
        assert_eq!(grid.len(), 5);
        assert_eq!(grid[0], [None, None, None, Some(1), Some(2), Some(3), Some(4)]);
        assert_eq!(grid[4], [Some(26), Some(27), Some(28), Some(29), Some(30), None, None]);
    }

    #[test]
    fn test_grid_row_counts() {
        // February 2015: 28 days starting on Sunday
        let grid = month_grid(2015, 1);
        assert_eq!(grid.len(), 4);
        assert_eq!(grid[0][0], Some(1));
        assert_eq!(grid[3][6], Some(28));

        // August 2020: 31 days starting on Saturday
        let grid = month_grid(2020, 7);
        assert_eq!(grid.len(), 6);
        assert_eq!(grid[0][6], Some(1));
        assert_eq!(grid[5][1], Some(31));

        // February 2024 (leap year) ends on Thursday the 29th
        let grid = month_grid(2024, 1);
        let placed: Vec<u32> = grid.iter().flatten().flatten().copied().collect();
        assert_eq!(placed, (1..=29).collect::<Vec<_>>());
    }

    #[test]
    fn test_month_index_rolls_over() {
        assert_eq!(CalendarMonth::new(2024, -1), Some(CalendarMonth { year: 2023, month0: 11 }));
        assert_eq!(CalendarMonth::new(2024, 12), Some(CalendarMonth { year: 2025, month0: 0 }));
        assert_eq!(month_grid(2024, 12), month_grid(2025, 0));

        let jan = CalendarMonth::new(2024, 0).unwrap();
        assert_eq!(jan.prev().and_then(|m| m.next()), Some(jan));
        assert_eq!(jan.label(), "January 2024");
        assert_eq!(jan.prev().unwrap().days_in_month(), 31);
    }

    #[test]
    fn test_out_of_range_years_give_empty_grid() {
        assert_eq!(CalendarMonth::new(i32::MAX, 12), None);
        assert_eq!(CalendarMonth::new(i32::MIN, -1), None);
        assert!(month_grid(i32::MAX, 12).is_empty());
        assert!(month_grid(i32::MIN, -1).is_empty());
        assert!(month_grid(i32::MAX, i32::MAX).is_empty());

        // Representable as a month but beyond the supported date range
        let far = CalendarMonth { year: i32::MAX, month0: 11 };
        assert_eq!(far.next(), None);
        assert_eq!(far.days_in_month(), 0);
        assert_eq!(far.label(), "");
        let view = month_view(&DailyPnl::new(), far);
        assert!(view.weeks.is_empty());
        assert_eq!(view.trade_count, 0);
    }

    #[test]
    fn test_aggregation_groups_by_local_date() {
        let tz = FixedOffset::west_opt(5 * 3600).unwrap();
        let trades = vec![
            trade("1", Some("2.0"), Some(ms(2024, 3, 5, 14))),
            trade("2", Some("-0.5"), Some(ms(2024, 3, 5, 18))),
            // 02:00 UTC on the 6th is still the 5th at UTC-5
            trade("3", Some("1.5%"), Some(ms(2024, 3, 6, 2))),
            trade("4", Some("oops"), Some(ms(2024, 3, 7, 12))),
            trade("5", None, Some(ms(2024, 3, 7, 12))),
            trade("6", Some("4.0"), None),
            // other months are aggregated too
            trade("7", Some("1.0"), Some(ms(2024, 1, 20, 12))),
        ];

        let daily = aggregate_daily_pnl(&trades, &tz);

        assert_eq!(daily.len(), 3);
        let fifth = daily[&date(2024, 3, 5)];
        assert_eq!(fifth.trade_count, 3);
        assert!((fifth.total_pnl - 3.0).abs() < 1e-9);
        assert_eq!(daily[&date(2024, 3, 7)], DayAggregate { total_pnl: 0.0, trade_count: 1 });
        assert_eq!(daily[&date(2024, 1, 20)].trade_count, 1);
    }

    #[test]
    fn test_aggregate_sum_matches_trade_sum() {
        let trades: Vec<Trade> = (0..40)
            .map(|i| {
                let pnl = match i % 4 {
                    0 => Some(format!("{}.25", i)),
                    1 => Some(format!("-{}", i)),
                    2 => Some("n/a".to_string()),
                    _ => None,
                };
                trade(&i.to_string(), pnl.as_deref(), Some(ms(2024, 4, 1, 0) + i * 13 * 3_600_000))
            })
            .collect();

        let daily = aggregate_daily_pnl(&trades, &Utc);
        let bucketed: f64 = daily.values().map(|d| d.total_pnl).sum();
        let expected: f64 = trades.iter().filter_map(|t| t.pnl_value()).sum();
        assert!((bucketed - expected).abs() < 1e-9);

        let counted: u32 = daily.values().map(|d| d.trade_count).sum();
        assert_eq!(counted, 30);
    }

    #[test]
    fn test_month_view_joins_aggregates() {
        let trades = vec![
            trade("1", Some("2.0"), Some(ms(2023, 11, 1, 10))),
            trade("2", Some("-1.0"), Some(ms(2023, 11, 30, 10))),
            trade("3", Some("5.0"), Some(ms(2023, 12, 1, 10))),
        ];
        let daily = aggregate_daily_pnl(&trades, &Utc);
        let view = month_view(&daily, CalendarMonth::new(2023, 10).unwrap());

        assert_eq!(view.label, "November 2023");
        assert_eq!(view.weeks.len(), 5);
        let first = view.weeks[0][3].unwrap();
        assert_eq!(first.day, 1);
        assert_eq!(first.aggregate.unwrap().total_pnl, 2.0);
        assert_eq!(view.weeks[0][4].unwrap().aggregate, None);
        assert_eq!(view.trade_count, 2);
        assert_eq!(view.total_pnl, 1.0);
    }
}
