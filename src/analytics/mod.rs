//! Pure analytics over a snapshot of the journal.
//!
//! Nothing here touches storage or the clock: callers pass the trade list
//! (newest first), the current checklist labels, `now` and the local zone.

pub mod calendar;
pub mod filter;
pub mod report;

pub use calendar::{
    aggregate_daily_pnl, month_grid, month_view, CalendarCell, CalendarMonth, CalendarView,
    DailyPnl, DayAggregate, Week,
};
pub use filter::{filter_trades, CategoryFilter, OutcomeFilter, TradeFilters};
pub use report::{compute_report, current_streak, win_rate, StatisticsReport, WinStats};
