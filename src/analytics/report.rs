use chrono::TimeZone;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{Category, Outcome, Trade};

const WEEK_MS: i64 = 7 * 24 * 60 * 60 * 1000;

/// Win count over a bucket of trades.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WinStats {
    pub total: u32,
    pub wins: u32,
    pub rate: f64, // percent, one decimal
}

impl WinStats {
    fn record(&mut self, outcome: Option<Outcome>) {
        self.total += 1;
        if outcome == Some(Outcome::Win) {
            self.wins += 1;
        }
    }

    fn finish(mut self) -> Self {
        self.rate = win_rate(self.wins, self.total);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsReport {
    pub total: u32,
    pub wins: u32,
    pub losses: u32,
    pub win_rate: f64,
    pub category_stats: BTreeMap<Category, WinStats>,
    pub today_trades: u32,
    pub avg_per_day: f64,
    pub current_streak: u32,
    pub streak_type: Option<Outcome>,
    pub hourly_stats: [WinStats; 24],
    pub checklist_correlation: IndexMap<String, WinStats>,
}

impl StatisticsReport {
    pub fn category(&self, category: Category) -> WinStats {
        self.category_stats.get(&category).copied().unwrap_or_default()
    }
}

/// `wins / total` as a percentage rounded to one decimal, 0 for an empty bucket.
pub fn win_rate(wins: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round1(wins as f64 / total as f64 * 100.0)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Compute the full statistics report over `trades`.
///
/// `trades` must be newest-first for the streak to describe the current run;
/// the order is used as given. `now_ms` and `tz` fix "today", the trailing
/// 7-day window and hour derivation for trades without a stored hour.
/// Checklist correlation covers exactly the labels in `checklist_items`.
pub fn compute_report<Tz: TimeZone>(
    trades: &[Trade],
    checklist_items: &[String],
    now_ms: i64,
    tz: &Tz,
) -> StatisticsReport {
    let today = tz.timestamp_millis_opt(now_ms).single().map(|now| now.date_naive());

    let mut wins = 0;
    let mut losses = 0;
    let mut today_trades = 0;
    let mut last_week = 0u32;
    let mut category_stats: BTreeMap<Category, WinStats> =
        Category::ALL.iter().map(|c| (*c, WinStats::default())).collect();
    let mut hourly_stats = [WinStats::default(); 24];

    for trade in trades {
        match trade.outcome {
            Some(Outcome::Win) => wins += 1,
            Some(Outcome::Loss) => losses += 1,
            None => {}
        }

        if let Some(category) = trade.category {
            category_stats.entry(category).or_default().record(trade.outcome);
        }

        if today.is_some() && trade.local_date_in(tz) == today {
            today_trades += 1;
        }

        if trade
            .timestamp
            .is_some_and(|ts| now_ms.checked_sub(ts).is_some_and(|age| age < WEEK_MS))
        {
            last_week += 1;
        }

        if let Some(hour) = trade.hour_in(tz) {
            hourly_stats[hour as usize].record(trade.outcome);
        }
    }

    for stats in category_stats.values_mut() {
        *stats = stats.finish();
    }
    for stats in hourly_stats.iter_mut() {
        *stats = stats.finish();
    }

    let (current_streak, streak_type) = current_streak(trades);
    let total = trades.len() as u32;

    StatisticsReport {
        total,
        wins,
        losses,
        win_rate: win_rate(wins, total),
        category_stats,
        today_trades,
        avg_per_day: round1(last_week as f64 / 7.0),
        current_streak,
        streak_type,
        hourly_stats,
        checklist_correlation: checklist_correlation(trades, checklist_items),
    }
}

/// Length and kind of the run of equal outcomes at the head of `trades`.
pub fn current_streak(trades: &[Trade]) -> (u32, Option<Outcome>) {
    let Some(kind) = trades.first().and_then(|t| t.outcome) else {
        return (0, None);
    };
    let length = trades
        .iter()
        .take_while(|t| t.outcome == Some(kind))
        .count();
    (length as u32, Some(kind))
}

/// Win rate of trades that had each checklist label ticked.
pub fn checklist_correlation(
    trades: &[Trade],
    checklist_items: &[String],
) -> IndexMap<String, WinStats> {
    checklist_items
        .iter()
        .map(|label| {
            let stats = trades
                .iter()
                .filter(|t| t.is_checked(label))
                .fold(WinStats::default(), |mut acc, t| {
                    acc.record(t.outcome);
                    acc
                });
            (label.clone(), stats.finish())
        })
        .collect()
}
