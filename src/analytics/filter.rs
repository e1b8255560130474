use std::fmt;
use std::str::FromStr;

use crate::error::JournalError;
use crate::models::{Category, Outcome, Trade};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    pub fn matches(&self, category: Option<Category>) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(wanted) => category == Some(*wanted),
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = JournalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(CategoryFilter::All),
            other => other.parse().map(CategoryFilter::Only),
        }
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryFilter::All => f.write_str("all"),
            CategoryFilter::Only(c) => c.fmt(f),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutcomeFilter {
    #[default]
    All,
    Only(Outcome),
}

impl OutcomeFilter {
    pub fn matches(&self, outcome: Option<Outcome>) -> bool {
        match self {
            OutcomeFilter::All => true,
            OutcomeFilter::Only(wanted) => outcome == Some(*wanted),
        }
    }
}

impl FromStr for OutcomeFilter {
    type Err = JournalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(OutcomeFilter::All),
            other => other.parse().map(OutcomeFilter::Only),
        }
    }
}

impl fmt::Display for OutcomeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeFilter::All => f.write_str("all"),
            OutcomeFilter::Only(o) => o.fmt(f),
        }
    }
}

/// Display-side selection of trades. Never applied to the statistics report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TradeFilters {
    pub category: CategoryFilter,
    pub outcome: OutcomeFilter,
}

impl TradeFilters {
    pub fn matches(&self, trade: &Trade) -> bool {
        self.category.matches(trade.category) && self.outcome.matches(trade.outcome)
    }
}

pub fn filter_trades<'a>(trades: &'a [Trade], filters: &TradeFilters) -> Vec<&'a Trade> {
    trades.iter().filter(|t| filters.matches(t)).collect()
}
