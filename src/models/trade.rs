use chrono::{DateTime, NaiveDate, TimeZone, Timelike};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::JournalError;

/// Setup quality grade, best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "A+")]
    APlus,
    #[serde(rename = "B+")]
    BPlus,
    #[serde(rename = "C+")]
    CPlus,
    #[serde(rename = "D+")]
    DPlus,
    #[serde(rename = "F")]
    F,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::APlus,
        Category::BPlus,
        Category::CPlus,
        Category::DPlus,
        Category::F,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::APlus => "A+",
            Category::BPlus => "B+",
            Category::CPlus => "C+",
            Category::DPlus => "D+",
            Category::F => "F",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Category {
    type Err = JournalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| JournalError::InvalidInput(format!("unknown category '{}'", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Loss,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Win => "win",
            Outcome::Loss => "loss",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = JournalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "win" => Ok(Outcome::Win),
            "loss" => Ok(Outcome::Loss),
            other => Err(JournalError::InvalidInput(format!("unknown outcome '{}'", other))),
        }
    }
}

/// One journaled trade.
///
/// Deserialization is lenient so that backups written by older journal
/// versions (numeric ids, empty-string grades, numeric P&L) load cleanly:
/// unknown grades and outcomes become `None` instead of failing the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    #[serde(deserialize_with = "lenient::id")]
    pub id: String,
    #[serde(default)]
    pub screenshot: String,
    #[serde(default, deserialize_with = "lenient::category")]
    pub category: Option<Category>,
    #[serde(default)]
    pub tags: String, // comma separated
    #[serde(default, deserialize_with = "lenient::outcome")]
    pub outcome: Option<Outcome>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub pnl: Option<String>, // percent, kept as entered
    #[serde(default)]
    pub notes: String,
    #[serde(default, deserialize_with = "lenient::checklist")]
    pub checklist: BTreeMap<String, bool>,
    #[serde(default, deserialize_with = "lenient::millis")]
    pub timestamp: Option<i64>, // Unix milliseconds
    #[serde(default, deserialize_with = "lenient::hour")]
    pub hour: Option<u32>,

    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

impl Trade {
    /// Build a new trade stamped with the creation instant `now`.
    pub fn from_input<Tz: TimeZone>(input: CreateTradeInput, now: &DateTime<Tz>) -> Self {
        let created_at = now.timestamp();
        Trade {
            id: new_trade_id(now.timestamp_millis()),
            screenshot: input.screenshot,
            category: input.category,
            tags: input.tags,
            outcome: input.outcome,
            pnl: input.pnl.filter(|p| !p.trim().is_empty()),
            notes: input.notes,
            checklist: input.checklist,
            timestamp: Some(now.timestamp_millis()),
            hour: Some(now.hour()),
            created_at,
            updated_at: created_at,
        }
    }

    /// Tags split on commas, trimmed, empties dropped.
    pub fn tag_list(&self) -> Vec<&str> {
        self.tags
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect()
    }

    pub fn is_checked(&self, label: &str) -> bool {
        self.checklist.get(label).copied().unwrap_or(false)
    }

    /// Checked checklist labels, in label order.
    pub fn checked_labels(&self) -> Vec<&str> {
        self.checklist
            .iter()
            .filter(|(_, checked)| **checked)
            .map(|(label, _)| label.as_str())
            .collect()
    }

    /// Numeric P&L, or `None` when no P&L was entered. Text that does not
    /// start with a number counts as zero.
    pub fn pnl_value(&self) -> Option<f64> {
        self.pnl
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(|p| parse_leading_number(p).unwrap_or(0.0))
    }

    /// Hour of day the trade was taken: the stored hour when valid, otherwise
    /// derived from the timestamp in `tz`.
    pub fn hour_in<Tz: TimeZone>(&self, tz: &Tz) -> Option<u32> {
        match self.hour {
            Some(h) if h < 24 => Some(h),
            _ => self.local_time(tz).map(|t| t.hour()),
        }
    }

    pub fn local_date_in<Tz: TimeZone>(&self, tz: &Tz) -> Option<NaiveDate> {
        self.local_time(tz).map(|t| t.date_naive())
    }

    fn local_time<Tz: TimeZone>(&self, tz: &Tz) -> Option<DateTime<Tz>> {
        self.timestamp
            .and_then(|ms| tz.timestamp_millis_opt(ms).single())
    }

    pub fn apply_update(&mut self, update: UpdateTradeInput) {
        if let Some(screenshot) = update.screenshot {
            self.screenshot = screenshot;
        }
        if let Some(category) = update.category {
            self.category = category;
        }
        if let Some(tags) = update.tags {
            self.tags = tags;
        }
        if let Some(outcome) = update.outcome {
            self.outcome = outcome;
        }
        if let Some(pnl) = update.pnl {
            self.pnl = pnl.filter(|p| !p.trim().is_empty());
        }
        if let Some(notes) = update.notes {
            self.notes = notes;
        }
        if let Some(checklist) = update.checklist {
            self.checklist = checklist;
        }
    }
}

pub fn new_trade_id(now_millis: i64) -> String {
    format!("TRADE-{}-{}", now_millis, uuid::Uuid::new_v4())
}

static LEADING_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?").expect("leading number pattern is valid")
});

/// Parse the numeric prefix of `s` the way a text input is read back:
/// `"2.5%"` is 2.5, `" -1"` is -1, `"abc"` is `None`.
pub fn parse_leading_number(s: &str) -> Option<f64> {
    LEADING_NUMBER
        .find(s.trim_start())
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateTradeInput {
    pub screenshot: String,
    pub category: Option<Category>,
    #[serde(default)]
    pub tags: String,
    pub outcome: Option<Outcome>,
    pub pnl: Option<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub checklist: BTreeMap<String, bool>,
}

/// Partial update. Missing fields are left alone; an explicit `null` clears
/// the nullable ones.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTradeInput {
    pub screenshot: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub category: Option<Option<Category>>,
    pub tags: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub outcome: Option<Option<Outcome>>,
    #[serde(default, deserialize_with = "double_option")]
    pub pnl: Option<Option<String>>,
    pub notes: Option<String>,
    pub checklist: Option<BTreeMap<String, bool>>,
}

fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

mod lenient {
    use super::{Category, Outcome};
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;
    use std::collections::BTreeMap;

    pub fn id<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        match Value::deserialize(d)? {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(serde::de::Error::custom(format!("invalid trade id: {}", other))),
        }
    }

    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) if !s.is_empty() => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }

    pub fn category<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Category>, D::Error> {
        Ok(text(d)?.and_then(|s| s.parse().ok()))
    }

    pub fn outcome<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Outcome>, D::Error> {
        Ok(text(d)?.and_then(|s| s.parse().ok()))
    }

    pub fn millis<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            _ => None,
        })
    }

    pub fn hour<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
        Ok(millis(d)?.filter(|h| (0..24).contains(h)).map(|h| h as u32))
    }

    pub fn checklist<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeMap<String, bool>, D::Error> {
        let map = match Value::deserialize(d)? {
            Value::Object(map) => map,
            _ => return Ok(BTreeMap::new()),
        };
        Ok(map
            .into_iter()
            .map(|(label, v)| {
                let checked = match v {
                    Value::Bool(b) => b,
                    Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
                    Value::String(s) => !s.is_empty(),
                    Value::Null => false,
                    Value::Array(_) | Value::Object(_) => true,
                };
                (label, checked)
            })
            .collect())
    }
}
