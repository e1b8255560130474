use serde::{Deserialize, Serialize};

pub const DEFAULT_PRICE_POLL_INTERVAL_SECS: i64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub id: i32,
    pub price_feed_enabled: bool,
    pub price_poll_interval_secs: i64,
    pub currency: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSettingsInput {
    pub price_feed_enabled: Option<bool>,
    pub price_poll_interval_secs: Option<i64>,
    pub currency: Option<String>,
}
