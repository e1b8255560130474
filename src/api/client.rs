use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::error::ApiError;

/// Coins shown in the price strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Coin {
    Btc,
    Eth,
    Sol,
}

impl Coin {
    pub const ALL: [Coin; 3] = [Coin::Btc, Coin::Eth, Coin::Sol];

    /// Identifier used by CoinGecko's simple price endpoint
    pub fn coingecko_id(&self) -> &'static str {
        match self {
            Coin::Btc => "bitcoin",
            Coin::Eth => "ethereum",
            Coin::Sol => "solana",
        }
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Coin::Btc => "BTC",
            Coin::Eth => "ETH",
            Coin::Sol => "SOL",
        };
        f.pad(symbol)
    }
}

/// Latest price per coin, in the quote currency
pub type Quotes = BTreeMap<Coin, f64>;

/// Anything that can be polled for display prices
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Source name for logs (e.g., "coingecko")
    fn source_name(&self) -> &str;

    /// Fetch current prices. Coins the source has no price for are simply
    /// missing from the result.
    async fn fetch_quotes(&self, coins: &[Coin]) -> Result<Quotes, ApiError>;
}
