pub mod client;
pub mod coingecko;
pub mod error;
pub mod rate_limiter;

pub use client::{Coin, QuoteSource, Quotes};
pub use coingecko::CoinGeckoClient;
pub use error::ApiError;
pub use rate_limiter::{RateLimitConfig, RateLimiter};
