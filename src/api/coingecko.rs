use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

use crate::api::{
    client::{Coin, QuoteSource, Quotes},
    error::ApiError,
    rate_limiter::{RateLimitConfig, RateLimiter},
};

const BASE_URL: &str = "https://api.coingecko.com";
const SIMPLE_PRICE_ENDPOINT: &str = "/api/v3/simple/price";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Public CoinGecko price endpoint (no API key)
pub struct CoinGeckoClient {
    base_url: String,
    vs_currency: String,
    http_client: reqwest::Client,
    rate_limiter: RateLimiter,
}

impl CoinGeckoClient {
    pub fn new(vs_currency: &str) -> Self {
        Self::with_base_url(BASE_URL, vs_currency)
    }

    pub fn with_base_url(base_url: &str, vs_currency: &str) -> Self {
        // The public tier allows roughly 30 calls a minute
        let rate_limiter = RateLimiter::new(RateLimitConfig {
            requests_per_minute: 30,
            burst_size: 3,
        });

        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            vs_currency: vs_currency.to_lowercase(),
            http_client,
            rate_limiter,
        }
    }

    fn price_url(&self, coins: &[Coin]) -> String {
        let ids: Vec<&str> = coins.iter().map(|c| c.coingecko_id()).collect();
        format!(
            "{}{}?ids={}&vs_currencies={}",
            self.base_url,
            SIMPLE_PRICE_ENDPOINT,
            ids.join(","),
            self.vs_currency
        )
    }
}

#[async_trait]
impl QuoteSource for CoinGeckoClient {
    fn source_name(&self) -> &str {
        "coingecko"
    }

    async fn fetch_quotes(&self, coins: &[Coin]) -> Result<Quotes, ApiError> {
        self.rate_limiter.acquire().await;

        let response = self.http_client.get(self.price_url(coins)).send().await?;
        let status = response.status();
        let response_text = response.text().await?;

        let body = check_status(status, response_text)?;
        parse_simple_price(&body, coins, &self.vs_currency)
    }
}

/// Map a non-success status to an error, passing successful bodies through.
fn check_status(status: StatusCode, body: String) -> Result<String, ApiError> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ApiError::RateLimitError(
            "Rate limit exceeded. Please wait before retrying.".to_string(),
        ));
    }
    if !status.is_success() {
        return Err(ApiError::UpstreamError {
            status: status.as_u16(),
            message: body,
        });
    }
    Ok(body)
}

/// Read `{"bitcoin": {"usd": 64000.5}, ...}`. Coins with a missing, null or
/// non-numeric price are left out.
pub fn parse_simple_price(body: &str, coins: &[Coin], vs_currency: &str) -> Result<Quotes, ApiError> {
    let parsed: HashMap<String, HashMap<String, Value>> = serde_json::from_str(body)
        .map_err(|e| ApiError::ParseError(format!("Failed to parse response: {} - Body: {}", e, body)))?;

    Ok(coins
        .iter()
        .filter_map(|coin| {
            let price = parsed
                .get(coin.coingecko_id())?
                .get(vs_currency)?
                .as_f64()?;
            Some((*coin, price))
        })
        .collect())
}
