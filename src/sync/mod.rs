pub mod price_ticker;

pub use price_ticker::{PriceSnapshot, PriceTicker};
