mod cache;
mod valuation;

pub use cache::PriceCache;
pub use valuation::{FiatValuator, Valuation};
