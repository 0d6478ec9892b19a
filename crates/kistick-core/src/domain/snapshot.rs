use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::PrimitiveDateTime;

use crate::domain::Ticker;

const OBSERVED_AT_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// One normalized current-price observation for a single ticker.
///
/// Quantity fields keep the exact decimal text returned by the quote
/// endpoint. Upstream omissions are normalized to the literal `"0"` at
/// construction, so every field is always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceSnapshot {
    pub ticker: Ticker,
    /// Exchange-local trade date and time of the observation.
    pub observed_at: PrimitiveDateTime,
    pub current_price: String,
    pub open_price: String,
    pub high_price: String,
    pub low_price: String,
    pub cumulative_volume: String,
    pub previous_close: String,
}

impl PriceSnapshot {
    /// `observed_at` as `YYYY-MM-DD HH:MM:SS` text, the form the
    /// warehouse casts to a timestamp.
    pub fn observed_at_text(&self) -> String {
        self.observed_at
            .format(OBSERVED_AT_FORMAT)
            .unwrap_or_else(|_| self.observed_at.to_string())
    }

    /// One-line human summary used by the per-ticker log output.
    pub fn summary(&self) -> String {
        format!(
            "{} price={} open={} high={} low={} volume={} prev_close={}",
            self.observed_at_text(),
            self.current_price,
            self.open_price,
            self.high_price,
            self.low_price,
            self.cumulative_volume,
            self.previous_close,
        )
    }
}
