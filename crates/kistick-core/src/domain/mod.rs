//! # Domain Models
//!
//! Core value types for the collector.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Ticker`] | Validated six-digit KRX short code |
//! | [`PriceSnapshot`] | One normalized current-price observation |
//! | [`UtcDateTime`] | RFC3339 UTC timestamp |
//!
//! [`PriceSnapshot`] deliberately keeps its six quantity fields as exact
//! decimal text rather than parsed numbers. The collector's contract is to
//! preserve the upstream representation end to end; parsing to floating
//! point would silently lose precision.

mod snapshot;
mod ticker;
mod timestamp;

pub use snapshot::PriceSnapshot;
pub use ticker::Ticker;
pub use timestamp::UtcDateTime;
