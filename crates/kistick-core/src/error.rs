use thiserror::Error;

use kistick_warehouse::StoreError;

use crate::quote::QuoteError;
use crate::token::TokenError;

/// Validation errors for domain value types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("ticker cannot be empty")]
    EmptyTicker,
    #[error("ticker has {len} characters, expected exactly {expected}")]
    TickerWrongLength { len: usize, expected: usize },
    #[error("ticker contains non-digit character '{ch}' at index {index}")]
    TickerInvalidChar { ch: char, index: usize },

    #[error("timestamp must be RFC3339: '{value}'")]
    InvalidTimestamp { value: String },
}

/// Any failure raised while a collection round is running.
///
/// Per-ticker failures never escape the round; they are logged and
/// counted. The variants still travel through this type so the loop can
/// classify them, and so a failure of the round-opening token acquisition
/// or of the final commit can surface to the caller.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Quote(#[from] QuoteError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
