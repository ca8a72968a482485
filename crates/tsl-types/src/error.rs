use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid amount: {0:?}")]
    InvalidAmount(String),

    #[error("amount {text:?} has more than {decimals} decimal places")]
    TooManyDecimals { decimals: u8, text: String },

    #[error("amount {0:?} does not fit in 128 bits")]
    AmountOverflow(String),

    #[error("unsupported decimal scale: {0}")]
    UnsupportedDecimals(u8),
}
