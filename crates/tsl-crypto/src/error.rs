use tsl_types::{Address, TypeError};

/// Errors from building allow-list commitments.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AllowListError {
    #[error("invalid allow-list entry: {0}")]
    InvalidEntry(#[from] TypeError),

    #[error("address {0} appears more than once in the allow-list")]
    DuplicateAddress(Address),

    #[error("serialization error: {0}")]
    Serialization(String),
}
