use tsl_types::Address;

/// Errors from fungible ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("insufficient balance for {account}: needed {needed}, available {available}")]
    InsufficientBalance {
        account: Address,
        needed: u128,
        available: u128,
    },

    #[error("insufficient allowance from {owner} to {spender}: needed {needed}, available {available}")]
    InsufficientAllowance {
        owner: Address,
        spender: Address,
        needed: u128,
        available: u128,
    },

    #[error("{0} is not allowed to mint")]
    NotMinter(Address),

    #[error("{0} is not the token owner")]
    NotOwner(Address),

    #[error("arithmetic overflow")]
    Overflow,

    #[error("ledger lock poisoned")]
    LockPoisoned,
}

impl TokenError {
    /// Returns `true` for a failed pull: missing balance or missing allowance.
    pub fn is_insufficient_funds(&self) -> bool {
        matches!(
            self,
            Self::InsufficientBalance { .. } | Self::InsufficientAllowance { .. }
        )
    }
}

/// Result alias for ledger operations.
pub type TokenResult<T> = Result<T, TokenError>;
