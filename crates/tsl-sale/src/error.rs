use tsl_token::TokenError;
use tsl_types::Address;

use crate::config::Phase;

/// Errors produced by sale operations.
///
/// A failing call never leaves partial state behind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SaleError {
    #[error("{0} is not active")]
    PhaseInactive(Phase),

    #[error("invalid allow-list parameters for {0}")]
    InvalidProof(Address),

    #[error("amount over whitelist limit: {requested} requested, allocation {allocation}")]
    AllocationExceeded { requested: u128, allocation: u128 },

    #[error("cap exceeded: {requested} requested, cap {cap}")]
    CapExceeded { requested: u128, cap: u128 },

    #[error("insufficient balance or allowance: {0}")]
    InsufficientBalanceOrAllowance(TokenError),

    #[error("nothing to redeem")]
    NothingToRedeem,

    #[error("caller is not the sale owner")]
    Unauthorized,

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("arithmetic overflow")]
    ArithmeticOverflow,

    #[error("token ledger error: {0}")]
    Token(TokenError),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Coarse classification of [`SaleError`] for callers that branch on the
/// kind of failure rather than its details.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    PhaseInactive,
    InvalidProof,
    /// Per-account allocation or global cap.
    AllocationExceeded,
    InsufficientBalanceOrAllowance,
    NothingToRedeem,
    Unauthorized,
    InvalidAmount,
    InvalidConfig,
    ArithmeticOverflow,
    Ledger,
    Internal,
}

impl SaleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PhaseInactive(_) => ErrorKind::PhaseInactive,
            Self::InvalidProof(_) => ErrorKind::InvalidProof,
            Self::AllocationExceeded { .. } | Self::CapExceeded { .. } => {
                ErrorKind::AllocationExceeded
            }
            Self::InsufficientBalanceOrAllowance(_) => ErrorKind::InsufficientBalanceOrAllowance,
            Self::NothingToRedeem => ErrorKind::NothingToRedeem,
            Self::Unauthorized => ErrorKind::Unauthorized,
            Self::InvalidAmount(_) => ErrorKind::InvalidAmount,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Self::ArithmeticOverflow => ErrorKind::ArithmeticOverflow,
            Self::Token(_) => ErrorKind::Ledger,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<TokenError> for SaleError {
    fn from(err: TokenError) -> Self {
        if err.is_insufficient_funds() {
            Self::InsufficientBalanceOrAllowance(err)
        } else {
            Self::Token(err)
        }
    }
}

/// Result alias for sale operations.
pub type SaleResult<T> = Result<T, SaleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cap_and_allocation_share_a_kind() {
        let alloc = SaleError::AllocationExceeded {
            requested: 2,
            allocation: 1,
        };
        let cap = SaleError::CapExceeded {
            requested: 2,
            cap: 1,
        };
        assert_eq!(alloc.kind(), ErrorKind::AllocationExceeded);
        assert_eq!(cap.kind(), ErrorKind::AllocationExceeded);
        assert_ne!(alloc, cap);
    }

    #[test]
    fn token_errors_are_classified() {
        let pull = TokenError::InsufficientBalance {
            account: Address::derive(b"a"),
            needed: 1,
            available: 0,
        };
        assert_eq!(
            SaleError::from(pull).kind(),
            ErrorKind::InsufficientBalanceOrAllowance
        );
        assert_eq!(
            SaleError::from(TokenError::NotMinter(Address::derive(b"a"))).kind(),
            ErrorKind::Ledger
        );
    }

    #[test]
    fn phase_and_proof_errors_are_distinct() {
        let phase = SaleError::PhaseInactive(Phase::WhitelistSale);
        let proof = SaleError::InvalidProof(Address::derive(b"a"));
        assert_ne!(phase.kind(), proof.kind());
        assert_eq!(phase.to_string(), "whitelist sale is not active");
    }
}
