use serde::{Deserialize, Serialize};
use tsl_types::amount::serde_u128;
use tsl_types::Address;

/// Static description of a fungible token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

impl TokenMetadata {
    pub fn new(name: impl Into<String>, symbol: impl Into<String>, decimals: u8) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            decimals,
        }
    }
}

/// A single balance-changing operation on a fungible ledger.
///
/// `spender` fields name the party consuming an allowance granted by the
/// account being debited.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerOp {
    /// Move tokens out of `from`'s own balance.
    Transfer {
        from: Address,
        to: Address,
        #[serde(with = "serde_u128")]
        amount: u128,
    },
    /// Move tokens out of `from` using `spender`'s allowance.
    TransferFrom {
        spender: Address,
        from: Address,
        to: Address,
        #[serde(with = "serde_u128")]
        amount: u128,
    },
    /// Create new tokens; `minter` must be the owner or an admin.
    Mint {
        minter: Address,
        to: Address,
        #[serde(with = "serde_u128")]
        amount: u128,
    },
    /// Destroy tokens from the holder's own balance.
    Burn {
        holder: Address,
        #[serde(with = "serde_u128")]
        amount: u128,
    },
    /// Destroy tokens from `account` using `spender`'s allowance.
    BurnFrom {
        spender: Address,
        account: Address,
        #[serde(with = "serde_u128")]
        amount: u128,
    },
}

impl LedgerOp {
    /// The amount moved, created, or destroyed.
    pub fn amount(&self) -> u128 {
        match self {
            Self::Transfer { amount, .. }
            | Self::TransferFrom { amount, .. }
            | Self::Mint { amount, .. }
            | Self::Burn { amount, .. }
            | Self::BurnFrom { amount, .. } => *amount,
        }
    }

    /// Operations that move nothing are skipped by ledgers.
    pub fn is_noop(&self) -> bool {
        self.amount() == 0
    }
}
