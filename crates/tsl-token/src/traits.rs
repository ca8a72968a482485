use tsl_types::Address;

use crate::error::TokenResult;
use crate::ops::{LedgerOp, TokenMetadata};

/// A batch validated against a ledger's current state.
///
/// The batch holds the ledger's write lock: nothing else can change the
/// ledger until it is committed or dropped. Dropping it applies nothing.
pub trait PreparedBatch {
    /// Apply the validated batch.
    fn commit(self: Box<Self>);
}

/// A fungible token ledger: balances, allowances, and transfers.
///
/// All implementations must satisfy these invariants:
/// - `prepare` validates a whole batch and returns it ready to commit, or
///   the first error. Committing cannot fail.
/// - `execute` applies a batch all-or-nothing. If any operation fails, no
///   operation in the batch is observable.
/// - `check` reports exactly the error `execute` would return for the same
///   batch against the current state, without changing anything.
/// - Zero-amount operations are no-ops.
pub trait FungibleLedger: Send + Sync {
    /// Name, symbol, and decimal scale.
    fn metadata(&self) -> &TokenMetadata;

    fn balance_of(&self, account: &Address) -> TokenResult<u128>;

    fn allowance(&self, owner: &Address, spender: &Address) -> TokenResult<u128>;

    fn total_supply(&self) -> TokenResult<u128>;

    /// Set (not add to) the amount `spender` may pull from `owner`.
    fn approve(&self, owner: &Address, spender: &Address, amount: u128) -> TokenResult<()>;

    /// Dry-run a batch against the current state.
    fn check(&self, ops: &[LedgerOp]) -> TokenResult<()>;

    /// Validate a batch and lock the ledger until the result is committed
    /// or dropped.
    ///
    /// Callers applying batches to several ledgers prepare all of them
    /// before committing any, so no leg can fail after another applied.
    fn prepare(&self, ops: &[LedgerOp]) -> TokenResult<Box<dyn PreparedBatch + '_>>;

    /// Apply a batch atomically.
    fn execute(&self, ops: &[LedgerOp]) -> TokenResult<()> {
        self.prepare(ops)?.commit();
        Ok(())
    }

    fn transfer(&self, from: &Address, to: &Address, amount: u128) -> TokenResult<()> {
        self.execute(&[LedgerOp::Transfer {
            from: *from,
            to: *to,
            amount,
        }])
    }

    fn transfer_from(
        &self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> TokenResult<()> {
        self.execute(&[LedgerOp::TransferFrom {
            spender: *spender,
            from: *from,
            to: *to,
            amount,
        }])
    }
}

/// A fungible ledger whose supply is managed by an owner and its admins.
pub trait MintableLedger: FungibleLedger {
    /// The account allowed to manage admins.
    fn owner(&self) -> Address;

    fn is_admin(&self, account: &Address) -> TokenResult<bool>;

    /// Grant minting rights. Only the owner may call this.
    fn add_admin(&self, caller: &Address, admin: &Address) -> TokenResult<()>;

    /// Revoke minting rights. Only the owner may call this.
    fn remove_admin(&self, caller: &Address, admin: &Address) -> TokenResult<()>;

    fn mint(&self, minter: &Address, to: &Address, amount: u128) -> TokenResult<()> {
        self.execute(&[LedgerOp::Mint {
            minter: *minter,
            to: *to,
            amount,
        }])
    }

    fn burn(&self, holder: &Address, amount: u128) -> TokenResult<()> {
        self.execute(&[LedgerOp::Burn {
            holder: *holder,
            amount,
        }])
    }

    fn burn_from(&self, spender: &Address, account: &Address, amount: u128) -> TokenResult<()> {
        self.execute(&[LedgerOp::BurnFrom {
            spender: *spender,
            account: *account,
            amount,
        }])
    }
}
