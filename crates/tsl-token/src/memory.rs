use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockWriteGuard};

use tracing::debug;
use tsl_types::Address;

use crate::error::{TokenError, TokenResult};
use crate::ops::{LedgerOp, TokenMetadata};
use crate::traits::{FungibleLedger, MintableLedger, PreparedBatch};

/// In-memory fungible ledger for tests, local demos, and embedding.
///
/// Balances live in a `HashMap` behind a `RwLock`. Batches are applied to a
/// copy of the state which replaces the original only if every operation
/// succeeded.
pub struct InMemoryTokenLedger {
    metadata: TokenMetadata,
    owner: Address,
    inner: RwLock<TokenState>,
}

#[derive(Clone, Default)]
struct TokenState {
    balances: HashMap<Address, u128>,
    allowances: HashMap<(Address, Address), u128>,
    total_supply: u128,
    admins: HashSet<Address>,
}

impl TokenState {
    fn balance(&self, account: &Address) -> u128 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    fn debit(&mut self, account: &Address, amount: u128) -> TokenResult<()> {
        let available = self.balance(account);
        let remaining = available
            .checked_sub(amount)
            .ok_or(TokenError::InsufficientBalance {
                account: *account,
                needed: amount,
                available,
            })?;
        self.balances.insert(*account, remaining);
        Ok(())
    }

    fn credit(&mut self, account: &Address, amount: u128) -> TokenResult<()> {
        let balance = self
            .balance(account)
            .checked_add(amount)
            .ok_or(TokenError::Overflow)?;
        self.balances.insert(*account, balance);
        Ok(())
    }

    fn spend_allowance(&mut self, owner: &Address, spender: &Address, amount: u128) -> TokenResult<()> {
        let key = (*owner, *spender);
        let available = self.allowances.get(&key).copied().unwrap_or(0);
        let remaining = available
            .checked_sub(amount)
            .ok_or(TokenError::InsufficientAllowance {
                owner: *owner,
                spender: *spender,
                needed: amount,
                available,
            })?;
        self.allowances.insert(key, remaining);
        Ok(())
    }

    fn apply(&mut self, op: &LedgerOp, owner: &Address) -> TokenResult<()> {
        if op.is_noop() {
            return Ok(());
        }
        match op {
            LedgerOp::Transfer { from, to, amount } => {
                self.debit(from, *amount)?;
                self.credit(to, *amount)
            }
            LedgerOp::TransferFrom {
                spender,
                from,
                to,
                amount,
            } => {
                self.spend_allowance(from, spender, *amount)?;
                self.debit(from, *amount)?;
                self.credit(to, *amount)
            }
            LedgerOp::Mint { minter, to, amount } => {
                if minter != owner && !self.admins.contains(minter) {
                    return Err(TokenError::NotMinter(*minter));
                }
                self.total_supply = self
                    .total_supply
                    .checked_add(*amount)
                    .ok_or(TokenError::Overflow)?;
                self.credit(to, *amount)
            }
            LedgerOp::Burn { holder, amount } => {
                self.debit(holder, *amount)?;
                self.total_supply = self.total_supply.saturating_sub(*amount);
                Ok(())
            }
            LedgerOp::BurnFrom {
                spender,
                account,
                amount,
            } => {
                self.spend_allowance(account, spender, *amount)?;
                self.debit(account, *amount)?;
                self.total_supply = self.total_supply.saturating_sub(*amount);
                Ok(())
            }
        }
    }

    fn apply_all(&mut self, ops: &[LedgerOp], owner: &Address) -> TokenResult<()> {
        ops.iter().try_for_each(|op| self.apply(op, owner))
    }
}

/// A staged copy of the state, swapped in on commit.
struct StagedBatch<'a> {
    state: RwLockWriteGuard<'a, TokenState>,
    staged: TokenState,
    symbol: &'a str,
    ops: usize,
}

impl PreparedBatch for StagedBatch<'_> {
    fn commit(self: Box<Self>) {
        let StagedBatch {
            mut state,
            staged,
            symbol,
            ops,
        } = *self;
        *state = staged;
        debug!(symbol, ops, "batch applied");
    }
}

impl InMemoryTokenLedger {
    /// Create an empty ledger managed by `owner`.
    pub fn new(metadata: TokenMetadata, owner: Address) -> Self {
        Self {
            metadata,
            owner,
            inner: RwLock::new(TokenState::default()),
        }
    }

    /// All non-zero balances, sorted by address.
    pub fn holders(&self) -> TokenResult<Vec<(Address, u128)>> {
        let state = self.inner.read().map_err(|_| TokenError::LockPoisoned)?;
        let mut holders: Vec<_> = state
            .balances
            .iter()
            .filter(|(_, balance)| **balance > 0)
            .map(|(account, balance)| (*account, *balance))
            .collect();
        holders.sort();
        Ok(holders)
    }
}

impl std::fmt::Debug for InMemoryTokenLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTokenLedger")
            .field("symbol", &self.metadata.symbol)
            .field("owner", &self.owner)
            .finish()
    }
}

impl FungibleLedger for InMemoryTokenLedger {
    fn metadata(&self) -> &TokenMetadata {
        &self.metadata
    }

    fn balance_of(&self, account: &Address) -> TokenResult<u128> {
        let state = self.inner.read().map_err(|_| TokenError::LockPoisoned)?;
        Ok(state.balance(account))
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> TokenResult<u128> {
        let state = self.inner.read().map_err(|_| TokenError::LockPoisoned)?;
        Ok(state
            .allowances
            .get(&(*owner, *spender))
            .copied()
            .unwrap_or(0))
    }

    fn total_supply(&self) -> TokenResult<u128> {
        let state = self.inner.read().map_err(|_| TokenError::LockPoisoned)?;
        Ok(state.total_supply)
    }

    fn approve(&self, owner: &Address, spender: &Address, amount: u128) -> TokenResult<()> {
        let mut state = self.inner.write().map_err(|_| TokenError::LockPoisoned)?;
        state.allowances.insert((*owner, *spender), amount);
        debug!(symbol = %self.metadata.symbol, %owner, %spender, amount, "allowance set");
        Ok(())
    }

    fn check(&self, ops: &[LedgerOp]) -> TokenResult<()> {
        let state = self.inner.read().map_err(|_| TokenError::LockPoisoned)?;
        let mut staged = state.clone();
        staged.apply_all(ops, &self.owner)
    }

    fn prepare(&self, ops: &[LedgerOp]) -> TokenResult<Box<dyn PreparedBatch + '_>> {
        let state = self.inner.write().map_err(|_| TokenError::LockPoisoned)?;
        let mut staged = state.clone();
        staged.apply_all(ops, &self.owner)?;
        Ok(Box::new(StagedBatch {
            state,
            staged,
            symbol: &self.metadata.symbol,
            ops: ops.len(),
        }))
    }
}

impl MintableLedger for InMemoryTokenLedger {
    fn owner(&self) -> Address {
        self.owner
    }

    fn is_admin(&self, account: &Address) -> TokenResult<bool> {
        let state = self.inner.read().map_err(|_| TokenError::LockPoisoned)?;
        Ok(state.admins.contains(account))
    }

    fn add_admin(&self, caller: &Address, admin: &Address) -> TokenResult<()> {
        if *caller != self.owner {
            return Err(TokenError::NotOwner(*caller));
        }
        let mut state = self.inner.write().map_err(|_| TokenError::LockPoisoned)?;
        state.admins.insert(*admin);
        Ok(())
    }

    fn remove_admin(&self, caller: &Address, admin: &Address) -> TokenResult<()> {
        if *caller != self.owner {
            return Err(TokenError::NotOwner(*caller));
        }
        let mut state = self.inner.write().map_err(|_| TokenError::LockPoisoned)?;
        state.admins.remove(admin);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ETH: u128 = 1_000_000_000_000_000_000;

    struct Fixture {
        token: InMemoryTokenLedger,
        deployer: Address,
        second: Address,
        third: Address,
    }

    fn fixture() -> Fixture {
        let deployer = Address::derive(b"deployer");
        Fixture {
            token: InMemoryTokenLedger::new(TokenMetadata::new("friesDAO", "FRIES", 18), deployer),
            deployer,
            second: Address::derive(b"second"),
            third: Address::derive(b"third"),
        }
    }

    #[test]
    fn token_parameters() {
        let f = fixture();
        assert_eq!(f.token.metadata().name, "friesDAO");
        assert_eq!(f.token.metadata().symbol, "FRIES");
        assert_eq!(f.token.metadata().decimals, 18);
        assert_eq!(f.token.total_supply().unwrap(), 0);
        assert_eq!(f.token.owner(), f.deployer);
    }

    #[test]
    fn owner_and_admins_can_mint() {
        let f = fixture();
        f.token.mint(&f.deployer, &f.second, ETH).unwrap();
        assert_eq!(f.token.balance_of(&f.second).unwrap(), ETH);

        f.token.add_admin(&f.deployer, &f.second).unwrap();
        assert!(f.token.is_admin(&f.second).unwrap());
        f.token.mint(&f.second, &f.third, ETH).unwrap();
        assert_eq!(f.token.balance_of(&f.third).unwrap(), ETH);
        assert_eq!(f.token.total_supply().unwrap(), 2 * ETH);

        f.token.remove_admin(&f.deployer, &f.second).unwrap();
        assert!(!f.token.is_admin(&f.second).unwrap());
        assert_eq!(
            f.token.mint(&f.second, &f.third, ETH).unwrap_err(),
            TokenError::NotMinter(f.second)
        );
    }

    #[test]
    fn only_owner_manages_admins() {
        let f = fixture();
        assert_eq!(
            f.token.add_admin(&f.second, &f.third).unwrap_err(),
            TokenError::NotOwner(f.second)
        );
    }

    #[test]
    fn burn_self_balance() {
        let f = fixture();
        f.token.mint(&f.deployer, &f.second, ETH).unwrap();
        f.token.burn(&f.second, ETH).unwrap();
        assert_eq!(f.token.balance_of(&f.second).unwrap(), 0);
        assert_eq!(f.token.total_supply().unwrap(), 0);
    }

    #[test]
    fn burn_from_requires_approval() {
        let f = fixture();
        f.token.mint(&f.deployer, &f.third, ETH).unwrap();

        let err = f.token.burn_from(&f.second, &f.third, ETH).unwrap_err();
        assert!(err.is_insufficient_funds());

        f.token.approve(&f.third, &f.second, ETH).unwrap();
        f.token.burn_from(&f.second, &f.third, ETH).unwrap();
        assert_eq!(f.token.balance_of(&f.third).unwrap(), 0);
        assert_eq!(f.token.allowance(&f.third, &f.second).unwrap(), 0);
    }

    #[test]
    fn transfer_from_spends_allowance() {
        let f = fixture();
        f.token.mint(&f.deployer, &f.second, 10).unwrap();
        f.token.approve(&f.second, &f.third, 6).unwrap();
        f.token.transfer_from(&f.third, &f.second, &f.deployer, 4).unwrap();
        assert_eq!(f.token.balance_of(&f.deployer).unwrap(), 4);
        assert_eq!(f.token.allowance(&f.second, &f.third).unwrap(), 2);

        let err = f.token.transfer_from(&f.third, &f.second, &f.deployer, 3).unwrap_err();
        assert_eq!(
            err,
            TokenError::InsufficientAllowance {
                owner: f.second,
                spender: f.third,
                needed: 3,
                available: 2,
            }
        );
    }

    #[test]
    fn failed_batch_changes_nothing() {
        let f = fixture();
        f.token.mint(&f.deployer, &f.second, 10).unwrap();

        let batch = [
            LedgerOp::Transfer {
                from: f.second,
                to: f.third,
                amount: 7,
            },
            LedgerOp::Transfer {
                from: f.second,
                to: f.third,
                amount: 7,
            },
        ];
        let err = f.token.execute(&batch).unwrap_err();
        assert_eq!(
            err,
            TokenError::InsufficientBalance {
                account: f.second,
                needed: 7,
                available: 3,
            }
        );
        assert_eq!(f.token.balance_of(&f.second).unwrap(), 10);
        assert_eq!(f.token.balance_of(&f.third).unwrap(), 0);
    }

    #[test]
    fn check_matches_execute_without_mutating() {
        let f = fixture();
        f.token.mint(&f.deployer, &f.second, 10).unwrap();
        let batch = [LedgerOp::Transfer {
            from: f.second,
            to: f.third,
            amount: 10,
        }];
        f.token.check(&batch).unwrap();
        assert_eq!(f.token.balance_of(&f.second).unwrap(), 10);

        let too_much = [LedgerOp::Transfer {
            from: f.second,
            to: f.third,
            amount: 11,
        }];
        assert_eq!(
            f.token.check(&too_much).unwrap_err(),
            f.token.execute(&too_much).unwrap_err()
        );
    }

    #[test]
    fn prepared_batch_applies_only_on_commit() {
        let f = fixture();
        f.token.mint(&f.deployer, &f.second, 10).unwrap();
        let batch = [LedgerOp::Transfer {
            from: f.second,
            to: f.third,
            amount: 4,
        }];

        drop(f.token.prepare(&batch).unwrap());
        assert_eq!(f.token.balance_of(&f.third).unwrap(), 0);

        f.token.prepare(&batch).unwrap().commit();
        assert_eq!(f.token.balance_of(&f.second).unwrap(), 6);
        assert_eq!(f.token.balance_of(&f.third).unwrap(), 4);

        let too_much = [LedgerOp::Transfer {
            from: f.second,
            to: f.third,
            amount: 7,
        }];
        assert!(f.token.prepare(&too_much).is_err());
        assert_eq!(f.token.balance_of(&f.second).unwrap(), 6);
    }

    #[test]
    fn zero_amount_ops_are_noops() {
        let f = fixture();
        f.token
            .execute(&[LedgerOp::Mint {
                minter: f.second,
                to: f.third,
                amount: 0,
            }])
            .unwrap();
        assert!(f.token.holders().unwrap().is_empty());
    }

    #[test]
    fn holders_lists_non_zero_balances() {
        let f = fixture();
        f.token.mint(&f.deployer, &f.second, 5).unwrap();
        f.token.mint(&f.deployer, &f.third, 5).unwrap();
        f.token.burn(&f.third, 5).unwrap();
        assert_eq!(f.token.holders().unwrap(), vec![(f.second, 5)]);
    }
}
