use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use tsl_token::{FungibleLedger, LedgerOp, MintableLedger, PreparedBatch};
use tsl_types::amount::serde_u128;
use tsl_types::{Address, Digest};

use crate::account::Account;
use crate::audit::{AuditReport, SaleAuditor};
use crate::authority::{
    DirectAllowList, Membership, MembershipAuthority, MembershipClaim, MerkleAllowList,
};
use crate::capability::{OwnerCapability, OwnerSeal, SaleId};
use crate::config::{Custody, PaymentRail, Phase, PhaseFlags, RedemptionSource, SaleConfig};
use crate::error::{SaleError, SaleResult};
use crate::events::{PurchaseChannel, SaleEvent, SaleRecord};
use crate::math::{self, RedemptionSplit};

/// A token sale over an external payment ledger `P` and sale token ledger
/// `T`, gated by the membership authority `A`.
///
/// Calls take `&self` and are serialized on the sale's lock. Each call
/// stages its effects and prepares the batches on both ledgers, holding
/// each ledger until both are validated. Only then is anything applied, so
/// a failing call leaves the sale and both ledgers untouched, even when
/// other writers share the ledgers.
pub struct TokenSale<P, T, A> {
    id: SaleId,
    address: Address,
    payment: Arc<P>,
    token: Arc<T>,
    inner: RwLock<SaleState<A>>,
}

struct SaleState<A> {
    config: SaleConfig,
    authority: A,
    seal: OwnerSeal,
    accounts: BTreeMap<Address, Account>,
    /// Payment units accepted and not refunded.
    total_purchased: u128,
    /// Sum of `purchased` over all accounts.
    total_entitlement: u128,
    /// Payment units that left the sale's custody: forwarded to the
    /// treasury (net of refunds paid from it) or withdrawn by the owner.
    forwarded: u128,
    journal: Vec<SaleRecord>,
}

impl<A> SaleState<A> {
    fn account(&self, address: &Address) -> Account {
        self.accounts.get(address).copied().unwrap_or_default()
    }

    fn record(&mut self, event: SaleEvent) {
        let seq = self.journal.len() as u64 + 1;
        self.journal.push(SaleRecord { seq, event });
    }
}

/// Effects of one call, computed before anything is applied.
struct Staged {
    account: Option<(Address, Account)>,
    total_purchased: u128,
    total_entitlement: u128,
    forwarded: u128,
    payment_ops: Vec<LedgerOp>,
    token_ops: Vec<LedgerOp>,
}

impl Staged {
    fn from_state<A>(state: &SaleState<A>) -> Self {
        Self {
            account: None,
            total_purchased: state.total_purchased,
            total_entitlement: state.total_entitlement,
            forwarded: state.forwarded,
            payment_ops: Vec::new(),
            token_ops: Vec::new(),
        }
    }
}

/// Point-in-time copy of a sale's accounting state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleSnapshot {
    pub id: SaleId,
    pub address: Address,
    pub owner: Address,
    pub config: SaleConfig,
    pub accounts: BTreeMap<Address, Account>,
    #[serde(with = "serde_u128")]
    pub total_purchased: u128,
    #[serde(with = "serde_u128")]
    pub total_entitlement: u128,
    #[serde(with = "serde_u128")]
    pub forwarded: u128,
    pub journal: Vec<SaleRecord>,
}

impl<P, T, A> TokenSale<P, T, A>
where
    P: FungibleLedger,
    T: MintableLedger,
    A: MembershipAuthority,
{
    /// Create a sale owned by `owner`.
    ///
    /// Returns the sale together with the only capability able to
    /// administer it.
    pub fn new(
        config: SaleConfig,
        authority: A,
        payment: Arc<P>,
        token: Arc<T>,
        owner: Address,
    ) -> SaleResult<(Self, OwnerCapability)> {
        config.validate()?;
        let id = SaleId::new();
        let address = id.address();
        let (cap, seal) = OwnerCapability::issue(id, owner);
        info!(
            sale = %id,
            %address,
            %owner,
            authority = authority.name(),
            payment = %payment.metadata().symbol,
            token = %token.metadata().symbol,
            "sale created"
        );
        let sale = Self {
            id,
            address,
            payment,
            token,
            inner: RwLock::new(SaleState {
                config,
                authority,
                seal,
                accounts: BTreeMap::new(),
                total_purchased: 0,
                total_entitlement: 0,
                forwarded: 0,
                journal: Vec::new(),
            }),
        };
        Ok((sale, cap))
    }

    pub fn id(&self) -> SaleId {
        self.id
    }

    /// The account the sale pulls payments with, holds funds under, and
    /// mints or transfers sale tokens from.
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn payment_ledger(&self) -> &Arc<P> {
        &self.payment
    }

    pub fn token_ledger(&self) -> &Arc<T> {
        &self.token
    }

    fn read_state(&self) -> SaleResult<RwLockReadGuard<'_, SaleState<A>>> {
        self.inner
            .read()
            .map_err(|_| SaleError::Internal("sale lock poisoned".into()))
    }

    fn write_state(&self) -> SaleResult<RwLockWriteGuard<'_, SaleState<A>>> {
        self.inner
            .write()
            .map_err(|_| SaleError::Internal("sale lock poisoned".into()))
    }

    /// Run `body` under the write lock, logging rejections.
    fn run<R>(
        &self,
        op: &'static str,
        caller: &Address,
        body: impl FnOnce(&mut SaleState<A>) -> SaleResult<R>,
    ) -> SaleResult<R> {
        let mut state = self.write_state()?;
        let result = body(&mut *state);
        if let Err(err) = &result {
            warn!(sale = %self.id, op, %caller, error = %err, "call rejected");
        }
        result
    }

    fn authorize(&self, state: &SaleState<A>, cap: &OwnerCapability) -> SaleResult<()> {
        if state.seal.admits(self.id, cap) {
            Ok(())
        } else {
            Err(SaleError::Unauthorized)
        }
    }

    /// Prepare both batches, apply them, then commit the staged state.
    ///
    /// Both ledgers stay locked from validation to commit. Ledgers are
    /// locked in address order so sales sharing ledgers cannot deadlock.
    fn commit(&self, state: &mut SaleState<A>, staged: Staged, event: SaleEvent) -> SaleResult<()> {
        let payment_at = Arc::as_ptr(&self.payment).cast::<()>();
        let token_at = Arc::as_ptr(&self.token).cast::<()>();
        let batches: Vec<Box<dyn PreparedBatch + '_>> = if payment_at == token_at {
            // One ledger in both roles; its lock is not reentrant.
            let ops: Vec<LedgerOp> = staged
                .token_ops
                .iter()
                .chain(&staged.payment_ops)
                .cloned()
                .collect();
            vec![self.token.prepare(&ops)?]
        } else if token_at < payment_at {
            let token = self.token.prepare(&staged.token_ops)?;
            vec![token, self.payment.prepare(&staged.payment_ops)?]
        } else {
            let payment = self.payment.prepare(&staged.payment_ops)?;
            vec![payment, self.token.prepare(&staged.token_ops)?]
        };
        debug!(
            sale = %self.id,
            payment_ops = staged.payment_ops.len(),
            token_ops = staged.token_ops.len(),
            "ledger batches prepared"
        );
        for batch in batches {
            batch.commit();
        }

        if let Some((address, account)) = staged.account {
            state.accounts.insert(address, account);
        }
        state.total_purchased = staged.total_purchased;
        state.total_entitlement = staged.total_entitlement;
        state.forwarded = staged.forwarded;
        state.record(event);
        Ok(())
    }

    /// Owner-only update that changes sale state without moving funds.
    fn configure<R>(
        &self,
        op: &'static str,
        cap: &OwnerCapability,
        body: impl FnOnce(&mut SaleState<A>) -> SaleResult<(R, SaleEvent)>,
    ) -> SaleResult<R> {
        self.run(op, &cap.owner(), |state| {
            self.authorize(state, cap)?;
            let (value, event) = body(state)?;
            info!(sale = %self.id, op, ?event, "owner update applied");
            state.record(event);
            Ok(value)
        })
    }

    // ---- Purchases ----

    /// Buy with `payment` through the whitelist channel.
    ///
    /// The caller must be admitted by the sale's authority, and its
    /// cumulative purchase may not exceed the admitted allocation. Returns
    /// the entitlement bought.
    ///
    /// On the native rail `payment` is the value attached to the call and
    /// needs no allowance.
    pub fn whitelist_purchase(
        &self,
        caller: &Address,
        payment: u128,
        claim: &MembershipClaim,
    ) -> SaleResult<u128> {
        self.run("whitelist_purchase", caller, |state| {
            state.config.phases.require(Phase::WhitelistSale)?;
            let membership = state.authority.admit(caller, claim)?;
            self.purchase(state, caller, payment, PurchaseChannel::Whitelist, Some(membership))
        })
    }

    /// Buy with `payment` through the public channel. Only the global cap
    /// applies.
    pub fn public_purchase(&self, caller: &Address, payment: u128) -> SaleResult<u128> {
        self.run("public_purchase", caller, |state| {
            state.config.phases.require(Phase::PublicSale)?;
            self.purchase(state, caller, payment, PurchaseChannel::Public, None)
        })
    }

    fn purchase(
        &self,
        state: &mut SaleState<A>,
        caller: &Address,
        payment: u128,
        channel: PurchaseChannel,
        membership: Option<Membership>,
    ) -> SaleResult<u128> {
        if payment == 0 {
            return Err(SaleError::InvalidAmount("payment must be non-zero".into()));
        }
        let decimals = self.payment.metadata().decimals;
        let entitlement = math::entitlement_for(payment, state.config.sale_price, decimals)?;
        if entitlement == 0 {
            return Err(SaleError::InvalidAmount(format!(
                "payment {payment} buys no tokens"
            )));
        }

        let mut account = state.account(caller);
        let purchased = account
            .purchased
            .checked_add(entitlement)
            .ok_or(SaleError::ArithmeticOverflow)?;
        if let Some(membership) = membership {
            if purchased > membership.allocation {
                return Err(SaleError::AllocationExceeded {
                    requested: purchased,
                    allocation: membership.allocation,
                });
            }
            account.vesting |= membership.vesting;
        }
        let total_purchased = state
            .total_purchased
            .checked_add(payment)
            .ok_or(SaleError::ArithmeticOverflow)?;
        if total_purchased > state.config.total_cap {
            return Err(SaleError::CapExceeded {
                requested: total_purchased,
                cap: state.config.total_cap,
            });
        }
        account.purchased = purchased;

        let mut staged = Staged::from_state(state);
        staged.total_purchased = total_purchased;
        staged.total_entitlement = state
            .total_entitlement
            .checked_add(entitlement)
            .ok_or(SaleError::ArithmeticOverflow)?;
        let destination = match state.config.custody {
            Custody::Forward => {
                staged.forwarded = state
                    .forwarded
                    .checked_add(payment)
                    .ok_or(SaleError::ArithmeticOverflow)?;
                state.config.treasury
            }
            Custody::Held => self.address,
        };
        staged.account = Some((*caller, account));
        staged.payment_ops.push(match state.config.rail {
            PaymentRail::Token => LedgerOp::TransferFrom {
                spender: self.address,
                from: *caller,
                to: destination,
                amount: payment,
            },
            // The value travels with the call.
            PaymentRail::Native => LedgerOp::Transfer {
                from: *caller,
                to: destination,
                amount: payment,
            },
        });

        let event = SaleEvent::Purchased {
            account: *caller,
            channel,
            payment,
            entitlement,
        };
        self.commit(state, staged, event)?;
        info!(sale = %self.id, account = %caller, ?channel, payment, entitlement, "purchase accepted");
        Ok(entitlement)
    }

    // ---- Redemption and refunds ----

    /// Pay out everything the caller has purchased but not redeemed.
    ///
    /// Vesting accounts receive their release share; the rest goes to the
    /// treasury.
    pub fn redeem(&self, caller: &Address) -> SaleResult<RedemptionSplit> {
        self.run("redeem", caller, |state| {
            state.config.phases.require(Phase::Redeem)?;
            let mut account = state.account(caller);
            let owed = account.owed();
            if owed == 0 {
                return Err(SaleError::NothingToRedeem);
            }
            let split = math::split_redemption(owed, account.vesting)?;
            account.redeemed = account.purchased;

            let treasury = state.config.treasury;
            let mut staged = Staged::from_state(state);
            staged.account = Some((*caller, account));
            staged.token_ops = match state.config.redemption {
                RedemptionSource::Transfer => vec![
                    LedgerOp::Transfer {
                        from: self.address,
                        to: *caller,
                        amount: split.to_account,
                    },
                    LedgerOp::Transfer {
                        from: self.address,
                        to: treasury,
                        amount: split.to_treasury,
                    },
                ],
                RedemptionSource::Mint => vec![
                    LedgerOp::Mint {
                        minter: self.address,
                        to: *caller,
                        amount: split.to_account,
                    },
                    LedgerOp::Mint {
                        minter: self.address,
                        to: treasury,
                        amount: split.to_treasury,
                    },
                ],
            };

            let event = SaleEvent::Redeemed {
                account: *caller,
                to_account: split.to_account,
                to_treasury: split.to_treasury,
            };
            self.commit(state, staged, event)?;
            info!(
                sale = %self.id,
                account = %caller,
                to_account = split.to_account,
                to_treasury = split.to_treasury,
                "redemption paid"
            );
            Ok(split)
        })
    }

    /// Return `amount` sale tokens for their payment value.
    ///
    /// The tokens are burned from the caller's wallet using the allowance
    /// it granted the sale. Returns the payment refunded.
    pub fn refund(&self, caller: &Address, amount: u128) -> SaleResult<u128> {
        self.run("refund", caller, |state| {
            state.config.phases.require(Phase::Refund)?;
            let mut account = state.account(caller);
            if amount == 0 || amount > account.purchased {
                return Err(SaleError::InvalidAmount(format!(
                    "refund of {amount} against {} purchased",
                    account.purchased
                )));
            }
            let decimals = self.payment.metadata().decimals;
            let payment = math::refund_payment_for(amount, state.config.sale_price, decimals)?;
            if payment == 0 {
                return Err(SaleError::InvalidAmount(format!(
                    "refund of {amount} returns no payment"
                )));
            }
            account.purchased -= amount;
            account.redeemed -= account.redeemed.min(amount);

            let mut staged = Staged::from_state(state);
            staged.account = Some((*caller, account));
            staged.total_entitlement = state.total_entitlement.saturating_sub(amount);
            staged.total_purchased = state.total_purchased.saturating_sub(payment);
            staged.token_ops.push(LedgerOp::BurnFrom {
                spender: self.address,
                account: *caller,
                amount,
            });
            match state.config.custody {
                Custody::Forward => {
                    staged.forwarded = state.forwarded.saturating_sub(payment);
                    staged.payment_ops.push(LedgerOp::TransferFrom {
                        spender: self.address,
                        from: state.config.treasury,
                        to: *caller,
                        amount: payment,
                    });
                }
                Custody::Held => staged.payment_ops.push(LedgerOp::Transfer {
                    from: self.address,
                    to: *caller,
                    amount: payment,
                }),
            }

            let event = SaleEvent::Refunded {
                account: *caller,
                amount,
                payment,
            };
            self.commit(state, staged, event)?;
            info!(sale = %self.id, account = %caller, amount, payment, "refund paid");
            Ok(payment)
        })
    }

    // ---- Owner operations ----

    /// Move `amount` of held payment to the owner.
    pub fn withdraw(&self, cap: &OwnerCapability, amount: u128) -> SaleResult<()> {
        let owner = cap.owner();
        self.run("withdraw", &owner, |state| {
            self.authorize(state, cap)?;
            if amount == 0 {
                return Err(SaleError::InvalidAmount("withdrawal must be non-zero".into()));
            }
            let mut staged = Staged::from_state(state);
            staged.forwarded = state
                .forwarded
                .checked_add(amount)
                .ok_or(SaleError::ArithmeticOverflow)?;
            staged.payment_ops.push(LedgerOp::Transfer {
                from: self.address,
                to: owner,
                amount,
            });
            self.commit(state, staged, SaleEvent::Withdrawn { to: owner, amount })?;
            info!(sale = %self.id, %owner, amount, "payment withdrawn");
            Ok(())
        })
    }

    pub fn set_phase(&self, cap: &OwnerCapability, phase: Phase, active: bool) -> SaleResult<()> {
        self.configure("set_phase", cap, |state| {
            state.config.phases.set(phase, active);
            Ok(((), SaleEvent::PhaseChanged { phase, active }))
        })
    }

    /// Change the price for future purchases and refunds.
    pub fn set_sale_price(&self, cap: &OwnerCapability, sale_price: u128) -> SaleResult<()> {
        self.configure("set_sale_price", cap, |state| {
            if sale_price == 0 {
                return Err(SaleError::InvalidConfig("sale price must be non-zero".into()));
            }
            state.config.sale_price = sale_price;
            Ok(((), SaleEvent::PriceChanged { sale_price }))
        })
    }

    /// Change the cap. It may not drop below what has already been sold.
    pub fn set_total_cap(&self, cap: &OwnerCapability, total_cap: u128) -> SaleResult<()> {
        self.configure("set_total_cap", cap, |state| {
            if total_cap == 0 || total_cap < state.total_purchased {
                return Err(SaleError::InvalidConfig(format!(
                    "cap {total_cap} is below the {} already purchased",
                    state.total_purchased
                )));
            }
            state.config.total_cap = total_cap;
            Ok(((), SaleEvent::CapChanged { total_cap }))
        })
    }

    /// Change where future payments and vested redemptions go. Refunds of
    /// forwarded payments are pulled from the new treasury.
    pub fn set_treasury(&self, cap: &OwnerCapability, treasury: Address) -> SaleResult<()> {
        self.configure("set_treasury", cap, |state| {
            if treasury.is_zero() {
                return Err(SaleError::InvalidConfig("treasury must be set".into()));
            }
            state.config.treasury = treasury;
            Ok(((), SaleEvent::TreasuryChanged { treasury }))
        })
    }

    /// Mutate the membership authority. Existing account records are kept.
    pub fn update_allow_list<R>(
        &self,
        cap: &OwnerCapability,
        update: impl FnOnce(&mut A) -> R,
    ) -> SaleResult<R> {
        self.configure("update_allow_list", cap, |state| {
            let value = update(&mut state.authority);
            let event = SaleEvent::AllowListUpdated {
                authority: state.authority.name().to_string(),
            };
            Ok((value, event))
        })
    }

    /// Hand the sale to `new_owner`. The presented capability is consumed
    /// and a new one is issued.
    pub fn transfer_ownership(
        &self,
        cap: OwnerCapability,
        new_owner: Address,
    ) -> SaleResult<OwnerCapability> {
        self.configure("transfer_ownership", &cap, |state| {
            let from = state.seal.owner();
            let (next, seal) = OwnerCapability::issue(self.id, new_owner);
            state.seal = seal;
            Ok((next, SaleEvent::OwnershipTransferred { from, to: new_owner }))
        })
    }

    // ---- Views ----

    pub fn config(&self) -> SaleResult<SaleConfig> {
        Ok(self.read_state()?.config.clone())
    }

    pub fn phases(&self) -> SaleResult<PhaseFlags> {
        Ok(self.read_state()?.config.phases)
    }

    pub fn owner(&self) -> SaleResult<Address> {
        Ok(self.read_state()?.seal.owner())
    }

    pub fn account(&self, address: &Address) -> SaleResult<Account> {
        Ok(self.read_state()?.account(address))
    }

    pub fn purchased(&self, address: &Address) -> SaleResult<u128> {
        Ok(self.account(address)?.purchased)
    }

    pub fn redeemed(&self, address: &Address) -> SaleResult<u128> {
        Ok(self.account(address)?.redeemed)
    }

    pub fn vesting(&self, address: &Address) -> SaleResult<bool> {
        Ok(self.account(address)?.vesting)
    }

    pub fn total_purchased(&self) -> SaleResult<u128> {
        Ok(self.read_state()?.total_purchased)
    }

    pub fn total_entitlement(&self) -> SaleResult<u128> {
        Ok(self.read_state()?.total_entitlement)
    }

    /// Payment still accepted before the cap is reached.
    pub fn remaining_cap(&self) -> SaleResult<u128> {
        let state = self.read_state()?;
        Ok(state.config.total_cap.saturating_sub(state.total_purchased))
    }

    pub fn journal(&self) -> SaleResult<Vec<SaleRecord>> {
        Ok(self.read_state()?.journal.clone())
    }

    /// Read the membership authority.
    pub fn with_authority<R>(&self, read: impl FnOnce(&A) -> R) -> SaleResult<R> {
        Ok(read(&self.read_state()?.authority))
    }

    pub fn snapshot(&self) -> SaleResult<SaleSnapshot> {
        let state = self.read_state()?;
        Ok(self.snapshot_of(&state))
    }

    fn snapshot_of(&self, state: &SaleState<A>) -> SaleSnapshot {
        SaleSnapshot {
            id: self.id,
            address: self.address,
            owner: state.seal.owner(),
            config: state.config.clone(),
            accounts: state.accounts.clone(),
            total_purchased: state.total_purchased,
            total_entitlement: state.total_entitlement,
            forwarded: state.forwarded,
            journal: state.journal.clone(),
        }
    }

    /// Audit the sale's accounting against the payment it currently holds.
    pub fn audit(&self) -> SaleResult<AuditReport> {
        let state = self.read_state()?;
        let held = self.payment.balance_of(&self.address)?;
        Ok(SaleAuditor::audit(&self.snapshot_of(&state), held))
    }
}

impl<P, T> TokenSale<P, T, MerkleAllowList>
where
    P: FungibleLedger,
    T: MintableLedger,
{
    /// The committed allow-list root.
    pub fn root(&self) -> SaleResult<Digest> {
        self.with_authority(MerkleAllowList::root)
    }

    /// Commit to a new allow-list.
    pub fn set_root(&self, cap: &OwnerCapability, root: Digest) -> SaleResult<()> {
        self.configure("set_root", cap, |state| {
            state.authority.set_root(root);
            Ok(((), SaleEvent::RootChanged { root }))
        })
    }
}

impl<P, T> TokenSale<P, T, DirectAllowList>
where
    P: FungibleLedger,
    T: MintableLedger,
{
    pub fn whitelist_accounts(&self, cap: &OwnerCapability, accounts: &[Address]) -> SaleResult<()> {
        self.update_allow_list(cap, |list| list.whitelist_accounts(accounts))
    }

    pub fn whitelist_accounts_with_allocation(
        &self,
        cap: &OwnerCapability,
        accounts: &[Address],
        allocations: &[u128],
        vesting: bool,
    ) -> SaleResult<()> {
        self.configure("whitelist_accounts_with_allocation", cap, |state| {
            state
                .authority
                .whitelist_accounts_with_allocation(accounts, allocations, vesting)?;
            let event = SaleEvent::AllowListUpdated {
                authority: state.authority.name().to_string(),
            };
            Ok(((), event))
        })
    }

    pub fn remove_accounts(&self, cap: &OwnerCapability, accounts: &[Address]) -> SaleResult<()> {
        self.update_allow_list(cap, |list| list.remove_accounts(accounts))
    }

    pub fn set_base_allocation(&self, cap: &OwnerCapability, allocation: u128) -> SaleResult<()> {
        self.update_allow_list(cap, |list| list.set_base_allocation(allocation))
    }

    /// Set or clear the whitelist total shared by accounts listed without
    /// an individual allocation.
    pub fn set_whitelist_cap(
        &self,
        cap: &OwnerCapability,
        whitelist_cap: Option<u128>,
    ) -> SaleResult<()> {
        self.update_allow_list(cap, |list| list.set_whitelist_cap(whitelist_cap))
    }

    /// Number of listed accounts.
    pub fn whitelist_count(&self) -> SaleResult<usize> {
        self.with_authority(DirectAllowList::len)
    }

    /// Effective whitelist terms for `account`, if listed.
    pub fn membership(&self, account: &Address) -> SaleResult<Option<Membership>> {
        self.with_authority(|list| list.membership(account))
    }
}
