use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tsl_crypto::{build_leaf, verify, EntryProof, Proof};
use tsl_types::amount::serde_u128;
use tsl_types::{Address, Digest};

use crate::error::{SaleError, SaleResult};

/// What a buyer presents to the whitelist channel.
///
/// `allocation` is in sale-token units. Authorities that keep their own
/// records ignore the claim entirely.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipClaim {
    #[serde(with = "serde_u128")]
    pub allocation: u128,
    pub vesting: bool,
    #[serde(default)]
    pub proof: Proof,
}

impl MembershipClaim {
    pub fn new(allocation: u128, vesting: bool, proof: Proof) -> Self {
        Self {
            allocation,
            vesting,
            proof,
        }
    }
}

impl From<&EntryProof> for MembershipClaim {
    fn from(entry: &EntryProof) -> Self {
        Self {
            allocation: entry.entry.allocation,
            vesting: entry.entry.vesting,
            proof: entry.proof.clone(),
        }
    }
}

/// An admitted account's whitelist terms.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Membership {
    /// Ceiling on the account's cumulative purchased entitlement.
    pub allocation: u128,
    pub vesting: bool,
}

/// Decides who may buy through the whitelist channel, and on what terms.
pub trait MembershipAuthority: Send + Sync {
    /// Short label for logs and events.
    fn name(&self) -> &'static str;

    /// Admit `account` under `claim`, or fail with `InvalidProof`.
    fn admit(&self, account: &Address, claim: &MembershipClaim) -> SaleResult<Membership>;
}

/// Allow-list committed to as a single Merkle root.
///
/// Buyers prove their own `(allocation, vesting)` entry; the sale stores
/// nothing per listed account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerkleAllowList {
    root: Digest,
}

impl MerkleAllowList {
    pub fn new(root: Digest) -> Self {
        Self { root }
    }

    pub fn root(&self) -> Digest {
        self.root
    }

    /// Replace the committed list. Existing accounts keep their records.
    pub fn set_root(&mut self, root: Digest) {
        self.root = root;
    }
}

impl MembershipAuthority for MerkleAllowList {
    fn name(&self) -> &'static str {
        "merkle"
    }

    fn admit(&self, account: &Address, claim: &MembershipClaim) -> SaleResult<Membership> {
        let leaf = build_leaf(account, claim.allocation, claim.vesting);
        if verify(&self.root, &leaf, &claim.proof) {
            Ok(Membership {
                allocation: claim.allocation,
                vesting: claim.vesting,
            })
        } else {
            Err(SaleError::InvalidProof(*account))
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct DirectEntry {
    /// `None` follows the list's base allocation.
    allocation: Option<u128>,
    vesting: bool,
}

/// Allow-list kept as an explicit account map.
///
/// Accounts added without an allocation of their own follow the base
/// allocation, which the owner may change at any time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DirectAllowList {
    base_allocation: u128,
    /// Whitelist total shared evenly by accounts without their own
    /// allocation. Takes precedence over `base_allocation` when set.
    whitelist_cap: Option<u128>,
    entries: HashMap<Address, DirectEntry>,
}

impl DirectAllowList {
    pub fn new(base_allocation: u128) -> Self {
        Self {
            base_allocation,
            whitelist_cap: None,
            entries: HashMap::new(),
        }
    }

    /// A list whose accounts split `whitelist_cap` evenly.
    pub fn with_whitelist_cap(whitelist_cap: u128) -> Self {
        Self {
            whitelist_cap: Some(whitelist_cap),
            ..Self::new(0)
        }
    }

    pub fn base_allocation(&self) -> u128 {
        self.base_allocation
    }

    pub fn whitelist_cap(&self) -> Option<u128> {
        self.whitelist_cap
    }

    /// Set or clear the shared whitelist total.
    pub fn set_whitelist_cap(&mut self, whitelist_cap: Option<u128>) {
        self.whitelist_cap = whitelist_cap;
    }

    /// Allocation of a listed account without an individual one.
    ///
    /// With a whitelist cap this is the cap divided by the number of listed
    /// accounts, so listing more accounts shrinks every share.
    pub fn default_allocation(&self) -> u128 {
        match self.whitelist_cap {
            Some(cap) => cap / self.entries.len().max(1) as u128,
            None => self.base_allocation,
        }
    }

    pub fn set_base_allocation(&mut self, allocation: u128) {
        self.base_allocation = allocation;
    }

    /// List accounts at the base allocation without vesting.
    pub fn whitelist_accounts(&mut self, accounts: &[Address]) {
        for account in accounts {
            self.entries.insert(
                *account,
                DirectEntry {
                    allocation: None,
                    vesting: false,
                },
            );
        }
    }

    /// List accounts with individual allocations.
    pub fn whitelist_accounts_with_allocation(
        &mut self,
        accounts: &[Address],
        allocations: &[u128],
        vesting: bool,
    ) -> SaleResult<()> {
        if accounts.len() != allocations.len() {
            return Err(SaleError::InvalidConfig(format!(
                "{} accounts but {} allocations",
                accounts.len(),
                allocations.len()
            )));
        }
        for (account, allocation) in accounts.iter().zip(allocations) {
            self.entries.insert(
                *account,
                DirectEntry {
                    allocation: Some(*allocation),
                    vesting,
                },
            );
        }
        Ok(())
    }

    pub fn remove_accounts(&mut self, accounts: &[Address]) {
        for account in accounts {
            self.entries.remove(account);
        }
    }

    pub fn contains(&self, account: &Address) -> bool {
        self.entries.contains_key(account)
    }

    /// Effective terms for `account`, if listed.
    pub fn membership(&self, account: &Address) -> Option<Membership> {
        self.entries.get(account).map(|entry| Membership {
            allocation: entry.allocation.unwrap_or_else(|| self.default_allocation()),
            vesting: entry.vesting,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl MembershipAuthority for DirectAllowList {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn admit(&self, account: &Address, _claim: &MembershipClaim) -> SaleResult<Membership> {
        self.membership(account)
            .ok_or(SaleError::InvalidProof(*account))
    }
}

#[cfg(test)]
mod tests {
    use tsl_crypto::{AllowListCommitment, AllowListEntry};

    use super::*;

    fn entries() -> Vec<AllowListEntry> {
        vec![
            AllowListEntry::new(Address::derive(b"alice"), 210_000, false),
            AllowListEntry::new(Address::derive(b"bob"), 420_000, false),
            AllowListEntry::new(Address::derive(b"carol"), 5_250_000, true),
        ]
    }

    #[test]
    fn merkle_admits_listed_terms() {
        let commitment = AllowListCommitment::build(&entries()).unwrap();
        let list = MerkleAllowList::new(commitment.root);
        let carol = Address::derive(b"carol");
        let claim = MembershipClaim::from(commitment.proof_for(&carol).unwrap());

        let membership = list.admit(&carol, &claim).unwrap();
        assert_eq!(
            membership,
            Membership {
                allocation: 5_250_000,
                vesting: true
            }
        );
    }

    #[test]
    fn merkle_rejects_altered_terms_and_other_callers() {
        let commitment = AllowListCommitment::build(&entries()).unwrap();
        let list = MerkleAllowList::new(commitment.root);
        let alice = Address::derive(b"alice");
        let claim = MembershipClaim::from(commitment.proof_for(&alice).unwrap());

        let mut inflated = claim.clone();
        inflated.allocation += 1;
        assert_eq!(
            list.admit(&alice, &inflated).unwrap_err(),
            SaleError::InvalidProof(alice)
        );

        let mut vesting = claim.clone();
        vesting.vesting = true;
        assert!(list.admit(&alice, &vesting).is_err());

        let mallory = Address::derive(b"mallory");
        assert_eq!(
            list.admit(&mallory, &claim).unwrap_err(),
            SaleError::InvalidProof(mallory)
        );
    }

    #[test]
    fn merkle_null_root_admits_nobody() {
        let list = MerkleAllowList::new(Digest::null());
        let claim = MembershipClaim::default();
        assert!(list.admit(&Address::derive(b"alice"), &claim).is_err());
    }

    #[test]
    fn direct_list_follows_base_allocation() {
        let alice = Address::derive(b"alice");
        let mut list = DirectAllowList::new(5_000);
        list.whitelist_accounts(&[alice]);
        assert_eq!(list.membership(&alice).unwrap().allocation, 5_000);

        list.set_base_allocation(7_000);
        let membership = list.admit(&alice, &MembershipClaim::default()).unwrap();
        assert_eq!(membership.allocation, 7_000);
        assert!(!membership.vesting);
    }

    #[test]
    fn direct_list_custom_allocations() {
        let alice = Address::derive(b"alice");
        let bob = Address::derive(b"bob");
        let mut list = DirectAllowList::new(5_000);
        list.whitelist_accounts_with_allocation(&[alice, bob], &[1, 2], true)
            .unwrap();
        list.set_base_allocation(9);
        assert_eq!(
            list.membership(&bob),
            Some(Membership {
                allocation: 2,
                vesting: true
            })
        );
        assert_eq!(list.len(), 2);

        let err = list
            .whitelist_accounts_with_allocation(&[alice], &[1, 2], false)
            .unwrap_err();
        assert!(matches!(err, SaleError::InvalidConfig(_)));
    }

    #[test]
    fn direct_list_removal_revokes_admission() {
        let alice = Address::derive(b"alice");
        let mut list = DirectAllowList::new(5_000);
        list.whitelist_accounts(&[alice]);
        list.remove_accounts(&[alice]);
        assert!(list.is_empty());
        assert_eq!(
            list.admit(&alice, &MembershipClaim::default()).unwrap_err(),
            SaleError::InvalidProof(alice)
        );
    }

    #[test]
    fn whitelist_cap_is_shared_by_listed_accounts() {
        let (alice, bob) = (Address::derive(b"alice"), Address::derive(b"bob"));
        let mut list = DirectAllowList::with_whitelist_cap(2_100);
        assert_eq!(list.default_allocation(), 2_100);

        list.whitelist_accounts(&[alice, bob]);
        assert_eq!(list.membership(&alice).unwrap().allocation, 1_050);

        list.whitelist_accounts_with_allocation(&[Address::derive(b"carol")], &[7], false)
            .unwrap();
        assert_eq!(list.membership(&bob).unwrap().allocation, 700);

        list.set_whitelist_cap(None);
        list.set_base_allocation(5);
        assert_eq!(list.membership(&alice).unwrap().allocation, 5);
    }
}
