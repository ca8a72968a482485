use tsl_types::Address;

use crate::capability::SaleId;
use crate::sale::SaleSnapshot;

/// Result of auditing a sale snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuditReport {
    pub sale: SaleId,
    pub account_count: usize,
    pub entitlement_consistent: bool,
    pub within_cap: bool,
    pub funds_covered: bool,
    pub journal_sequential: bool,
    pub violations: Vec<Violation>,
}

impl AuditReport {
    /// Returns `true` if all checks passed.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// A specific accounting violation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    /// The account concerned, for per-account checks.
    pub account: Option<Address>,
    pub kind: ViolationKind,
    pub description: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViolationKind {
    RedeemedExceedsPurchased,
    EntitlementMismatch,
    CapExceeded,
    FundsShortfall,
    SequenceGap,
}

/// Sale accounting auditor.
pub struct SaleAuditor;

impl SaleAuditor {
    /// Audit `snapshot`, given the payment balance currently held at the
    /// sale's address.
    ///
    /// Payments still held plus payments that left custody (forwarded to the
    /// treasury or withdrawn by the owner) must cover every unrefunded
    /// purchase.
    pub fn audit(snapshot: &SaleSnapshot, held_payment: u128) -> AuditReport {
        let mut violations = Vec::new();
        let mut entitlement_sum: u128 = 0;
        let mut sum_overflowed = false;

        for (address, account) in &snapshot.accounts {
            if account.redeemed > account.purchased {
                violations.push(Violation {
                    account: Some(*address),
                    kind: ViolationKind::RedeemedExceedsPurchased,
                    description: format!(
                        "redeemed {} exceeds purchased {}",
                        account.redeemed, account.purchased
                    ),
                });
            }
            match entitlement_sum.checked_add(account.purchased) {
                Some(sum) => entitlement_sum = sum,
                None => sum_overflowed = true,
            }
        }

        let entitlement_consistent =
            !sum_overflowed && entitlement_sum == snapshot.total_entitlement;
        if !entitlement_consistent {
            violations.push(Violation {
                account: None,
                kind: ViolationKind::EntitlementMismatch,
                description: format!(
                    "accounts sum to {entitlement_sum}, total entitlement is {}",
                    snapshot.total_entitlement
                ),
            });
        }

        let within_cap = snapshot.total_purchased <= snapshot.config.total_cap;
        if !within_cap {
            violations.push(Violation {
                account: None,
                kind: ViolationKind::CapExceeded,
                description: format!(
                    "total purchased {} exceeds cap {}",
                    snapshot.total_purchased, snapshot.config.total_cap
                ),
            });
        }

        let covered = held_payment.saturating_add(snapshot.forwarded);
        let funds_covered = covered >= snapshot.total_purchased;
        if !funds_covered {
            violations.push(Violation {
                account: None,
                kind: ViolationKind::FundsShortfall,
                description: format!(
                    "held {held_payment} plus forwarded {} is below total purchased {}",
                    snapshot.forwarded, snapshot.total_purchased
                ),
            });
        }

        let mut journal_sequential = true;
        for (index, record) in snapshot.journal.iter().enumerate() {
            let expected = (index + 1) as u64;
            if record.seq != expected {
                journal_sequential = false;
                violations.push(Violation {
                    account: None,
                    kind: ViolationKind::SequenceGap,
                    description: format!("expected seq {expected}, got {}", record.seq),
                });
            }
        }

        AuditReport {
            sale: snapshot.id,
            account_count: snapshot.accounts.len(),
            entitlement_consistent,
            within_cap,
            funds_covered,
            journal_sequential,
            violations,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::account::Account;
    use crate::config::SaleConfig;
    use crate::events::{SaleEvent, SaleRecord};

    use super::*;

    fn snapshot() -> SaleSnapshot {
        let id = SaleId::new();
        let mut accounts = BTreeMap::new();
        accounts.insert(
            Address::derive(b"alice"),
            Account {
                purchased: 42,
                redeemed: 0,
                vesting: false,
            },
        );
        SaleSnapshot {
            id,
            address: id.address(),
            owner: Address::derive(b"owner"),
            config: SaleConfig::with_treasury(Address::derive(b"treasury")),
            accounts,
            total_purchased: 1,
            total_entitlement: 42,
            forwarded: 1,
            journal: vec![SaleRecord {
                seq: 1,
                event: SaleEvent::CapChanged { total_cap: 10 },
            }],
        }
    }

    #[test]
    fn consistent_snapshot_passes() {
        let report = SaleAuditor::audit(&snapshot(), 0);
        assert!(report.is_valid(), "{:?}", report.violations);
        assert_eq!(report.account_count, 1);
    }

    #[test]
    fn detects_each_violation() {
        let mut bad = snapshot();
        let alice = Address::derive(b"alice");
        if let Some(account) = bad.accounts.get_mut(&alice) {
            account.redeemed = 43;
        }
        bad.total_entitlement = 41;
        bad.config.total_cap = 0;
        bad.forwarded = 0;
        bad.journal[0].seq = 2;

        let report = SaleAuditor::audit(&bad, 0);
        let kinds: Vec<_> = report.violations.iter().map(|v| v.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ViolationKind::RedeemedExceedsPurchased,
                ViolationKind::EntitlementMismatch,
                ViolationKind::CapExceeded,
                ViolationKind::FundsShortfall,
                ViolationKind::SequenceGap,
            ]
        );
        assert_eq!(report.violations[0].account, Some(alice));
        assert!(!report.entitlement_consistent);
        assert!(!report.within_cap);
        assert!(!report.funds_covered);
        assert!(!report.journal_sequential);
    }

    #[test]
    fn held_balance_counts_toward_coverage() {
        let mut held = snapshot();
        held.forwarded = 0;
        assert!(!SaleAuditor::audit(&held, 0).funds_covered);
        assert!(SaleAuditor::audit(&held, 1).funds_covered);
    }
}
