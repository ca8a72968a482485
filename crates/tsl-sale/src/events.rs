use serde::{Deserialize, Serialize};
use tsl_types::amount::serde_u128;
use tsl_types::{Address, Digest};

use crate::config::Phase;

/// Which purchase entry point accepted a payment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseChannel {
    Whitelist,
    Public,
}

/// A committed state change, as recorded in the sale journal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SaleEvent {
    Purchased {
        account: Address,
        channel: PurchaseChannel,
        #[serde(with = "serde_u128")]
        payment: u128,
        #[serde(with = "serde_u128")]
        entitlement: u128,
    },
    Redeemed {
        account: Address,
        #[serde(with = "serde_u128")]
        to_account: u128,
        #[serde(with = "serde_u128")]
        to_treasury: u128,
    },
    Refunded {
        account: Address,
        #[serde(with = "serde_u128")]
        amount: u128,
        #[serde(with = "serde_u128")]
        payment: u128,
    },
    Withdrawn {
        to: Address,
        #[serde(with = "serde_u128")]
        amount: u128,
    },
    PhaseChanged {
        phase: Phase,
        active: bool,
    },
    PriceChanged {
        #[serde(with = "serde_u128")]
        sale_price: u128,
    },
    CapChanged {
        #[serde(with = "serde_u128")]
        total_cap: u128,
    },
    TreasuryChanged {
        treasury: Address,
    },
    RootChanged {
        root: Digest,
    },
    AllowListUpdated {
        authority: String,
    },
    OwnershipTransferred {
        from: Address,
        to: Address,
    },
}

/// A journal entry. Sequence numbers start at 1 and have no gaps.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRecord {
    pub seq: u64,
    #[serde(flatten)]
    pub event: SaleEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_serialize_flat_with_string_amounts() {
        let record = SaleRecord {
            seq: 3,
            event: SaleEvent::Purchased {
                account: Address::derive(b"alice"),
                channel: PurchaseChannel::Whitelist,
                payment: 1_000_000,
                entitlement: 42_000_000_000_000_000_000,
            },
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["seq"], 3);
        assert_eq!(json["event"], "purchased");
        assert_eq!(json["channel"], "whitelist");
        assert_eq!(json["entitlement"], "42000000000000000000");
    }
}
