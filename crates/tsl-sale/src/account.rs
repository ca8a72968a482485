use serde::{Deserialize, Serialize};
use tsl_types::amount::serde_u128;

/// Per-buyer sale record. Amounts are sale-token units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Cumulative entitlement bought and not refunded.
    #[serde(with = "serde_u128")]
    pub purchased: u128,
    /// Portion of `purchased` already paid out.
    #[serde(with = "serde_u128")]
    pub redeemed: u128,
    /// Once set by a whitelist purchase, stays set.
    pub vesting: bool,
}

impl Account {
    /// Entitlement not yet redeemed.
    pub fn owed(&self) -> u128 {
        self.purchased.saturating_sub(self.redeemed)
    }

    pub fn is_empty(&self) -> bool {
        self.purchased == 0 && self.redeemed == 0 && !self.vesting
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owed_is_unredeemed_purchase() {
        let account = Account {
            purchased: 10,
            redeemed: 4,
            vesting: false,
        };
        assert_eq!(account.owed(), 6);
        assert!(!account.is_empty());
        assert!(Account::default().is_empty());
    }
}
