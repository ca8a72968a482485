use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tsl_types::amount::serde_u128;
use tsl_types::{Address, PRICE_SCALE};

use crate::error::{SaleError, SaleResult};

/// One of the four independently toggled sale phases.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    WhitelistSale,
    PublicSale,
    Redeem,
    Refund,
}

impl Phase {
    pub const ALL: [Phase; 4] = [
        Phase::WhitelistSale,
        Phase::PublicSale,
        Phase::Redeem,
        Phase::Refund,
    ];
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WhitelistSale => write!(f, "whitelist sale"),
            Self::PublicSale => write!(f, "public sale"),
            Self::Redeem => write!(f, "redeem"),
            Self::Refund => write!(f, "refund"),
        }
    }
}

/// Phase switches. No ordering is enforced between them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseFlags {
    pub whitelist_sale_active: bool,
    pub public_sale_active: bool,
    pub redeem_active: bool,
    pub refund_active: bool,
}

impl PhaseFlags {
    /// All phases switched on.
    pub fn all_active() -> Self {
        Self {
            whitelist_sale_active: true,
            public_sale_active: true,
            redeem_active: true,
            refund_active: true,
        }
    }

    pub fn is_active(&self, phase: Phase) -> bool {
        match phase {
            Phase::WhitelistSale => self.whitelist_sale_active,
            Phase::PublicSale => self.public_sale_active,
            Phase::Redeem => self.redeem_active,
            Phase::Refund => self.refund_active,
        }
    }

    pub fn set(&mut self, phase: Phase, active: bool) {
        let flag = match phase {
            Phase::WhitelistSale => &mut self.whitelist_sale_active,
            Phase::PublicSale => &mut self.public_sale_active,
            Phase::Redeem => &mut self.redeem_active,
            Phase::Refund => &mut self.refund_active,
        };
        *flag = active;
    }

    /// `Ok` if `phase` is active, `PhaseInactive` otherwise.
    pub fn require(&self, phase: Phase) -> SaleResult<()> {
        if self.is_active(phase) {
            Ok(())
        } else {
            Err(SaleError::PhaseInactive(phase))
        }
    }
}

/// Where accepted payments go.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Custody {
    /// Payments are pulled straight to the treasury; refunds are pulled back
    /// from the treasury, which must have approved the sale.
    #[default]
    Forward,
    /// Payments are held at the sale's own address until the owner
    /// withdraws them; refunds are paid from that balance.
    Held,
}

/// How buyers pay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentRail {
    /// Payment-token transfers pulled with the allowance the buyer granted
    /// the sale.
    #[default]
    Token,
    /// Native currency attached to the call. The value comes with the call
    /// itself, so it is debited from the buyer without an allowance. Only
    /// valid with held custody, since the treasury cannot approve native
    /// refunds.
    Native,
}

/// How redeemed entitlements are delivered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedemptionSource {
    /// Transfer from tokens pre-funded to the sale's address.
    #[default]
    Transfer,
    /// Mint on demand; the sale's address must be a token admin.
    Mint,
}

/// Sale configuration.
///
/// Amounts are integers in smallest units and are written as decimal
/// strings in TOML, since TOML integers stop at 64 bits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaleConfig {
    /// Sale-token units per 1.0 payment unit, scaled by 10^18.
    #[serde(with = "serde_u128")]
    pub sale_price: u128,
    /// Maximum cumulative payment, in the payment token's smallest unit.
    #[serde(with = "serde_u128")]
    pub total_cap: u128,
    /// Receives forwarded payments and the vested share of redemptions.
    pub treasury: Address,
    pub custody: Custody,
    pub rail: PaymentRail,
    pub redemption: RedemptionSource,
    /// Phase flags at construction.
    pub phases: PhaseFlags,
}

impl Default for SaleConfig {
    fn default() -> Self {
        Self {
            sale_price: 42 * PRICE_SCALE,
            // 18,696,969 units of a 6-decimal payment token.
            total_cap: 18_696_969 * 1_000_000,
            treasury: Address::zero(),
            custody: Custody::default(),
            rail: PaymentRail::default(),
            redemption: RedemptionSource::default(),
            phases: PhaseFlags::default(),
        }
    }
}

impl SaleConfig {
    /// Default configuration paying into `treasury`.
    pub fn with_treasury(treasury: Address) -> Self {
        Self {
            treasury,
            ..Default::default()
        }
    }

    /// Reject configurations the sale cannot operate under.
    pub fn validate(&self) -> SaleResult<()> {
        if self.sale_price == 0 {
            return Err(SaleError::InvalidConfig("sale price must be non-zero".into()));
        }
        if self.total_cap == 0 {
            return Err(SaleError::InvalidConfig("total cap must be non-zero".into()));
        }
        if self.treasury.is_zero() {
            return Err(SaleError::InvalidConfig("treasury must be set".into()));
        }
        if self.rail == PaymentRail::Native && self.custody != Custody::Held {
            return Err(SaleError::InvalidConfig(
                "native payments require held custody".into(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> SaleResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| SaleError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> SaleResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SaleError::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> SaleResult<String> {
        toml::to_string_pretty(self).map_err(|e| SaleError::InvalidConfig(e.to_string()))
    }
}
