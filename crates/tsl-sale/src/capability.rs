use std::fmt;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use tsl_types::Address;
use uuid::Uuid;

/// Unique identifier of a sale instance (UUID v7, time-ordered).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SaleId(Uuid);

impl SaleId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// The account address the sale holds funds under.
    pub fn address(&self) -> Address {
        let mut seed = b"sale:".to_vec();
        seed.extend_from_slice(self.0.as_bytes());
        Address::derive(&seed)
    }

    pub fn short_id(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for SaleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SaleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SaleId({})", self.short_id())
    }
}

impl fmt::Display for SaleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Proof of ownership of one sale.
///
/// Issued once, when the sale is created. It cannot be cloned, so owner
/// authority moves with the value: [`TokenSale::transfer_ownership`]
/// consumes it and hands back a fresh one for the new owner.
///
/// [`TokenSale::transfer_ownership`]: crate::TokenSale::transfer_ownership
pub struct OwnerCapability {
    sale: SaleId,
    owner: Address,
    secret: [u8; 32],
}

impl OwnerCapability {
    /// Mint a capability for `owner` and the seal the sale keeps to check it.
    pub(crate) fn issue(sale: SaleId, owner: Address) -> (Self, OwnerSeal) {
        let mut secret = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut secret);
        let seal = OwnerSeal {
            owner,
            secret_hash: *blake3::hash(&secret).as_bytes(),
        };
        (
            Self {
                sale,
                owner,
                secret,
            },
            seal,
        )
    }

    pub fn sale(&self) -> SaleId {
        self.sale
    }

    pub fn owner(&self) -> Address {
        self.owner
    }
}

impl fmt::Debug for OwnerCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnerCapability")
            .field("sale", &self.sale)
            .field("owner", &self.owner)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// What a sale remembers about its current owner capability.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct OwnerSeal {
    owner: Address,
    secret_hash: [u8; 32],
}

impl OwnerSeal {
    pub(crate) fn owner(&self) -> Address {
        self.owner
    }

    /// `true` if `cap` was issued by the sale `sale` under this seal.
    pub(crate) fn admits(&self, sale: SaleId, cap: &OwnerCapability) -> bool {
        cap.sale == sale
            && cap.owner == self.owner
            && blake3::hash(&cap.secret).as_bytes() == &self.secret_hash
    }
}
