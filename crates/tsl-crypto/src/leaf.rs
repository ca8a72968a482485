use serde::{Deserialize, Serialize};
use tsl_types::amount::serde_u128;
use tsl_types::{parse_units, Address, Digest};

use crate::error::AllowListError;
use crate::hasher::keccak256;

/// Length of the packed leaf encoding: address, 256-bit allocation, flag.
pub const LEAF_ENCODING_LEN: usize = 20 + 32 + 1;

/// One allow-list entry: who may buy, how much entitlement, and whether
/// redemptions are subject to the vesting split.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AllowListEntry {
    pub address: Address,
    /// Maximum entitlement in the sale token's smallest unit.
    #[serde(with = "serde_u128")]
    pub allocation: u128,
    pub vesting: bool,
}

impl AllowListEntry {
    pub fn new(address: Address, allocation: u128, vesting: bool) -> Self {
        Self {
            address,
            allocation,
            vesting,
        }
    }

    /// Build an entry from human input, e.g. `("0x7099…", "210000", false, 18)`.
    pub fn parse(
        address: &str,
        allocation: &str,
        vesting: bool,
        decimals: u8,
    ) -> Result<Self, AllowListError> {
        Ok(Self {
            address: Address::parse(address)?,
            allocation: parse_units(allocation, decimals)?,
            vesting,
        })
    }

    /// Packed encoding: `address || allocation as u256 big-endian || vesting`.
    pub fn encode(&self) -> [u8; LEAF_ENCODING_LEN] {
        let mut out = [0u8; LEAF_ENCODING_LEN];
        out[..20].copy_from_slice(self.address.as_bytes());
        // High 16 bytes of the 256-bit word stay zero.
        out[36..52].copy_from_slice(&self.allocation.to_be_bytes());
        out[52] = u8::from(self.vesting);
        out
    }

    /// The leaf digest committed to by the allow-list tree:
    /// `keccak256(abi.encodePacked(address, uint256, bool))`.
    pub fn leaf(&self) -> Digest {
        keccak256(&self.encode())
    }
}

/// Leaf digest for `(address, allocation, vesting)`.
pub fn build_leaf(address: &Address, allocation: u128, vesting: bool) -> Digest {
    AllowListEntry::new(*address, allocation, vesting).leaf()
}
