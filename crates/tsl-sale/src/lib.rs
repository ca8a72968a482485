//! Sale accounting state machine for the Token Sale Ledger (TSL).
//!
//! This crate is the heart of TSL. It provides:
//! - [`TokenSale`] -- phase-gated purchase, redemption, and refund over
//!   external payment and sale token ledgers
//! - [`MembershipAuthority`] -- the allow-list boundary, with a Merkle-proof
//!   implementation ([`MerkleAllowList`]) and a stored-map implementation
//!   ([`DirectAllowList`])
//! - [`OwnerCapability`] -- the credential required by every owner-only call
//! - [`SaleConfig`] -- pricing, cap, treasury, custody, payment rail, and
//!   phase flags
//! - [`SaleAuditor`] -- invariant checks over a sale snapshot
//!
//! Every call runs under the sale's write lock and is all-or-nothing: effects
//! are staged first, both ledger batches are prepared (validated, with each
//! ledger held), and only then is anything applied.

pub mod account;
pub mod audit;
pub mod authority;
pub mod capability;
pub mod config;
pub mod error;
pub mod events;
pub mod math;
pub mod sale;

pub use account::Account;
pub use audit::{AuditReport, SaleAuditor, Violation, ViolationKind};
pub use authority::{
    DirectAllowList, Membership, MembershipAuthority, MembershipClaim, MerkleAllowList,
};
pub use capability::{OwnerCapability, SaleId};
pub use config::{Custody, PaymentRail, Phase, PhaseFlags, RedemptionSource, SaleConfig};
pub use error::{ErrorKind, SaleError, SaleResult};
pub use events::{PurchaseChannel, SaleEvent, SaleRecord};
pub use math::RedemptionSplit;
pub use sale::{SaleSnapshot, TokenSale};
