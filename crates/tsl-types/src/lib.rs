//! Foundation types for the Token Sale Ledger (TSL).
//!
//! Every other TSL crate depends on `tsl-types`.
//!
//! # Key Types
//!
//! - [`Address`]: 20-byte participant/account address with a normalized text form
//! - [`Digest`]: 32-byte hash used for allow-list leaves, nodes, and roots
//! - [`amount`]: exact fixed-point helpers (`parse_units`, `format_units`)

pub mod address;
pub mod amount;
pub mod digest;
pub mod error;

pub use address::Address;
pub use amount::{format_units, parse_units, pow10, Units, PRICE_SCALE, TOKEN_DECIMALS};
pub use digest::Digest;
pub use error::TypeError;
