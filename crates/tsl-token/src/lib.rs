//! Fungible ledger boundaries for the Token Sale Ledger.
//!
//! The sale never owns token balances itself. It talks to two external
//! ledgers through the traits defined here:
//!
//! - [`FungibleLedger`] -- the payment token (transfer, approve, allowance)
//! - [`MintableLedger`] -- the sale token (additionally mint, burn, admins)
//!
//! Every state change is expressed as a batch of [`LedgerOp`]s. A batch can
//! be dry-run with [`FungibleLedger::check`] and is applied all-or-nothing by
//! [`FungibleLedger::execute`]. [`FungibleLedger::prepare`] splits execution
//! into validate and commit, holding the ledger in between, so batches on
//! two ledgers can be applied together.
//!
//! [`InMemoryTokenLedger`] implements both traits for tests and embedding.

pub mod error;
pub mod memory;
pub mod ops;
pub mod traits;

pub use error::{TokenError, TokenResult};
pub use memory::InMemoryTokenLedger;
pub use ops::{LedgerOp, TokenMetadata};
pub use traits::{FungibleLedger, MintableLedger, PreparedBatch};
