//! Allow-list commitments for the Token Sale Ledger.
//!
//! Provides Keccak-256 leaf hashing over the packed `(address, uint256, bool)`
//! encoding, a sorted binary Merkle tree, and membership proof verification.
//! Leaves and roots match those produced by EVM allow-list tooling.
//!
//! Proofs carry no left/right markers: each step hashes the smaller digest
//! first, so a proof only depends on the set of entries, never on the order
//! they were supplied in.

pub mod commitment;
pub mod error;
pub mod hasher;
pub mod leaf;
pub mod merkle;

pub use commitment::{AllowListCommitment, EntryProof};
pub use error::AllowListError;
pub use hasher::{keccak256, keccak256_parts};
pub use leaf::{build_leaf, AllowListEntry};
pub use merkle::{hash_pair, verify, AllowListTree, Proof, MAX_PROOF_LEN};
