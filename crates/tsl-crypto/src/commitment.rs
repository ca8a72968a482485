use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tsl_types::{Address, Digest};

use crate::error::AllowListError;
use crate::leaf::AllowListEntry;
use crate::merkle::{verify, AllowListTree, Proof};

/// A published allow-list entry together with its membership proof.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryProof {
    pub entry: AllowListEntry,
    pub leaf: Digest,
    pub proof: Proof,
}

/// The off-chain output of building an allow-list: the root handed to the
/// sale and one proof per participant, handed to the participants.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowListCommitment {
    pub root: Digest,
    pub proofs: Vec<EntryProof>,
}

impl AllowListCommitment {
    /// Commit to `entries`.
    ///
    /// Each address may appear only once; proofs are listed in the order the
    /// entries were given.
    pub fn build(entries: &[AllowListEntry]) -> Result<Self, AllowListError> {
        let mut seen = HashSet::with_capacity(entries.len());
        for entry in entries {
            if !seen.insert(entry.address) {
                return Err(AllowListError::DuplicateAddress(entry.address));
            }
        }

        let tree = AllowListTree::from_entries(entries);
        let proofs = entries
            .iter()
            .map(|entry| {
                let leaf = entry.leaf();
                // Every entry's leaf was inserted above.
                let proof = tree.proof_for(&leaf).unwrap_or_default();
                EntryProof {
                    entry: entry.clone(),
                    leaf,
                    proof,
                }
            })
            .collect();

        Ok(Self {
            root: tree.root(),
            proofs,
        })
    }

    /// The proof published for `address`, if it is on the list.
    pub fn proof_for(&self, address: &Address) -> Option<&EntryProof> {
        self.proofs.iter().find(|p| p.entry.address == *address)
    }

    /// Returns `true` if every listed proof verifies against the root.
    pub fn verify_all(&self) -> bool {
        self.proofs
            .iter()
            .all(|p| p.leaf == p.entry.leaf() && verify(&self.root, &p.leaf, &p.proof))
    }

    /// Pretty-printed JSON for distribution.
    pub fn to_json(&self) -> Result<String, AllowListError> {
        serde_json::to_string_pretty(self).map_err(|e| AllowListError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, AllowListError> {
        serde_json::from_str(json).map_err(|e| AllowListError::Serialization(e.to_string()))
    }
}
