use tsl_types::Digest;

use crate::hasher::keccak256_parts;
use crate::leaf::AllowListEntry;

/// Proofs longer than this are rejected without hashing.
///
/// 128 levels covers any tree that could be built in memory.
pub const MAX_PROOF_LEN: usize = 128;

/// Ordered sibling digests from a leaf up to the root.
pub type Proof = Vec<Digest>;

/// Sorted binary Merkle tree over allow-list leaves.
///
/// Leaves are sorted (and exact duplicates dropped) before the tree is
/// built, so the root depends only on the set of entries. Pairs are hashed
/// smaller-digest-first, and a level with an odd number of nodes pairs its
/// last node with itself.
#[derive(Clone, Debug)]
pub struct AllowListTree {
    /// The root hash of the tree.
    root: Digest,
    /// All tree nodes, level by level. Level 0 = sorted leaves, last = root.
    levels: Vec<Vec<Digest>>,
}

impl AllowListTree {
    /// Build a tree from leaf digests in any order.
    ///
    /// An empty list produces a null root. A single leaf is its own root.
    pub fn from_leaves(mut leaves: Vec<Digest>) -> Self {
        leaves.sort_unstable();
        leaves.dedup();

        if leaves.is_empty() {
            return Self {
                root: Digest::null(),
                levels: vec![],
            };
        }

        let mut levels: Vec<Vec<Digest>> = vec![leaves];
        while let Some(current) = levels.last().filter(|level| level.len() > 1) {
            let next: Vec<Digest> = current
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => hash_pair(left, right),
                    [odd] => hash_pair(odd, odd),
                    _ => unreachable!("chunks(2) yields one or two nodes"),
                })
                .collect();
            levels.push(next);
        }

        let root = levels.last().and_then(|top| top.first()).copied().unwrap_or_else(Digest::null);
        Self { root, levels }
    }

    /// Build a tree from allow-list entries.
    pub fn from_entries(entries: &[AllowListEntry]) -> Self {
        Self::from_leaves(entries.iter().map(AllowListEntry::leaf).collect())
    }

    /// The root hash of the tree.
    pub fn root(&self) -> Digest {
        self.root
    }

    /// The sorted, de-duplicated leaves.
    pub fn leaves(&self) -> &[Digest] {
        self.levels.first().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of distinct leaves.
    pub fn leaf_count(&self) -> usize {
        self.leaves().len()
    }

    /// Number of hashing levels above the leaves (the proof length).
    pub fn depth(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }

    /// Returns `true` if `leaf` is one of the tree's leaves.
    pub fn contains(&self, leaf: &Digest) -> bool {
        self.leaves().binary_search(leaf).is_ok()
    }

    /// Inclusion proof for the leaf at `index` in sorted order.
    pub fn proof(&self, index: usize) -> Option<Proof> {
        if index >= self.leaf_count() {
            return None;
        }

        let mut path = Vec::with_capacity(self.depth());
        let mut idx = index;
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling_idx = idx ^ 1;
            // Odd level: the last node is paired with itself.
            let sibling = level.get(sibling_idx).unwrap_or(&level[idx]);
            path.push(*sibling);
            idx /= 2;
        }
        Some(path)
    }

    /// Inclusion proof for a specific leaf digest.
    pub fn proof_for(&self, leaf: &Digest) -> Option<Proof> {
        let index = self.leaves().binary_search(leaf).ok()?;
        self.proof(index)
    }
}

/// Hash two sibling nodes, smaller digest first.
pub fn hash_pair(a: &Digest, b: &Digest) -> Digest {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    keccak256_parts(&[low.as_bytes(), high.as_bytes()])
}

/// Recompute the root from `leaf` and `proof` and compare it with `root`.
///
/// Any malformed input (wrong length, wrong siblings, null root) simply
/// yields `false`.
pub fn verify(root: &Digest, leaf: &Digest, proof: &[Digest]) -> bool {
    if root.is_null() || proof.len() > MAX_PROOF_LEN {
        return false;
    }
    let computed = proof
        .iter()
        .fold(*leaf, |running, sibling| hash_pair(&running, sibling));
    computed == *root
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use tsl_types::Address;

    use super::*;
    use crate::hasher::keccak256;

    fn leaf(seed: u8) -> Digest {
        keccak256(&[seed])
    }

    #[test]
    fn empty_tree_has_null_root() {
        let tree = AllowListTree::from_leaves(vec![]);
        assert!(tree.root().is_null());
        assert_eq!(tree.leaf_count(), 0);
        assert!(tree.proof(0).is_none());
        assert!(!verify(&tree.root(), &leaf(1), &[]));
    }

    #[test]
    fn single_leaf_is_root() {
        let l = leaf(1);
        let tree = AllowListTree::from_leaves(vec![l]);
        assert_eq!(tree.root(), l);
        assert_eq!(tree.proof(0).unwrap(), Vec::<Digest>::new());
        assert!(verify(&tree.root(), &l, &[]));
    }

    #[test]
    fn proof_verifies_for_all_leaves() {
        let leaves: Vec<Digest> = (0..7).map(leaf).collect();
        let tree = AllowListTree::from_leaves(leaves.clone());

        for l in &leaves {
            let proof = tree.proof_for(l).expect("proof should exist");
            assert!(verify(&tree.root(), l, &proof), "proof for {l:?} should verify");
        }
    }

    #[test]
    fn root_is_independent_of_input_order() {
        let leaves: Vec<Digest> = (0..10).map(leaf).collect();
        let mut reversed = leaves.clone();
        reversed.reverse();
        assert_eq!(
            AllowListTree::from_leaves(leaves).root(),
            AllowListTree::from_leaves(reversed).root()
        );
    }

    #[test]
    fn duplicate_leaves_are_collapsed() {
        let tree = AllowListTree::from_leaves(vec![leaf(1), leaf(2), leaf(1)]);
        assert_eq!(tree.leaf_count(), 2);
        assert_eq!(tree.root(), AllowListTree::from_leaves(vec![leaf(2), leaf(1)]).root());
    }

    #[test]
    fn odd_level_duplicates_last_node() {
        let mut leaves: Vec<Digest> = (0..3).map(leaf).collect();
        leaves.sort();
        let tree = AllowListTree::from_leaves(leaves.clone());
        let expected = hash_pair(
            &hash_pair(&leaves[0], &leaves[1]),
            &hash_pair(&leaves[2], &leaves[2]),
        );
        assert_eq!(tree.root(), expected);
        assert_eq!(tree.proof(2).unwrap()[0], leaves[2]);
    }

    #[test]
    fn power_of_two_leaves() {
        let tree = AllowListTree::from_leaves((0..8).map(leaf).collect());
        assert_eq!(tree.depth(), 3);
        for i in 0..8 {
            let proof = tree.proof(i).unwrap();
            assert_eq!(proof.len(), 3);
            assert!(verify(&tree.root(), &tree.leaves()[i], &proof));
        }
    }

    #[test]
    fn two_entry_root_matches_sorted_pair_keccak() {
        let entries = [
            AllowListEntry::parse("0x70997970C51812dc3A010C7d01b50e0d17dc79C8", "210000", false, 18)
                .unwrap(),
            AllowListEntry::parse("0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC", "420000", false, 18)
                .unwrap(),
        ];
        let tree = AllowListTree::from_entries(&entries);
        assert_eq!(
            tree.root().to_hex(),
            "79dbe84d83bd98626bd5c0135e4375b6cb16513048b247a7282605d9e7ea6340"
        );
        let proof = tree.proof_for(&entries[0].leaf()).unwrap();
        assert_eq!(proof, vec![entries[1].leaf()]);
    }

    #[test]
    fn hash_pair_is_symmetric() {
        assert_eq!(hash_pair(&leaf(1), &leaf(2)), hash_pair(&leaf(2), &leaf(1)));
    }

    #[test]
    fn proof_out_of_bounds_returns_none() {
        let tree = AllowListTree::from_leaves(vec![leaf(1), leaf(2)]);
        assert!(tree.proof(5).is_none());
        assert!(tree.proof_for(&leaf(9)).is_none());
    }

    #[test]
    fn tampered_inputs_fail_verification() {
        let tree = AllowListTree::from_leaves((0..4).map(leaf).collect());
        let target = tree.leaves()[0];
        let proof = tree.proof(0).unwrap();

        assert!(!verify(&tree.root(), &leaf(99), &proof));
        assert!(!verify(&leaf(42), &target, &proof));
        assert!(!verify(&tree.root(), &target, &proof[..1]));

        let mut extended = proof.clone();
        extended.push(leaf(7));
        assert!(!verify(&tree.root(), &target, &extended));

        let mut swapped = proof;
        swapped[0] = leaf(50);
        assert!(!verify(&tree.root(), &target, &swapped));
    }

    #[test]
    fn oversized_proof_is_rejected() {
        let tree = AllowListTree::from_leaves(vec![leaf(1), leaf(2)]);
        let proof = vec![leaf(3); MAX_PROOF_LEN + 1];
        assert!(!verify(&tree.root(), &leaf(1), &proof));
    }

    #[test]
    fn entries_build_the_same_tree_as_their_leaves() {
        let entries: Vec<AllowListEntry> = (0..5u8)
            .map(|i| AllowListEntry::new(Address::derive(&[i]), u128::from(i) * 1000, i % 2 == 0))
            .collect();
        let from_entries = AllowListTree::from_entries(&entries);
        let from_leaves =
            AllowListTree::from_leaves(entries.iter().map(AllowListEntry::leaf).collect());
        assert_eq!(from_entries.root(), from_leaves.root());
    }

    proptest! {
        #[test]
        fn members_verify_and_outsiders_do_not(
            seeds in proptest::collection::btree_set(any::<u32>(), 1..40),
            outsider in any::<u64>(),
        ) {
            let leaves: Vec<Digest> = seeds
                .iter()
                .map(|s| keccak256(&s.to_be_bytes()))
                .collect();
            let tree = AllowListTree::from_leaves(leaves.clone());

            for l in &leaves {
                let proof = tree.proof_for(l).unwrap();
                prop_assert!(verify(&tree.root(), l, &proof));
            }

            // 8-byte preimages never collide with the 4-byte member preimages.
            let foreign = keccak256(&outsider.to_be_bytes());
            for l in &leaves {
                let proof = tree.proof_for(l).unwrap();
                prop_assert!(!verify(&tree.root(), &foreign, &proof));
            }
        }
    }
}
