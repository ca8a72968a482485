use sha3::{Digest as _, Keccak256};
use tsl_types::Digest;

/// Keccak-256 of `data`.
///
/// No tag or length prefix is added, so hashing a packed encoding gives the
/// same digest as `keccak256(abi.encodePacked(...))` on an EVM chain.
pub fn keccak256(data: &[u8]) -> Digest {
    keccak256_parts(&[data])
}

/// Keccak-256 of the concatenation of `parts`.
pub fn keccak256_parts(parts: &[&[u8]]) -> Digest {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    let hash: [u8; 32] = hasher.finalize().into();
    Digest::from_hash(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_matches_known_vector() {
        assert_eq!(
            keccak256(b"").to_hex(),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn parts_are_concatenated() {
        let joined = keccak256(b"leftright");
        let parts = keccak256_parts(&[b"left", b"right"]);
        assert_eq!(joined, parts);
    }

    #[test]
    fn differs_from_sha3() {
        // SHA3-256("") uses different padding.
        assert_ne!(
            keccak256(b"").to_hex(),
            "a7ffc6f8bf1ed76651c14756a061d662f580ff4de43b49fa82d80a4b80f8434a"
        );
    }
}
