//! Plain reimplementation of Bitcoin's Merkle branch construction, used so
//! [`crate::bitcoin::rpc::RpcBitcoinChain`] can derive a proof directly from
//! a block's transaction list rather than parsing Bitcoin Core's compact
//! `gettxoutproof` wire format.

use bitcoin::hashes::{sha256d, Hash as _};

use crate::bitcoin::hash::BitcoinHash;

/// Computes the Merkle branch (sibling hashes from leaf to root) for the
/// leaf at `position`, along with the resulting root.
///
/// Follows the Bitcoin convention of duplicating the last leaf at each
/// level when that level has an odd count.
///
/// Panics if `leaves` is empty or `position` is out of bounds; both are
/// programmer errors at the call site; a transaction's position within
/// its own block's transaction list is never out of range.
pub fn branch(leaves: &[BitcoinHash], position: usize) -> (Vec<BitcoinHash>, BitcoinHash) {
    assert!(!leaves.is_empty());
    assert!(position < leaves.len());

    let mut level: Vec<[u8; 32]> = leaves.iter().map(BitcoinHash::natural_bytes).collect();
    let mut index = position;
    let mut path = Vec::new();

    while level.len() > 1 {
        if level.len() % 2 == 1 {
            level.push(*level.last().unwrap());
        }

        let sibling_index = if index % 2 == 0 { index + 1 } else { index - 1 };
        path.push(BitcoinHash::from_natural_bytes(level[sibling_index]));

        let mut next_level = Vec::with_capacity(level.len() / 2);
        for pair in level.chunks_exact(2) {
            let mut buf = [0u8; 64];
            buf[..32].copy_from_slice(&pair[0]);
            buf[32..].copy_from_slice(&pair[1]);
            next_level.push(sha256d::Hash::hash(&buf).to_byte_array());
        }

        level = next_level;
        index /= 2;
    }

    (path, BitcoinHash::from_natural_bytes(level[0]))
}

/// Recomputes the Merkle root a `branch` and `position` attest to, by
/// folding the leaf hash up through the recorded siblings. Used by tests
/// to check [`branch`]'s output against an independently-computed root.
pub fn root_from_branch(leaf: BitcoinHash, branch: &[BitcoinHash], mut position: usize) -> BitcoinHash {
    let mut current = leaf.natural_bytes();
    for sibling in branch {
        let mut buf = [0u8; 64];
        if position % 2 == 0 {
            buf[..32].copy_from_slice(&current);
            buf[32..].copy_from_slice(&sibling.natural_bytes());
        } else {
            buf[..32].copy_from_slice(&sibling.natural_bytes());
            buf[32..].copy_from_slice(&current);
        }
        current = sha256d::Hash::hash(&buf).to_byte_array();
        position /= 2;
    }
    BitcoinHash::from_natural_bytes(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(seed: u8) -> BitcoinHash {
        BitcoinHash::from_natural_bytes([seed; 32])
    }

    #[test]
    fn single_leaf_has_empty_branch_and_is_its_own_root() {
        let leaves = [leaf(1)];
        let (path, root) = branch(&leaves, 0);
        assert!(path.is_empty());
        assert_eq!(root, leaves[0]);
    }

    #[test]
    fn branch_reconstructs_the_root_for_every_position() {
        let leaves = [leaf(1), leaf(2), leaf(3), leaf(4), leaf(5)];
        for position in 0..leaves.len() {
            let (path, root) = branch(&leaves, position);
            assert_eq!(root_from_branch(leaves[position], &path, position), root);
        }
    }

    #[test]
    fn odd_leaf_count_duplicates_last_leaf() {
        let leaves = [leaf(1), leaf(2), leaf(3)];
        let (path_last, root) = branch(&leaves, 2);
        // the duplicated sibling of the last leaf is itself
        assert_eq!(path_last[0], leaves[2]);
        assert_eq!(root_from_branch(leaves[2], &path_last, 2), root);
    }
}
