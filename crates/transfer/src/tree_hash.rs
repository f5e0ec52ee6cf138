//! Linear and tree SHA-256 checksums of a chunked payload.
//!
//! The tree hash is a bottom-up binary reduction over per-chunk digests:
//! adjacent digests are paired left to right and each pair is replaced by
//! `SHA-256(left || right)`; an odd digest at the end of a level moves up
//! unchanged. Order matters.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// A raw SHA-256 digest.
pub type Sha256Digest = [u8; 32];

/// Hashes `data` with SHA-256.
pub fn sha256(data: &[u8]) -> Sha256Digest {
    Sha256::digest(data).into()
}

/// Reduces ordered chunk digests to their tree hash.
///
/// Returns `None` for an empty list. A single digest is returned as is.
pub fn tree_hash(leaves: &[Sha256Digest]) -> Option<Sha256Digest> {
    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = reduce_level(&level);
    }
    level.pop()
}

fn reduce_level(level: &[Sha256Digest]) -> Vec<Sha256Digest> {
    level
        .chunks(2)
        .map(|pair| match pair {
            [left, right] => {
                let mut hasher = Sha256::new();
                hasher.update(left);
                hasher.update(right);
                hasher.finalize().into()
            }
            [leftover] => *leftover,
            _ => unreachable!("chunks(2) yields one or two items"),
        })
        .collect()
}

/// Hex-encoded checksums handed to the completion call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveChecksums {
    pub linear_hash: String,
    pub tree_hash: String,
}

/// Accumulates both checksums while chunks stream past, in order.
#[derive(Clone, Default)]
pub struct ChecksumAccumulator {
    linear: Sha256,
    leaves: Vec<Sha256Digest>,
    bytes: u64,
}

impl std::fmt::Debug for ChecksumAccumulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChecksumAccumulator")
            .field("chunks", &self.leaves.len())
            .field("bytes", &self.bytes)
            .finish()
    }
}

impl ChecksumAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the next chunk and returns its digest.
    pub fn push(&mut self, data: &[u8]) -> Sha256Digest {
        self.linear.update(data);
        self.bytes += data.len() as u64;
        let leaf = sha256(data);
        self.leaves.push(leaf);
        leaf
    }

    /// Adds the next chunk when its digest is already known.
    pub fn push_hashed(&mut self, data: &[u8], digest: Sha256Digest) {
        self.linear.update(data);
        self.bytes += data.len() as u64;
        self.leaves.push(digest);
    }

    /// Number of chunks seen so far.
    pub fn chunk_count(&self) -> usize {
        self.leaves.len()
    }

    /// Number of bytes seen so far.
    pub fn byte_count(&self) -> u64 {
        self.bytes
    }

    /// Finalizes both checksums.
    ///
    /// With no chunks there is no tree to reduce; the digest of empty input
    /// is reported for both.
    pub fn finish(self) -> ArchiveChecksums {
        let linear: Sha256Digest = self.linear.finalize().into();
        let tree = tree_hash(&self.leaves).unwrap_or(linear);
        ArchiveChecksums {
            linear_hash: hex::encode(linear),
            tree_hash: hex::encode(tree),
        }
    }
}
