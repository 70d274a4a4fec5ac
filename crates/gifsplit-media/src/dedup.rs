//! Hash-based frame deduplication.
//!
//! Collapses runs of byte-identical frames (a static video segment) by
//! comparing SHA-256 digests of the encoded frame bytes against the
//! immediately preceding kept frame. Strictly stronger than the perceptual
//! similarity score; near-duplicates are never merged here.

use sha2::{Digest, Sha256};

/// Outcome of a duplicate check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupCheck {
    /// True iff the frame is a bit-for-bit duplicate of the previous kept one
    pub skip: bool,
    /// Content hash of the checked frame, to carry into the next check
    pub hash: String,
}

/// Hex-encoded SHA-256 of the frame's encoded bytes.
pub fn frame_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

/// Check whether a frame duplicates the previous kept frame.
pub fn should_skip(bytes: &[u8], previous_hash: Option<&str>) -> DedupCheck {
    let hash = frame_hash(bytes);
    let skip = previous_hash.is_some_and(|prev| prev == hash);
    DedupCheck { skip, hash }
}
