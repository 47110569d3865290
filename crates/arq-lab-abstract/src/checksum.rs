//! Payload digest carried in every frame.

use sha2::{Digest, Sha256};

use crate::consts::CHECKSUM_LEN;

pub type Checksum = [u8; CHECKSUM_LEN];

/// Byte appended to the payload when a checksum is deliberately corrupted.
const CORRUPTION_BYTE: u8 = b'1';

/// Fixed-size digest of `data`: the leading `CHECKSUM_LEN` bytes of its SHA-256.
pub fn digest(data: &[u8]) -> Checksum {
    let hash = Sha256::digest(data);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&hash[..CHECKSUM_LEN]);
    out
}

/// Digest of `data` with one extra byte appended. Never equal to `digest(data)`
/// short of a hash collision.
pub fn corrupted_digest(data: &[u8]) -> Checksum {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.update([CORRUPTION_BYTE]);
    let hash = hasher.finalize();
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&hash[..CHECKSUM_LEN]);
    out
}

pub fn verify(checksum: &Checksum, data: &[u8]) -> bool {
    digest(data) == *checksum
}
