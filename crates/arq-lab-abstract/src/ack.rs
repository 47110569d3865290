//! Acknowledgment tokens sent from receiver to sender.
//!
//! A token is `ACK` followed by a `SEQ_WIDTH`-digit sequence number. Tokens
//! are not wrapped in frames; the sender splits each read into `ACK_LEN`
//! chunks.

use crate::consts::{ACK_LEN, ACK_PREFIX, SEQ_WIDTH};
use crate::frame::{format_sequence, parse_sequence};

pub fn encode(sequence: u32) -> [u8; ACK_LEN] {
    let mut token = [0u8; ACK_LEN];
    token[..ACK_PREFIX.len()].copy_from_slice(ACK_PREFIX);
    token[ACK_PREFIX.len()..].copy_from_slice(format_sequence(sequence).as_bytes());
    token
}

/// Sequence carried by one token, or `None` if the chunk is not an ACK.
pub fn decode(chunk: &[u8]) -> Option<u32> {
    if chunk.len() != ACK_LEN || !chunk.starts_with(ACK_PREFIX) {
        return None;
    }
    parse_sequence(&chunk[ACK_PREFIX.len()..ACK_PREFIX.len() + SEQ_WIDTH]).ok()
}

/// Whether `buf` could still grow into a whole token: shorter than
/// `ACK_LEN` and matching it so far.
pub fn is_partial(buf: &[u8]) -> bool {
    buf.len() < ACK_LEN
        && buf.iter().enumerate().all(|(i, b)| match ACK_PREFIX.get(i) {
            Some(p) => b == p,
            None => b.is_ascii_digit(),
        })
}

/// Every ACK sequence found in one raw read, in arrival order.
pub fn parse_all(buf: &[u8]) -> Vec<u32> {
    buf.chunks(ACK_LEN).filter_map(decode).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_layout() {
        assert_eq!(&encode(4), b"ACK00004");
        assert_eq!(&encode(0), b"ACK00000");
        assert_eq!(decode(b"ACK00042"), Some(42));
    }

    #[test]
    fn ignores_non_ack_chunks() {
        assert_eq!(decode(b"CHAThiya"), None);
        assert_eq!(decode(b"ACK0001"), None);
        assert_eq!(decode(b"ACK0001x"), None);
    }

    #[test]
    fn partial_tokens() {
        assert!(is_partial(b""));
        assert!(is_partial(b"AC"));
        assert!(is_partial(b"ACK000"));
        assert!(!is_partial(b"ACK00001"));
        assert!(!is_partial(b"CHAT"));
        assert!(!is_partial(b"ACKx"));
    }

    #[test]
    fn coalesced_read() {
        let mut buf = Vec::new();
        for seq in [1, 2, 2, 4] {
            buf.extend_from_slice(&encode(seq));
        }
        buf.extend_from_slice(b"EXIT");
        assert_eq!(parse_all(&buf), vec![1, 2, 2, 4]);
    }
}
