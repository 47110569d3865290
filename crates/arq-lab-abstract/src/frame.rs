//! Frame codec.
//!
//! ```text
//! [sequence: SEQ_WIDTH ASCII digits][checksum: CHECKSUM_LEN][payload][END_MARKER, final frame only]
//! ```
//!
//! Non-final frames are exactly `frame_size` bytes. The final frame may be
//! shorter, or longer by at most `END_MARKER.len()`.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::checksum::{self, Checksum};
use crate::consts::{CHECKSUM_LEN, END_MARKER, HEADER_LEN, MAX_SEQUENCE, SEQ_WIDTH};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame block of {len} bytes is shorter than the {HEADER_LEN}-byte header")]
    Short { len: usize },
    #[error("sequence field {0:?} is not a decimal number")]
    BadSequence(String),
    #[error("message needs {count} frames but sequence numbers stop at {MAX_SEQUENCE}")]
    SequenceOverflow { count: usize },
    #[error("payload capacity must be at least one byte")]
    ZeroCapacity,
}

/// One slice of a message, before a checksum has been attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub sequence: u32,
    pub payload: Bytes,
    pub is_final: bool,
}

impl Fragment {
    pub fn with_checksum(&self, checksum: Checksum) -> Frame {
        Frame {
            sequence: self.sequence,
            checksum,
            payload: self.payload.clone(),
            is_final: self.is_final,
        }
    }

    /// Frame with a checksum that matches the payload.
    pub fn sealed(&self) -> Frame {
        self.with_checksum(checksum::digest(&self.payload))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub sequence: u32,
    pub checksum: Checksum,
    pub payload: Bytes,
    pub is_final: bool,
}

impl Frame {
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.payload.len() + if self.is_final { END_MARKER.len() } else { 0 }
    }

    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(self.encoded_len());
        dst.put_slice(format_sequence(self.sequence).as_bytes());
        dst.put_slice(&self.checksum);
        dst.put_slice(&self.payload);
        if self.is_final {
            dst.put_slice(END_MARKER);
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        buf.freeze()
    }

    pub fn decode(block: &[u8]) -> Result<Frame, FrameError> {
        if block.len() < HEADER_LEN {
            return Err(FrameError::Short { len: block.len() });
        }
        let is_final =
            block.len() >= HEADER_LEN + END_MARKER.len() && block.ends_with(END_MARKER);
        let body_end = if is_final {
            block.len() - END_MARKER.len()
        } else {
            block.len()
        };

        let sequence = parse_sequence(&block[..SEQ_WIDTH])?;
        let mut checksum = [0u8; CHECKSUM_LEN];
        checksum.copy_from_slice(&block[SEQ_WIDTH..HEADER_LEN]);

        Ok(Frame {
            sequence,
            checksum,
            payload: Bytes::copy_from_slice(&block[HEADER_LEN..body_end]),
            is_final,
        })
    }

    pub fn is_intact(&self) -> bool {
        checksum::verify(&self.checksum, &self.payload)
    }
}

pub fn format_sequence(sequence: u32) -> String {
    format!("{:0width$}", sequence, width = SEQ_WIDTH)
}

pub fn parse_sequence(field: &[u8]) -> Result<u32, FrameError> {
    if field.is_empty() || !field.iter().all(u8::is_ascii_digit) {
        return Err(FrameError::BadSequence(
            String::from_utf8_lossy(field).into_owned(),
        ));
    }
    field
        .iter()
        .try_fold(0u32, |acc, &d| {
            acc.checked_mul(10)?.checked_add(u32::from(d - b'0'))
        })
        .ok_or_else(|| FrameError::BadSequence(String::from_utf8_lossy(field).into_owned()))
}

/// Cut a message into ordered fragments of at most `capacity` bytes.
///
/// An empty message still produces one (empty) final fragment.
pub fn fragment(message: Bytes, capacity: usize) -> Result<Vec<Fragment>, FrameError> {
    if capacity == 0 {
        return Err(FrameError::ZeroCapacity);
    }
    let count = message.len().div_ceil(capacity).max(1);
    if count > MAX_SEQUENCE as usize {
        return Err(FrameError::SequenceOverflow { count });
    }

    let fragments = (0..count)
        .map(|i| {
            let start = i * capacity;
            let end = (start + capacity).min(message.len());
            Fragment {
                sequence: i as u32 + 1,
                payload: message.slice(start..end),
                is_final: i + 1 == count,
            }
        })
        .collect();
    Ok(fragments)
}

/// Split one raw stream read into frame-sized blocks.
///
/// Assumes the read starts on a frame boundary. A trailing piece no longer
/// than `END_MARKER` is the overflow of a full final frame and is folded back
/// into the block before it.
pub fn split_frames(buf: &[u8], frame_size: usize) -> Vec<&[u8]> {
    let mut blocks: Vec<&[u8]> = Vec::with_capacity(buf.len() / frame_size.max(1) + 1);
    let mut start = 0;
    while start < buf.len() {
        let end = (start + frame_size).min(buf.len());
        let rest = buf.len() - end;
        if rest > 0 && rest <= END_MARKER.len() {
            blocks.push(&buf[start..]);
            break;
        }
        blocks.push(&buf[start..end]);
        start = end;
    }
    blocks
}
