//! Receiver side: accept frames strictly in order, rebuild the message.

use bytes::{Bytes, BytesMut};
use tracing::{debug, warn};

use arq_lab_abstract::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted { sequence: u32, is_final: bool },
    /// Checksum did not match the payload.
    Corrupt { sequence: u32 },
    /// Already accepted earlier.
    Duplicate { sequence: u32 },
    /// Ahead of the next expected sequence.
    OutOfOrder { sequence: u32 },
    /// Block could not be parsed as a frame at all.
    Malformed,
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted { .. })
    }
}

/// Acceptance cursor and reassembly buffer for one inbound message.
///
/// Every observed frame should be answered with [`Reassembler::ack`]: the
/// frame's own sequence when it was accepted, otherwise a repeat of the last
/// good one.
#[derive(Debug, Default)]
pub struct Reassembler {
    accepted: u32,
    last_good: u32,
    buffer: BytesMut,
    complete: bool,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accepted_count(&self) -> u32 {
        self.accepted
    }

    pub fn expected(&self) -> u32 {
        self.accepted + 1
    }

    /// Sequence to echo in the ACK for the frame just processed.
    pub fn ack(&self) -> u32 {
        self.last_good
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_bytes(self) -> Bytes {
        self.buffer.freeze()
    }

    pub fn on_frame(&mut self, frame: &Frame) -> Verdict {
        let sequence = frame.sequence;
        if !frame.is_intact() {
            warn!("checksum mismatch on frame {sequence}, re-ACK {}", self.last_good);
            return Verdict::Corrupt { sequence };
        }
        if self.complete || sequence <= self.accepted {
            debug!("duplicate frame {sequence}, re-ACK {}", self.last_good);
            return Verdict::Duplicate { sequence };
        }
        if sequence != self.expected() {
            debug!(
                "frame {sequence} out of order (expected {}), re-ACK {}",
                self.expected(),
                self.last_good
            );
            return Verdict::OutOfOrder { sequence };
        }

        self.buffer.extend_from_slice(&frame.payload);
        self.accepted += 1;
        self.last_good = sequence;
        self.complete = frame.is_final;
        debug!(
            "accepted frame {sequence} ({} bytes{})",
            frame.payload.len(),
            if frame.is_final { ", final" } else { "" }
        );
        Verdict::Accepted {
            sequence,
            is_final: frame.is_final,
        }
    }

    /// Decode one raw block and process it. Unparseable blocks count as corrupt.
    pub fn on_block(&mut self, block: &[u8]) -> Verdict {
        match Frame::decode(block) {
            Ok(frame) => self.on_frame(&frame),
            Err(err) => {
                warn!("dropping malformed frame: {err}");
                Verdict::Malformed
            }
        }
    }
}
