//! Sender-side sliding window for one outbound message.
//!
//! ```text
//!  0        base             base+W          len
//!  ├─ acked ─┼── in flight ───┼── not yet sent ─┤
//! ```
//!
//! Every round transmits the whole in-flight range (go-back-N). ACKs are
//! cumulative: the receiver only acknowledges in order, so the highest ACK
//! seen in a round is where the next round starts.

use bytes::{Bytes, BytesMut};
use tracing::debug;

use arq_lab_abstract::frame::{self, FrameError};
use arq_lab_abstract::Fragment;

use crate::fault::FaultInjector;

#[derive(Debug)]
pub struct SendWindow {
    fragments: Vec<Fragment>,
    base: usize,
    window_size: usize,
}

/// Result of folding one round of ACKs into the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Advance {
    pub from: usize,
    pub to: usize,
    pub highest_ack: Option<u32>,
}

impl Advance {
    pub fn progressed(&self) -> bool {
        self.to > self.from
    }
}

/// What one call to [`SendWindow::transmit`] wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Transmission {
    pub frames: usize,
    pub corrupted: usize,
}

impl SendWindow {
    pub fn new(fragments: Vec<Fragment>, window_size: usize) -> Self {
        Self {
            fragments,
            base: 0,
            window_size: window_size.max(1),
        }
    }

    pub fn for_message(
        message: Bytes,
        payload_capacity: usize,
        window_size: usize,
    ) -> Result<Self, FrameError> {
        Ok(Self::new(
            frame::fragment(message, payload_capacity)?,
            window_size,
        ))
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn base(&self) -> usize {
        self.base
    }

    pub fn is_complete(&self) -> bool {
        self.base >= self.fragments.len()
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// Fragments at indices `[base, min(base + W, len))`.
    pub fn in_flight(&self) -> &[Fragment] {
        let end = (self.base + self.window_size).min(self.fragments.len());
        &self.fragments[self.base..end]
    }

    /// Encode the in-flight range into `dst`, sealing each frame through `faults`.
    pub fn transmit(&self, faults: &mut FaultInjector, dst: &mut BytesMut) -> Transmission {
        let mut sent = Transmission::default();
        for fragment in self.in_flight() {
            let (frame, corrupted) = faults.seal(fragment);
            debug!(
                "sending frame {} ({} bytes{})",
                frame.sequence,
                frame.payload.len(),
                if frame.is_final { ", final" } else { "" }
            );
            frame.encode(dst);
            sent.frames += 1;
            if corrupted {
                sent.corrupted += 1;
            }
        }
        sent
    }

    /// Slide the window to the highest ACK observed this round.
    ///
    /// An empty round leaves the base where it is, so the same range is sent
    /// again. The base never moves backwards and never passes `len`.
    pub fn on_acks(&mut self, acks: &[u32]) -> Advance {
        let from = self.base;
        let highest_ack = acks.iter().copied().max();
        let target = highest_ack
            .map(|ack| (ack as usize).min(self.fragments.len()))
            .unwrap_or(from);
        self.base = self.base.max(target);
        Advance {
            from,
            to: self.base,
            highest_ack,
        }
    }

    /// Treat every remaining frame as acknowledged.
    pub fn acknowledge_all(&mut self) -> Advance {
        let from = self.base;
        self.base = self.fragments.len();
        Advance {
            from,
            to: self.base,
            highest_ack: None,
        }
    }
}
