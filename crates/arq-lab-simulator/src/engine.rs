//! In-memory rendition of the link: both roles run in one thread, frames
//! and ACKs still pass through their wire encodings.

use bytes::BytesMut;
use tracing::{debug, info, warn};

use arq_lab_abstract::frame::{FrameError, split_frames};
use arq_lab_abstract::{FaultConfig, Message, ProtocolConfig, ack};
use arq_lab_core::{FaultInjector, Reassembler, SendWindow};

use crate::trace::{Outcome, SimulationReport, TransferReport};

/// Rounds allowed per transfer when the config sets no `max_rounds`.
pub const DEFAULT_ROUND_CAP: u32 = 1000;

/// Seed used when the config leaves it unset, so runs are repeatable.
const DEFAULT_SEED: u64 = 42;

pub struct Simulator {
    config: ProtocolConfig,
    // Frame corruption happens on the sending side, ACK loss on the receiving side.
    sender_faults: FaultInjector,
    receiver_faults: FaultInjector,
    transfers: Vec<TransferReport>,
    delivered: Vec<Message>,
}

impl Simulator {
    pub fn new(config: ProtocolConfig) -> Self {
        let seed = config.faults.seed.unwrap_or(DEFAULT_SEED);
        let seeded = |seed| FaultConfig {
            seed: Some(seed),
            ..config.faults.clone()
        };
        Self {
            sender_faults: FaultInjector::new(&seeded(seed)),
            receiver_faults: FaultInjector::new(&seeded(seed.wrapping_add(1))),
            config,
            transfers: Vec::new(),
            delivered: Vec::new(),
        }
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Corrupt the next transmission of frame `seq`, in whichever transfer comes next.
    pub fn add_corrupt_seq_once(&mut self, seq: u32) {
        self.sender_faults.schedule_corruption(seq);
    }

    /// Drop the next ACK carrying `ack`.
    pub fn add_drop_ack_once(&mut self, ack: u32) {
        self.receiver_faults.schedule_ack_drop(ack);
    }

    pub fn transfers(&self) -> &[TransferReport] {
        &self.transfers
    }

    pub fn delivered(&self) -> &[Message] {
        &self.delivered
    }

    fn round_cap(&self) -> u32 {
        self.config.max_rounds.unwrap_or(DEFAULT_ROUND_CAP)
    }

    /// Carry one message from sender to receiver, round by round.
    pub fn transfer(&mut self, message: &Message) -> Result<&TransferReport, FrameError> {
        let mut window = SendWindow::for_message(
            message.encode(),
            self.config.payload_capacity(),
            self.config.window_size,
        )?;
        let mut receiver = Reassembler::new();
        let mut report = TransferReport::new(message.command, window.len());
        info!(
            "transfer {}: {} message in {} frames",
            self.transfers.len(),
            message.command,
            window.len()
        );

        let mut wire = BytesMut::new();
        let mut return_path = BytesMut::new();
        while !window.is_complete() {
            if report.rounds >= self.round_cap() {
                warn!(
                    "stalled after {} rounds at base {} of {}",
                    report.rounds,
                    window.base(),
                    window.len()
                );
                report.outcome = Outcome::Stalled;
                break;
            }
            report.rounds += 1;

            wire.clear();
            let sent = window.transmit(&mut self.sender_faults, &mut wire);
            report.frames_sent += sent.frames as u32;
            report.corrupted += sent.corrupted as u32;

            return_path.clear();
            // a receiver that already has the whole message is no longer reading
            if !receiver.is_complete() {
                for block in split_frames(&wire, self.config.frame_size) {
                    receiver.on_block(block);
                    let ack = receiver.ack();
                    if self.receiver_faults.drop_ack(ack) {
                        report.acks_dropped += 1;
                    } else {
                        return_path.extend_from_slice(&ack::encode(ack));
                    }
                    if receiver.is_complete() {
                        break;
                    }
                }
            }

            let acks = ack::parse_all(&return_path);
            report.acks_observed += acks.len() as u32;
            if acks.len() < sent.frames {
                report.timeouts += 1;
            }
            let step = window.on_acks(&acks);
            debug!(
                "round {}: sent {} frames, ACKs {acks:?}, base {} -> {}",
                report.rounds, sent.frames, step.from, step.to
            );
            report.base_trace.push(window.base());
        }

        if receiver.is_complete() {
            match Message::decode(receiver.buffer()) {
                Ok(delivered) => self.delivered.push(delivered),
                Err(err) => warn!("reassembled message does not decode: {err}"),
            }
        }
        info!(
            "transfer {} {:?} after {} rounds ({} frames sent)",
            self.transfers.len(),
            report.outcome,
            report.rounds,
            report.frames_sent
        );

        self.transfers.push(report);
        Ok(&self.transfers[self.transfers.len() - 1])
    }

    pub fn export_report(&self) -> SimulationReport {
        SimulationReport {
            config: self.config.clone(),
            transfers: self.transfers.clone(),
            delivered: self.delivered.clone(),
        }
    }
}
