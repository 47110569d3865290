use serde::Serialize;

use arq_lab_abstract::{Command, Message, ProtocolConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Completed,
    /// Round cap reached with frames still unacknowledged.
    Stalled,
}

/// What happened to one message on the way across.
#[derive(Debug, Clone, Serialize)]
pub struct TransferReport {
    pub command: Command,
    pub frames: usize,
    pub rounds: u32,
    pub frames_sent: u32,
    pub corrupted: u32,
    pub acks_observed: u32,
    pub acks_dropped: u32,
    /// Rounds that ended with fewer ACKs than frames sent.
    pub timeouts: u32,
    /// Window base after each round, starting with the initial 0.
    pub base_trace: Vec<usize>,
    pub outcome: Outcome,
}

impl TransferReport {
    pub(crate) fn new(command: Command, frames: usize) -> Self {
        Self {
            command,
            frames,
            rounds: 0,
            frames_sent: 0,
            corrupted: 0,
            acks_observed: 0,
            acks_dropped: 0,
            timeouts: 0,
            base_trace: vec![0],
            outcome: Outcome::Completed,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub config: ProtocolConfig,
    pub transfers: Vec<TransferReport>,
    /// Messages the receiving side reassembled, in order.
    pub delivered: Vec<Message>,
}
