use clap::Args;

use arq_lab_abstract::consts::{DEFAULT_ACK_TIMEOUT, DEFAULT_FRAME_SIZE, DEFAULT_WINDOW_SIZE};
use arq_lab_abstract::{ConfigError, FaultConfig, ProtocolConfig};

/// Link settings shared by the server and client binaries.
///
/// Both ends must agree on `--frame-size`. A reply window is taken in one
/// read, so the receiving side's `--window-size` must be at least the
/// sending side's. Request size is capped by a shared constant, not by
/// either window.
#[derive(Args, Debug, Clone)]
pub struct ProtocolArgs {
    /// Physical size of a non-final frame.
    #[arg(long, default_value_t = DEFAULT_FRAME_SIZE)]
    pub frame_size: usize,

    /// Frames in flight per transmission round.
    #[arg(long, default_value_t = DEFAULT_WINDOW_SIZE)]
    pub window_size: usize,

    /// How long to wait for a round's ACKs, in milliseconds.
    #[arg(long, default_value_t = DEFAULT_ACK_TIMEOUT.as_millis() as u64)]
    pub ack_timeout_ms: u64,

    #[arg(long, default_value_t = 0)]
    pub inter_send_delay_ms: u64,

    /// Fail a transfer after this many rounds instead of retrying forever.
    #[arg(long)]
    pub max_rounds: Option<u32>,

    /// Percentage of transmitted frames given a bad checksum.
    #[arg(long, default_value_t = 0)]
    pub checksum_error_rate: u8,

    /// Percentage of ACKs silently dropped.
    #[arg(long, default_value_t = 0)]
    pub ack_loss_rate: u8,

    /// Seed for the fault generator.
    #[arg(long)]
    pub seed: Option<u64>,
}

impl ProtocolArgs {
    pub fn to_config(&self) -> Result<ProtocolConfig, ConfigError> {
        let config = ProtocolConfig {
            frame_size: self.frame_size,
            window_size: self.window_size,
            ack_timeout_ms: self.ack_timeout_ms,
            inter_send_delay_ms: self.inter_send_delay_ms,
            max_rounds: self.max_rounds,
            faults: FaultConfig {
                checksum_error_rate: self.checksum_error_rate,
                ack_loss_rate: self.ack_loss_rate,
                seed: self.seed,
            },
        };
        config.validate()?;
        Ok(config)
    }
}
