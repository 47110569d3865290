use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::consts::{
    DEFAULT_ACK_TIMEOUT, DEFAULT_FRAME_SIZE, DEFAULT_WINDOW_SIZE, END_MARKER, HEADER_LEN,
};

/// Simulated fault rates, as percentages in `0..=100`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultConfig {
    /// Chance that a transmitted frame carries a checksum that will not verify.
    pub checksum_error_rate: u8,
    /// Chance that the receiver silently drops an ACK instead of sending it.
    pub ack_loss_rate: u8,
    /// Seed for the fault RNG. `None` seeds from the OS.
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    pub frame_size: usize,
    pub window_size: usize,
    pub ack_timeout_ms: u64,
    /// Pause between two transmission rounds of the same message.
    pub inter_send_delay_ms: u64,
    /// Give up after this many rounds. `None` retransmits forever.
    pub max_rounds: Option<u32>,
    pub faults: FaultConfig,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            frame_size: DEFAULT_FRAME_SIZE,
            window_size: DEFAULT_WINDOW_SIZE,
            ack_timeout_ms: DEFAULT_ACK_TIMEOUT.as_millis() as u64,
            inter_send_delay_ms: 0,
            max_rounds: None,
            faults: FaultConfig::default(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("frame size {size} leaves no room for payload (minimum {min})")]
    FrameTooSmall { size: usize, min: usize },
    #[error("window size must be at least 1")]
    EmptyWindow,
    #[error("{name} must be a percentage in 0..=100, got {value}")]
    RateOutOfRange { name: &'static str, value: u8 },
}

impl ProtocolConfig {
    /// Bytes of message data carried by one frame.
    pub fn payload_capacity(&self) -> usize {
        self.frame_size.saturating_sub(HEADER_LEN)
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    pub fn inter_send_delay(&self) -> Duration {
        Duration::from_millis(self.inter_send_delay_ms)
    }

    /// Read buffer large enough for one full window plus the final marker.
    pub fn receive_buffer_size(&self) -> usize {
        self.frame_size * self.window_size + END_MARKER.len()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let min = HEADER_LEN + END_MARKER.len() + 1;
        if self.frame_size < min {
            return Err(ConfigError::FrameTooSmall {
                size: self.frame_size,
                min,
            });
        }
        if self.window_size == 0 {
            return Err(ConfigError::EmptyWindow);
        }
        if self.faults.checksum_error_rate > 100 {
            return Err(ConfigError::RateOutOfRange {
                name: "checksum_error_rate",
                value: self.faults.checksum_error_rate,
            });
        }
        if self.faults.ack_loss_rate > 100 {
            return Err(ConfigError::RateOutOfRange {
                name: "ack_loss_rate",
                value: self.faults.ack_loss_rate,
            });
        }
        Ok(())
    }
}

/// Partial config as written in scenario files.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ConfigOverride {
    pub frame_size: Option<usize>,
    pub window_size: Option<usize>,
    pub ack_timeout_ms: Option<u64>,
    pub inter_send_delay_ms: Option<u64>,
    pub max_rounds: Option<u32>,
    pub checksum_error_rate: Option<u8>,
    pub ack_loss_rate: Option<u8>,
    pub seed: Option<u64>,
}

impl ConfigOverride {
    pub fn apply_to(&self, config: &mut ProtocolConfig) {
        if let Some(v) = self.frame_size {
            config.frame_size = v;
        }
        if let Some(v) = self.window_size {
            config.window_size = v;
        }
        if let Some(v) = self.ack_timeout_ms {
            config.ack_timeout_ms = v;
        }
        if let Some(v) = self.inter_send_delay_ms {
            config.inter_send_delay_ms = v;
        }
        if let Some(v) = self.max_rounds {
            config.max_rounds = Some(v);
        }
        if let Some(v) = self.checksum_error_rate {
            config.faults.checksum_error_rate = v;
        }
        if let Some(v) = self.ack_loss_rate {
            config.faults.ack_loss_rate = v;
        }
        if let Some(v) = self.seed {
            config.faults.seed = Some(v);
        }
    }
}
