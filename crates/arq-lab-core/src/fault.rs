use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::warn;

use arq_lab_abstract::checksum;
use arq_lab_abstract::{FaultConfig, Fragment, Frame};

/// Simulated checksum corruption (sender side) and ACK loss (receiver side).
///
/// Both gates are Bernoulli trials at the configured percentage. One-shot
/// faults scheduled by sequence number fire before the random gates are
/// consulted.
pub struct FaultInjector {
    checksum_error_rate: u8,
    ack_loss_rate: u8,
    rng: StdRng,
    corrupt_once: Vec<u32>,
    drop_ack_once: Vec<u32>,
}

impl FaultInjector {
    pub fn new(config: &FaultConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            checksum_error_rate: config.checksum_error_rate.min(100),
            ack_loss_rate: config.ack_loss_rate.min(100),
            rng,
            corrupt_once: Vec::new(),
            drop_ack_once: Vec::new(),
        }
    }

    /// Injector that never interferes.
    pub fn disabled() -> Self {
        Self::new(&FaultConfig {
            seed: Some(0),
            ..Default::default()
        })
    }

    /// Corrupt the checksum of the next transmission of frame `seq`.
    pub fn schedule_corruption(&mut self, seq: u32) {
        self.corrupt_once.push(seq);
    }

    /// Drop the next ACK that carries `ack`.
    pub fn schedule_ack_drop(&mut self, ack: u32) {
        self.drop_ack_once.push(ack);
    }

    fn roll(&mut self, rate: u8) -> bool {
        match rate {
            0 => false,
            100 => true,
            _ => self.rng.random_range(1..=100u8) <= rate,
        }
    }

    fn take_once(list: &mut Vec<u32>, value: u32) -> bool {
        match list.iter().position(|v| *v == value) {
            Some(pos) => {
                list.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Attach a checksum to `fragment`, possibly a deliberately wrong one.
    /// Returns the frame and whether it was corrupted.
    pub fn seal(&mut self, fragment: &Fragment) -> (Frame, bool) {
        let corrupt = Self::take_once(&mut self.corrupt_once, fragment.sequence)
            || self.roll(self.checksum_error_rate);
        if corrupt {
            warn!("[fault] corrupting checksum of frame {}", fragment.sequence);
            let frame = fragment.with_checksum(checksum::corrupted_digest(&fragment.payload));
            (frame, true)
        } else {
            (fragment.sealed(), false)
        }
    }

    /// Whether the ACK carrying `ack` should be suppressed.
    pub fn drop_ack(&mut self, ack: u32) -> bool {
        let drop = Self::take_once(&mut self.drop_ack_once, ack) || self.roll(self.ack_loss_rate);
        if drop {
            warn!("[fault] ACK {ack} lost");
        }
        drop
    }
}

impl Default for FaultInjector {
    fn default() -> Self {
        Self::disabled()
    }
}
