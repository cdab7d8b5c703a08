//! Fault-injecting packet channel
//!
//! One [`FaultyChannel`] models one direction of the link. Every packet that
//! enters it is subjected first to any scripted fault aimed at its index,
//! then to the random fault model: loss, corruption of a single bit,
//! duplication and extra delay (which reorders it behind later packets).

use crate::config::ConfigError;
use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::trace;

/// Random fault model applied to every packet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelModel {
    /// Probability a packet is dropped
    #[serde(default)]
    pub loss_rate: f64,
    /// Probability a delivered packet has one bit flipped
    #[serde(default)]
    pub corruption_rate: f64,
    /// Probability a packet is delivered twice
    #[serde(default)]
    pub duplication_rate: f64,
    /// Probability a packet is held back long enough to be overtaken
    #[serde(default)]
    pub reorder_rate: f64,
    /// Base one-way latency in milliseconds
    #[serde(default = "default_latency_ms")]
    pub latency_ms: u64,
    /// Uniform extra latency in milliseconds
    #[serde(default)]
    pub jitter_ms: u64,
}

fn default_latency_ms() -> u64 {
    10
}

impl Default for ChannelModel {
    fn default() -> Self {
        ChannelModel::perfect()
    }
}

impl ChannelModel {
    /// A channel with fixed latency and no faults
    pub fn perfect() -> Self {
        ChannelModel {
            loss_rate: 0.0,
            corruption_rate: 0.0,
            duplication_rate: 0.0,
            reorder_rate: 0.0,
            latency_ms: default_latency_ms(),
            jitter_ms: 0,
        }
    }

    /// Check that every rate is a probability
    pub fn validate(&self) -> Result<(), ConfigError> {
        let rates = [
            ("loss_rate", self.loss_rate),
            ("corruption_rate", self.corruption_rate),
            ("duplication_rate", self.duplication_rate),
            ("reorder_rate", self.reorder_rate),
        ];

        for (name, rate) in rates {
            if !(0.0..=1.0).contains(&rate) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be within [0, 1], got {}",
                    name, rate
                )));
            }
        }

        if self.loss_rate >= 1.0 {
            return Err(ConfigError::Invalid(
                "loss_rate of 1 never delivers anything".to_string(),
            ));
        }

        Ok(())
    }

    fn base_delay(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }
}

/// Deterministic fault aimed at one packet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptedFault {
    /// Zero-based index of the packet entering this channel
    pub packet: usize,
    /// What happens to it
    pub action: FaultAction,
}

/// Scripted fault kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FaultAction {
    /// Never deliver the packet
    Drop,
    /// Flip one bit of the packet
    Corrupt,
    /// Deliver a second copy `delay_ms` after the first
    Duplicate { delay_ms: u64 },
    /// Hold the packet back by an extra `delay_ms`
    Delay { delay_ms: u64 },
}

/// A packet on its way through the channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transit {
    /// Time from entering the channel to arriving at the peer
    pub delay: Duration,
    /// Bytes as they will arrive
    pub packet: Bytes,
}

/// Channel counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Packets handed to the channel
    pub packets_in: u64,
    /// Packets handed to the peer (duplicates included)
    pub packets_out: u64,
    pub dropped: u64,
    pub corrupted: u64,
    pub duplicated: u64,
    pub reordered: u64,
}

/// One direction of the simulated link
#[derive(Debug)]
pub struct FaultyChannel {
    model: ChannelModel,
    script: Vec<ScriptedFault>,
    rng: StdRng,
    stats: ChannelStats,
}

impl FaultyChannel {
    /// Create a channel with its own seeded random stream
    pub fn new(model: ChannelModel, script: Vec<ScriptedFault>, seed: u64) -> Self {
        FaultyChannel {
            model,
            script,
            rng: StdRng::seed_from_u64(seed),
            stats: ChannelStats::default(),
        }
    }

    /// Decide the fate of a packet, returning every copy that will arrive
    pub fn transmit(&mut self, packet: Bytes) -> Vec<Transit> {
        let index = self.stats.packets_in as usize;
        self.stats.packets_in += 1;

        let scripted = self
            .script
            .iter()
            .find(|fault| fault.packet == index)
            .map(|fault| fault.action);

        let mut copies = match scripted {
            Some(FaultAction::Drop) => {
                trace!(index, "scripted drop");
                self.stats.dropped += 1;
                return Vec::new();
            }
            Some(FaultAction::Corrupt) => {
                self.stats.corrupted += 1;
                let flipped = self.flip_bit(&packet);
                vec![self.transit(flipped)]
            }
            Some(FaultAction::Duplicate { delay_ms }) => {
                self.stats.duplicated += 1;
                let first = self.transit(packet.clone());
                let second = Transit {
                    delay: first.delay + Duration::from_millis(delay_ms),
                    packet,
                };
                vec![first, second]
            }
            Some(FaultAction::Delay { delay_ms }) => {
                self.stats.reordered += 1;
                let mut transit = self.transit(packet);
                transit.delay += Duration::from_millis(delay_ms);
                vec![transit]
            }
            None => match self.random_fate(packet) {
                Some(copies) => copies,
                None => return Vec::new(),
            },
        };

        self.stats.packets_out += copies.len() as u64;
        copies.sort_by_key(|transit| transit.delay);
        copies
    }

    fn random_fate(&mut self, packet: Bytes) -> Option<Vec<Transit>> {
        if self.rng.gen_bool(self.model.loss_rate) {
            self.stats.dropped += 1;
            return None;
        }

        let copies = if self.rng.gen_bool(self.model.duplication_rate) {
            self.stats.duplicated += 1;
            2
        } else {
            1
        };

        let mut transits = Vec::with_capacity(copies);
        for _ in 0..copies {
            let bytes = if self.rng.gen_bool(self.model.corruption_rate) {
                self.stats.corrupted += 1;
                self.flip_bit(&packet)
            } else {
                packet.clone()
            };

            let mut transit = self.transit(bytes);
            if self.rng.gen_bool(self.model.reorder_rate) {
                self.stats.reordered += 1;
                let hold = 2 * (self.model.latency_ms + self.model.jitter_ms) + 1;
                transit.delay += Duration::from_millis(self.rng.gen_range(1..=hold));
            }
            transits.push(transit);
        }

        Some(transits)
    }

    fn transit(&mut self, packet: Bytes) -> Transit {
        let jitter = if self.model.jitter_ms > 0 {
            Duration::from_millis(self.rng.gen_range(0..=self.model.jitter_ms))
        } else {
            Duration::ZERO
        };

        Transit {
            delay: self.model.base_delay() + jitter,
            packet,
        }
    }

    fn flip_bit(&mut self, packet: &Bytes) -> Bytes {
        let mut bytes = packet.to_vec();
        if !bytes.is_empty() {
            let byte = self.rng.gen_range(0..bytes.len());
            let bit = self.rng.gen_range(0..8);
            bytes[byte] ^= 1 << bit;
        }
        Bytes::from(bytes)
    }

    /// Channel counters
    pub fn stats(&self) -> &ChannelStats {
        &self.stats
    }
}
