//! Application workload generation

use crate::config::ConfigError;
use bytes::Bytes;
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Messages the simulated application submits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    /// Number of messages to submit
    #[serde(default = "default_message_count")]
    pub message_count: usize,
    /// Smallest message size in bytes
    #[serde(default = "default_min_size")]
    pub min_size: usize,
    /// Largest message size in bytes
    #[serde(default = "default_max_size")]
    pub max_size: usize,
    /// Gap between consecutive submissions in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_message_count() -> usize {
    1000
}

fn default_min_size() -> usize {
    1
}

fn default_max_size() -> usize {
    256
}

fn default_interval_ms() -> u64 {
    100
}

impl Default for Workload {
    fn default() -> Self {
        Workload {
            message_count: default_message_count(),
            min_size: default_min_size(),
            max_size: default_max_size(),
            interval_ms: default_interval_ms(),
        }
    }
}

impl Workload {
    /// Check the size range
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_size > self.max_size {
            return Err(ConfigError::Invalid(format!(
                "min_size {} exceeds max_size {}",
                self.min_size, self.max_size
            )));
        }
        Ok(())
    }

    /// Gap between consecutive submissions
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Produce the messages, sizes and contents drawn from `rng`
    pub fn generate(&self, rng: &mut StdRng) -> Vec<Bytes> {
        (0..self.message_count)
            .map(|_| {
                let size = rng.gen_range(self.min_size..=self.max_size);
                let mut data = vec![0u8; size];
                rng.fill(&mut data[..]);
                Bytes::from(data)
            })
            .collect()
    }
}
