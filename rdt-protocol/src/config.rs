//! Session configuration
//!
//! Parameters are fixed when a session is constructed and never change for
//! its lifetime.

use crate::packet::{self, PacketError, DEFAULT_PACKET_SIZE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Default number of packets that may be outstanding at once
pub const DEFAULT_WINDOW_SIZE: usize = 10;

/// Default base retransmission interval in milliseconds
pub const DEFAULT_RETRANSMIT_TIMEOUT_MS: u64 = 300;

/// How the receiver treats arrivals that are not the next expected packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArqMode {
    /// Buffer out-of-order arrivals inside the window
    #[default]
    SelectiveRepeat,
    /// Accept only the next expected sequence number
    GoBackN,
}

/// How application messages are laid out on the byte stream
///
/// Only [`MessageFraming::Stream`] puts a message of exactly `P - 9` bytes
/// in one packet. Under the default [`MessageFraming::LengthPrefixed`] the
/// 4-byte prefix is packed ahead of the message, so the same message spills
/// its last 4 bytes into a second packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageFraming {
    /// Raw bytes; each in-order payload is handed upward as it arrives
    Stream,
    /// Each message is preceded by a 4-byte big-endian length; messages
    /// longer than `u32::MAX` bytes are rejected
    #[default]
    LengthPrefixed,
}

/// Protocol configuration shared by sender and receiver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Fixed wire packet size `P`
    #[serde(default = "default_packet_size")]
    pub packet_size: usize,
    /// Window size `W`
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Base retransmission interval `T` in milliseconds
    #[serde(default = "default_retransmit_timeout_ms")]
    pub retransmit_timeout_ms: u64,
    /// Receiver acceptance policy
    #[serde(default)]
    pub mode: ArqMode,
    /// Message layout on the stream
    #[serde(default)]
    pub framing: MessageFraming,
}

fn default_packet_size() -> usize {
    DEFAULT_PACKET_SIZE
}

fn default_window_size() -> usize {
    DEFAULT_WINDOW_SIZE
}

fn default_retransmit_timeout_ms() -> u64 {
    DEFAULT_RETRANSMIT_TIMEOUT_MS
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        ProtocolConfig {
            packet_size: default_packet_size(),
            window_size: default_window_size(),
            retransmit_timeout_ms: default_retransmit_timeout_ms(),
            mode: ArqMode::default(),
            framing: MessageFraming::default(),
        }
    }
}

impl ProtocolConfig {
    /// Check that the parameters describe a usable session
    pub fn validate(&self) -> Result<(), ConfigError> {
        packet::validate_packet_size(self.packet_size)?;

        if self.window_size == 0 {
            return Err(ConfigError::Invalid(
                "window_size must be at least 1".to_string(),
            ));
        }

        if self.retransmit_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "retransmit_timeout_ms must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Base retransmission interval
    pub fn retransmit_timeout(&self) -> Duration {
        Duration::from_millis(self.retransmit_timeout_ms)
    }

    /// Payload bytes that fit in one packet
    pub fn max_payload(&self) -> usize {
        packet::max_payload(self.packet_size)
    }

    /// Number of packets the receiver will hold ahead of the expected one
    pub fn receive_window(&self) -> usize {
        match self.mode {
            ArqMode::SelectiveRepeat => self.window_size,
            ArqMode::GoBackN => 1,
        }
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Packet size error: {0}")]
    PacketSize(#[from] PacketError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
