//! Simulation configuration and TOML file support

use crate::channel::{ChannelModel, ScriptedFault};
use crate::workload::Workload;
use rdt_protocol::ProtocolConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Complete description of one simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Seed for every random stream in the run
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Virtual time after which an unfinished run is reported as stalled
    #[serde(default = "default_time_limit_secs")]
    pub time_limit_secs: u64,
    /// Parameters shared by both sessions
    #[serde(default)]
    pub protocol: ProtocolConfig,
    /// Random fault model applied in both directions
    #[serde(default)]
    pub channel: ChannelModel,
    /// Application behaviour
    #[serde(default)]
    pub workload: Workload,
    /// Scripted faults on sender-to-receiver packets
    #[serde(default)]
    pub forward_faults: Vec<ScriptedFault>,
    /// Scripted faults on receiver-to-sender packets
    #[serde(default)]
    pub reverse_faults: Vec<ScriptedFault>,
}

fn default_seed() -> u64 {
    1
}

fn default_time_limit_secs() -> u64 {
    3600
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            seed: default_seed(),
            time_limit_secs: default_time_limit_secs(),
            protocol: ProtocolConfig::default(),
            channel: ChannelModel::default(),
            workload: Workload::default(),
            forward_faults: Vec::new(),
            reverse_faults: Vec::new(),
        }
    }
}

impl SimConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: SimConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Render configuration as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check every section
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.protocol.validate()?;
        self.channel.validate()?;
        self.workload.validate()?;

        if self.time_limit_secs == 0 {
            return Err(ConfigError::Invalid(
                "time_limit_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Virtual time limit as Duration
    pub fn time_limit(&self) -> Duration {
        Duration::from_secs(self.time_limit_secs)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Protocol configuration error: {0}")]
    Protocol(#[from] rdt_protocol::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
