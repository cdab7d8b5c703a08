//! Discrete-event simulator for the reliable data transfer protocol
//!
//! Drives a sender and a receiver session over a pair of fault-injecting
//! channels in virtual time. Runs are fully determined by their
//! [`SimConfig`], seed included.

pub mod channel;
pub mod clock;
pub mod config;
pub mod report;
pub mod scheduler;
pub mod simulation;
pub mod workload;

pub use channel::{ChannelModel, ChannelStats, FaultAction, FaultyChannel, ScriptedFault, Transit};
pub use clock::SimTime;
pub use config::{ConfigError, SimConfig};
pub use report::{display_report, format_bytes, format_duration};
pub use scheduler::{Event, Scheduler, Side};
pub use simulation::{SimError, SimReport, Simulation, Transmission};
pub use workload::Workload;
