//! Simulation driver
//!
//! Wires a [`SenderSession`] and a [`ReceiverSession`] together through two
//! [`FaultyChannel`]s and a [`Scheduler`], feeds the workload in, and runs
//! until everything submitted has been acknowledged.

use crate::channel::{ChannelStats, FaultyChannel};
use crate::clock::SimTime;
use crate::config::{ConfigError, SimConfig};
use crate::scheduler::{Event, Scheduler, Side};
use bytes::Bytes;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rdt_protocol::packet::peek_seq;
use rdt_protocol::{
    Channel, Clock, Deliver, MessageFraming, PacketError, ReceiverSession, ReceiverStats,
    RetransmitTimer, SenderSession, SenderStats, SeqNumber,
};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Seed perturbation for the reverse channel so both directions differ
const REVERSE_SEED_SALT: u64 = 0x9E37_79B9_7F4A_7C15;

/// Seed perturbation for the workload generator
const WORKLOAD_SEED_SALT: u64 = 0xC2B2_AE3D_27D4_EB4F;

/// Simulation errors
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Run stalled at {at}: {delivered} of {submitted} bytes delivered")]
    Stalled {
        at: SimTime,
        delivered: u64,
        submitted: u64,
    },

    #[error("Delivered data does not match submitted data: {0}")]
    Mismatch(String),

    #[error("Message rejected: {0}")]
    Packet(#[from] PacketError),
}

/// A data packet handed to the channel by the sender
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transmission {
    /// When it entered the channel
    pub at: SimTime,
    /// Sequence number it carried
    pub seq: SeqNumber,
}

/// Outcome of a completed run
#[derive(Debug, Clone)]
pub struct SimReport {
    /// Framing the sessions used
    pub framing: MessageFraming,
    /// Messages in submission order
    pub submitted: Vec<Bytes>,
    /// Messages in delivery order
    pub delivered: Vec<Bytes>,
    /// Every data packet transmission, retransmissions included
    pub transmissions: Vec<Transmission>,
    /// Largest window occupancy observed
    pub max_in_flight: usize,
    /// Virtual time at which the sender became idle
    pub finished_at: SimTime,
    pub sender: SenderStats,
    pub receiver: ReceiverStats,
    /// Sender-to-receiver channel
    pub forward: ChannelStats,
    /// Receiver-to-sender channel
    pub reverse: ChannelStats,
}

impl SimReport {
    /// Total bytes submitted by the application
    pub fn submitted_bytes(&self) -> u64 {
        self.submitted.iter().map(|m| m.len() as u64).sum()
    }

    /// Total bytes handed to the application
    pub fn delivered_bytes(&self) -> u64 {
        self.delivered.iter().map(|m| m.len() as u64).sum()
    }

    /// Check that delivery reproduced the submission exactly
    ///
    /// The concatenation of delivered bytes must equal the concatenation of
    /// submitted bytes. With length-prefixed framing the message list itself
    /// must match as well.
    pub fn verify(&self) -> Result<(), SimError> {
        let sent: Vec<u8> = self.submitted.iter().flat_map(|m| m.iter().copied()).collect();
        let got: Vec<u8> = self.delivered.iter().flat_map(|m| m.iter().copied()).collect();

        if sent.len() != got.len() {
            return Err(SimError::Mismatch(format!(
                "{} bytes submitted, {} delivered",
                sent.len(),
                got.len()
            )));
        }

        if let Some(pos) = sent.iter().zip(&got).position(|(a, b)| a != b) {
            return Err(SimError::Mismatch(format!("first differing byte at {}", pos)));
        }

        if self.framing == MessageFraming::LengthPrefixed && self.submitted != self.delivered {
            return Err(SimError::Mismatch(format!(
                "{} messages submitted, {} delivered with different boundaries",
                self.submitted.len(),
                self.delivered.len()
            )));
        }

        Ok(())
    }

    /// Transmissions of one sequence number
    pub fn transmissions_of(&self, seq: SeqNumber) -> Vec<SimTime> {
        self.transmissions
            .iter()
            .filter(|t| t.seq == seq)
            .map(|t| t.at)
            .collect()
    }
}

/// Sender-side view of the simulated world
struct SenderPort<'a> {
    scheduler: &'a mut Scheduler,
    channel: &'a mut FaultyChannel,
    transmissions: &'a mut Vec<Transmission>,
}

impl Channel for SenderPort<'_> {
    fn send_packet(&mut self, packet: Bytes) {
        if let Some(seq) = peek_seq(&packet) {
            self.transmissions.push(Transmission {
                at: self.scheduler.now(),
                seq,
            });
        }

        for transit in self.channel.transmit(packet) {
            self.scheduler.schedule(
                transit.delay,
                Event::PacketArrival {
                    to: Side::Receiver,
                    packet: transit.packet,
                },
            );
        }
    }
}

impl Clock for SenderPort<'_> {
    fn now(&self) -> Duration {
        self.scheduler.now().since_start()
    }
}

impl RetransmitTimer for SenderPort<'_> {
    fn arm(&mut self, after: Duration) {
        self.scheduler.arm_timer(Side::Sender, after);
    }
}

/// Receiver-side view of the simulated world
struct ReceiverPort<'a> {
    scheduler: &'a mut Scheduler,
    channel: &'a mut FaultyChannel,
    delivered: &'a mut Vec<Bytes>,
}

impl Channel for ReceiverPort<'_> {
    fn send_packet(&mut self, packet: Bytes) {
        for transit in self.channel.transmit(packet) {
            self.scheduler.schedule(
                transit.delay,
                Event::PacketArrival {
                    to: Side::Sender,
                    packet: transit.packet,
                },
            );
        }
    }
}

impl Deliver for ReceiverPort<'_> {
    fn deliver_message(&mut self, message: Bytes) {
        self.delivered.push(message);
    }
}

/// A configured, not yet executed run
#[derive(Debug)]
pub struct Simulation {
    config: SimConfig,
    messages: Vec<Bytes>,
}

impl Simulation {
    /// Create a run whose messages come from the configured workload
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        config.validate()?;
        let mut rng = StdRng::seed_from_u64(config.seed ^ WORKLOAD_SEED_SALT);
        let messages = config.workload.generate(&mut rng);
        Ok(Simulation { config, messages })
    }

    /// Create a run that submits exactly `messages`
    pub fn with_messages(config: SimConfig, messages: Vec<Bytes>) -> Result<Self, SimError> {
        config.validate()?;
        Ok(Simulation { config, messages })
    }

    /// Messages this run will submit
    pub fn messages(&self) -> &[Bytes] {
        &self.messages
    }

    /// Execute the run to completion
    pub fn run(self) -> Result<SimReport, SimError> {
        let Simulation { config, messages } = self;

        let mut sender = SenderSession::new(config.protocol.clone()).map_err(ConfigError::from)?;
        let mut receiver =
            ReceiverSession::new(config.protocol.clone()).map_err(ConfigError::from)?;

        let mut forward = FaultyChannel::new(
            config.channel.clone(),
            config.forward_faults.clone(),
            config.seed,
        );
        let mut reverse = FaultyChannel::new(
            config.channel.clone(),
            config.reverse_faults.clone(),
            config.seed ^ REVERSE_SEED_SALT,
        );

        let mut scheduler = Scheduler::new();
        let interval = config.workload.interval();
        let mut at = SimTime::ZERO;
        for message in &messages {
            scheduler.schedule_at(at, Event::MessageArrival(message.clone()));
            at = at + interval;
        }

        let submitted_bytes: u64 = messages.iter().map(|m| m.len() as u64).sum();
        let limit = SimTime::ZERO + config.time_limit();
        let mut remaining_arrivals = messages.len();
        let mut delivered = Vec::new();
        let mut transmissions = Vec::new();
        let mut max_in_flight = 0usize;

        info!(
            messages = messages.len(),
            bytes = submitted_bytes,
            mode = ?config.protocol.mode,
            framing = ?config.protocol.framing,
            "simulation starting"
        );

        while let Some((now, event)) = scheduler.pop() {
            if now > limit {
                let delivered_bytes = delivered.iter().map(|m: &Bytes| m.len() as u64).sum();
                warn!(%now, "time limit reached");
                return Err(SimError::Stalled {
                    at: now,
                    delivered: delivered_bytes,
                    submitted: submitted_bytes,
                });
            }

            match event {
                Event::MessageArrival(message) => {
                    remaining_arrivals -= 1;
                    let mut port = SenderPort {
                        scheduler: &mut scheduler,
                        channel: &mut forward,
                        transmissions: &mut transmissions,
                    };
                    sender.on_message(&mut port, message)?;
                }
                Event::PacketArrival {
                    to: Side::Receiver,
                    packet,
                } => {
                    let mut port = ReceiverPort {
                        scheduler: &mut scheduler,
                        channel: &mut reverse,
                        delivered: &mut delivered,
                    };
                    receiver.on_packet(&mut port, &packet);
                }
                Event::PacketArrival {
                    to: Side::Sender,
                    packet,
                } => {
                    let mut port = SenderPort {
                        scheduler: &mut scheduler,
                        channel: &mut forward,
                        transmissions: &mut transmissions,
                    };
                    sender.on_ack(&mut port, &packet);
                }
                Event::Timeout {
                    side: Side::Sender, ..
                } => {
                    debug!(%now, in_flight = sender.in_flight(), "sender timeout");
                    let mut port = SenderPort {
                        scheduler: &mut scheduler,
                        channel: &mut forward,
                        transmissions: &mut transmissions,
                    };
                    sender.on_timeout(&mut port);
                }
                Event::Timeout {
                    side: Side::Receiver, ..
                } => {
                    warn!(%now, "receiver has no timer; ignoring expiry");
                }
            }

            max_in_flight = max_in_flight.max(sender.in_flight());

            if remaining_arrivals == 0 && sender.is_idle() {
                let report = SimReport {
                    framing: config.protocol.framing,
                    submitted: messages,
                    delivered,
                    transmissions,
                    max_in_flight,
                    finished_at: now,
                    sender: sender.stats().clone(),
                    receiver: receiver.stats().clone(),
                    forward: forward.stats().clone(),
                    reverse: reverse.stats().clone(),
                };
                info!(
                    at = %now,
                    delivered = report.delivered.len(),
                    retransmitted = report.sender.packets_retransmitted,
                    "simulation finished"
                );
                return Ok(report);
            }
        }

        // Only reachable with nothing submitted and nothing scheduled
        Ok(SimReport {
            framing: config.protocol.framing,
            submitted: messages,
            delivered,
            transmissions,
            max_in_flight,
            finished_at: scheduler.now(),
            sender: sender.stats().clone(),
            receiver: receiver.stats().clone(),
            forward: forward.stats().clone(),
            reverse: reverse.stats().clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ChannelModel, FaultAction, ScriptedFault};
    use crate::workload::Workload;
    use rdt_protocol::ProtocolConfig;

    fn small_config() -> SimConfig {
        SimConfig {
            protocol: ProtocolConfig {
                packet_size: 20,
                window_size: 4,
                retransmit_timeout_ms: 100,
                ..Default::default()
            },
            workload: Workload {
                message_count: 20,
                min_size: 0,
                max_size: 60,
                interval_ms: 5,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_clean_run_delivers_everything() {
        let report = Simulation::new(small_config()).unwrap().run().unwrap();

        report.verify().unwrap();
        assert_eq!(report.sender.packets_retransmitted, 0);
        assert!(report.max_in_flight <= 4);
    }

    #[test]
    fn test_lossy_run_recovers() {
        let mut config = small_config();
        config.channel = ChannelModel {
            loss_rate: 0.2,
            corruption_rate: 0.1,
            duplication_rate: 0.1,
            reorder_rate: 0.2,
            latency_ms: 10,
            jitter_ms: 5,
        };

        let report = Simulation::new(config).unwrap().run().unwrap();

        report.verify().unwrap();
        assert!(report.sender.packets_retransmitted > 0);
    }

    #[test]
    fn test_empty_workload() {
        let mut config = small_config();
        config.workload.message_count = 0;

        let report = Simulation::new(config).unwrap().run().unwrap();
        assert!(report.delivered.is_empty());
        assert_eq!(report.finished_at, SimTime::ZERO);
    }

    #[test]
    fn test_dropped_ack_recovered_by_retransmit() {
        let mut config = small_config();
        config.reverse_faults.push(ScriptedFault {
            packet: 0,
            action: FaultAction::Drop,
        });

        let messages = vec![Bytes::from_static(b"lonely")];
        let report = Simulation::with_messages(config, messages)
            .unwrap()
            .run()
            .unwrap();

        report.verify().unwrap();
        assert_eq!(report.transmissions_of(SeqNumber::new(1)).len(), 2);
        assert_eq!(report.receiver.packets_duplicate, 1);
        assert_eq!(report.receiver.messages_delivered, 1);
    }

    #[test]
    fn test_stall_detected() {
        let mut config = small_config();
        config.time_limit_secs = 1;
        config.channel.loss_rate = 0.999;

        let result = Simulation::new(config).unwrap().run();
        assert!(matches!(result, Err(SimError::Stalled { .. })));
    }

    #[test]
    fn test_verify_detects_mismatch() {
        let report = SimReport {
            framing: MessageFraming::Stream,
            submitted: vec![Bytes::from_static(b"abc")],
            delivered: vec![Bytes::from_static(b"abd")],
            transmissions: Vec::new(),
            max_in_flight: 0,
            finished_at: SimTime::ZERO,
            sender: SenderStats::default(),
            receiver: ReceiverStats::default(),
            forward: ChannelStats::default(),
            reverse: ChannelStats::default(),
        };
        assert!(matches!(report.verify(), Err(SimError::Mismatch(_))));
    }
}
