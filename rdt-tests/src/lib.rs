//! Shared helpers for the integration tests
//!
//! [`Link`] wires a sender and a receiver session back to back: packets each
//! side emits are queued until the test decides what to do with them, so
//! loss, duplication and reordering can be staged by hand. The sender's
//! clock only moves when a test advances it or fires the timer.

use bytes::Bytes;
use rdt_protocol::{
    Channel, Clock, Deliver, MessageFraming, Packet, ProtocolConfig, ReceiverSession,
    RetransmitTimer, SenderSession,
};
use std::time::Duration;

/// Protocol configuration with the given packet and window size
pub fn config(packet_size: usize, window_size: usize, framing: MessageFraming) -> ProtocolConfig {
    ProtocolConfig {
        packet_size,
        window_size,
        framing,
        ..Default::default()
    }
}

/// Sequence (or ack) number carried by a wire packet
pub fn seq_of(wire: &[u8]) -> u32 {
    Packet::decode(wire)
        .map(|packet| packet.seq.as_raw())
        .unwrap_or_else(|err| panic!("undecodable packet: {}", err))
}

/// Concatenation of a message list
pub fn concat(messages: &[Bytes]) -> Vec<u8> {
    messages.iter().flat_map(|m| m.iter().copied()).collect()
}

/// Sender-side context capturing everything the session emits
#[derive(Debug, Default)]
pub struct SenderEnd {
    pub outbox: Vec<Bytes>,
    pub armed: Vec<Duration>,
    /// Manual clock reading
    pub now: Duration,
    /// Expiry of the most recently armed timer, until it fires
    pub deadline: Option<Duration>,
}

impl Channel for SenderEnd {
    fn send_packet(&mut self, packet: Bytes) {
        self.outbox.push(packet);
    }
}

impl RetransmitTimer for SenderEnd {
    fn arm(&mut self, after: Duration) {
        self.armed.push(after);
        self.deadline = Some(self.now + after);
    }
}

impl Clock for SenderEnd {
    fn now(&self) -> Duration {
        self.now
    }
}

/// Receiver-side context capturing acks and delivered messages
#[derive(Debug, Default)]
pub struct ReceiverEnd {
    pub outbox: Vec<Bytes>,
    pub delivered: Vec<Bytes>,
}

impl Channel for ReceiverEnd {
    fn send_packet(&mut self, packet: Bytes) {
        self.outbox.push(packet);
    }
}

impl Deliver for ReceiverEnd {
    fn deliver_message(&mut self, message: Bytes) {
        self.delivered.push(message);
    }
}

/// A sender and receiver joined by hand-operated queues
#[derive(Debug)]
pub struct Link {
    pub sender: SenderSession,
    pub receiver: ReceiverSession,
    pub tx: SenderEnd,
    pub rx: ReceiverEnd,
}

impl Link {
    /// Create both sessions from one configuration
    pub fn new(config: ProtocolConfig) -> Self {
        Link {
            sender: SenderSession::new(config.clone()).expect("valid sender config"),
            receiver: ReceiverSession::new(config).expect("valid receiver config"),
            tx: SenderEnd::default(),
            rx: ReceiverEnd::default(),
        }
    }

    /// Hand a message to the sender
    pub fn submit(&mut self, message: impl Into<Bytes>) {
        self.sender
            .on_message(&mut self.tx, message.into())
            .expect("message accepted");
    }

    /// Take the data packets the sender has emitted so far
    pub fn take_data(&mut self) -> Vec<Bytes> {
        std::mem::take(&mut self.tx.outbox)
    }

    /// Take the acks the receiver has emitted so far
    pub fn take_acks(&mut self) -> Vec<Bytes> {
        std::mem::take(&mut self.rx.outbox)
    }

    /// Present a data packet to the receiver
    pub fn deliver_data(&mut self, wire: &[u8]) {
        self.receiver.on_packet(&mut self.rx, wire);
    }

    /// Present an ack to the sender
    pub fn deliver_ack(&mut self, wire: &[u8]) {
        self.sender.on_ack(&mut self.tx, wire);
    }

    /// Move the sender's clock forward
    pub fn advance(&mut self, by: Duration) {
        self.tx.now += by;
    }

    /// Fire the sender's retransmission timer, first moving the clock up to
    /// its expiry
    pub fn timeout(&mut self) {
        if let Some(deadline) = self.tx.deadline.take() {
            self.tx.now = self.tx.now.max(deadline);
        }
        self.sender.on_timeout(&mut self.tx);
    }

    /// Carry every queued packet across a perfect link until both sides go quiet
    ///
    /// Returns the largest window occupancy seen along the way.
    pub fn pump(&mut self) -> usize {
        let mut max_in_flight = self.sender.in_flight();
        loop {
            let data = self.take_data();
            let acks = self.take_acks();
            if data.is_empty() && acks.is_empty() {
                return max_in_flight;
            }

            for packet in &data {
                self.deliver_data(packet);
            }
            for ack in &acks {
                self.deliver_ack(ack);
                max_in_flight = max_in_flight.max(self.sender.in_flight());
            }
        }
    }

    /// Messages the receiver has delivered
    pub fn delivered(&self) -> &[Bytes] {
        &self.rx.delivered
    }
}
