//! Receiver session
//!
//! Validates arriving packets, holds out-of-order arrivals in a reorder
//! buffer keyed by offset from the expected sequence number, delivers
//! payloads upward strictly in sequence order and answers with cumulative
//! acks carrying the last contiguously delivered sequence number.
//!
//! ```text
//!   expected                       expected + window
//!      │                                  │
//!  ────┼───┬───┬───┬───┬──────────────────┼────▶ seq space
//!      │ 0 │ 1 │ 2 │ … │  slots           │ dropped beyond
//!  re-ack below
//! ```
//!
//! In [`ArqMode::GoBackN`] the window is a single slot, so anything other
//! than the expected packet is discarded.
//!
//! [`ArqMode::GoBackN`]: crate::config::ArqMode::GoBackN

use crate::checksum;
use crate::config::{ConfigError, ProtocolConfig};
use crate::context::ReceiverContext;
use crate::framer::Reassembler;
use crate::packet::Packet;
use crate::sequence::SeqNumber;
use crate::stats::ReceiverStats;
use bytes::Bytes;
use std::collections::VecDeque;
use tracing::{debug, trace};

/// Receiving half of a reliable session
#[derive(Debug)]
pub struct ReceiverSession {
    config: ProtocolConfig,
    /// Lowest sequence number not yet delivered
    expected: SeqNumber,
    /// Slot `i` holds the payload for `expected + i`
    slots: VecDeque<Option<Bytes>>,
    reassembler: Reassembler,
    stats: ReceiverStats,
}

impl ReceiverSession {
    /// Create a receiver session
    pub fn new(config: ProtocolConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        debug!(
            packet_size = config.packet_size,
            receive_window = config.receive_window(),
            mode = ?config.mode,
            "receiver initialized"
        );

        let slots = std::iter::repeat(None)
            .take(config.receive_window())
            .collect();

        Ok(ReceiverSession {
            expected: SeqNumber::INITIAL,
            slots,
            reassembler: Reassembler::new(config.framing),
            stats: ReceiverStats::default(),
            config,
        })
    }

    /// Handle a packet from the channel
    pub fn on_packet<C>(&mut self, ctx: &mut C, wire: &[u8])
    where
        C: ReceiverContext + ?Sized,
    {
        self.stats.packets_received += 1;

        if !checksum::verify(wire) {
            debug!("dropping corrupted packet");
            self.stats.packets_corrupted += 1;
            return;
        }

        let packet = match Packet::decode(wire) {
            Ok(packet) => packet,
            Err(err) => {
                debug!(%err, "dropping malformed packet");
                self.stats.packets_corrupted += 1;
                return;
            }
        };

        if packet.payload.is_empty() {
            debug!(seq = %packet.seq, "dropping packet without payload");
            return;
        }

        let seq = packet.seq;
        if seq < self.expected {
            trace!(%seq, expected = %self.expected, "stale duplicate");
            self.stats.packets_duplicate += 1;
            self.send_ack(ctx);
            return;
        }

        let offset = self.expected.distance_to(seq) as usize;
        if offset >= self.slots.len() {
            debug!(%seq, expected = %self.expected, "outside receive window");
            self.stats.packets_out_of_window += 1;
            return;
        }

        let slot = &mut self.slots[offset];
        if slot.is_some() {
            trace!(%seq, "already buffered");
            self.stats.packets_duplicate += 1;
        } else {
            *slot = Some(packet.payload);
            if offset > 0 {
                trace!(%seq, offset, "buffered out of order");
                self.stats.packets_buffered += 1;
            }
        }

        self.deliver_ready(ctx);
        self.send_ack(ctx);
    }

    /// Deliver every payload at the head of the buffer, advancing `expected`
    fn deliver_ready<C>(&mut self, ctx: &mut C)
    where
        C: ReceiverContext + ?Sized,
    {
        while let Some(Some(_)) = self.slots.front() {
            let payload = self.slots.pop_front().flatten().unwrap_or_default();
            self.slots.push_back(None);
            self.expected.increment();

            for message in self.reassembler.push(payload) {
                self.stats.messages_delivered += 1;
                self.stats.bytes_delivered += message.len() as u64;
                ctx.deliver_message(message);
            }
        }
    }

    fn send_ack<C>(&mut self, ctx: &mut C)
    where
        C: ReceiverContext + ?Sized,
    {
        let ack = self.ack_number();
        trace!(%ack, "ack");
        ctx.send_packet(Packet::ack(ack).write(self.config.packet_size));
        self.stats.acks_sent += 1;
    }

    /// Last contiguously delivered sequence number
    pub fn ack_number(&self) -> SeqNumber {
        self.expected.prev()
    }

    /// Next sequence number to deliver
    pub fn expected_seq(&self) -> SeqNumber {
        self.expected
    }

    /// Number of packets held for later delivery
    pub fn buffered(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Session configuration
    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Session counters
    pub fn stats(&self) -> &ReceiverStats {
        &self.stats
    }
}
