//! Message packing and reassembly
//!
//! The sender packs queued messages densely into packet payloads: a payload
//! may hold the tail of one message and the head of the next, and a large
//! message spans as many packets as it needs. The receiver side undoes this
//! with a [`Reassembler`].

use crate::config::{MessageFraming, ProtocolConfig};
use crate::packet::{Packet, PacketError};
use crate::sequence::SeqNumber;
use bytes::{Buf, Bytes, BytesMut};
use std::collections::VecDeque;

/// Size of the length prefix written before each message in
/// [`MessageFraming::LengthPrefixed`] mode
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Encode a message length as its big-endian prefix
pub fn length_prefix(len: usize) -> Result<[u8; LENGTH_PREFIX_SIZE], PacketError> {
    u32::try_from(len)
        .map(u32::to_be_bytes)
        .map_err(|_| PacketError::MessageTooLarge {
            size: len,
            max: u32::MAX as usize,
        })
}

/// Sender-side packetizer
///
/// Owns the pending-message queue and the sequence counter.
#[derive(Debug)]
pub struct Framer {
    /// Queued byte runs, oldest first; the head may be partially consumed
    pending: VecDeque<Bytes>,
    /// Total bytes across `pending`
    pending_bytes: usize,
    /// Sequence number for the next packet produced
    next_seq: SeqNumber,
    /// Fixed wire packet size
    packet_size: usize,
    /// Payload capacity per packet
    max_payload: usize,
    framing: MessageFraming,
}

impl Framer {
    /// Create a framer for an already validated configuration
    pub fn new(config: &ProtocolConfig) -> Self {
        Framer {
            pending: VecDeque::new(),
            pending_bytes: 0,
            next_seq: SeqNumber::INITIAL,
            packet_size: config.packet_size,
            max_payload: config.max_payload(),
            framing: config.framing,
        }
    }

    /// Queue a message behind everything already pending
    ///
    /// With [`MessageFraming::LengthPrefixed`] a message whose length does
    /// not fit the prefix is rejected and nothing is queued.
    pub fn push(&mut self, message: Bytes) -> Result<(), PacketError> {
        if self.framing == MessageFraming::LengthPrefixed {
            let prefix = length_prefix(message.len())?;
            self.enqueue(Bytes::copy_from_slice(&prefix));
        }
        self.enqueue(message);
        Ok(())
    }

    fn enqueue(&mut self, run: Bytes) {
        if run.is_empty() {
            return;
        }
        self.pending_bytes += run.len();
        self.pending.push_back(run);
    }

    /// Produce the next stamped wire packet, or `None` if nothing is pending
    ///
    /// Consumes exactly one sequence number per packet produced.
    pub fn pack_next(&mut self) -> Option<(SeqNumber, Bytes)> {
        if self.pending.is_empty() {
            return None;
        }

        let mut payload = BytesMut::with_capacity(self.max_payload.min(self.pending_bytes));
        while let Some(mut run) = self.pending.pop_front() {
            let room = self.max_payload - payload.len();
            if run.len() <= room {
                payload.extend_from_slice(&run);
            } else {
                payload.extend_from_slice(&run.split_to(room));
                self.pending.push_front(run);
                break;
            }
        }
        self.pending_bytes -= payload.len();

        let seq = self.next_seq;
        self.next_seq.increment();

        let mut packet = Packet::data(seq, payload.freeze());
        let wire = packet.write(self.packet_size);
        tracing::trace!(%seq, len = packet.payload.len(), "packed");

        Some((seq, wire))
    }

    /// Bytes waiting to be packed
    pub fn pending_bytes(&self) -> usize {
        self.pending_bytes
    }

    /// Whether nothing is waiting to be packed
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Sequence number the next packet will carry
    pub fn next_seq(&self) -> SeqNumber {
        self.next_seq
    }
}

/// Receiver-side message reconstruction
#[derive(Debug)]
pub struct Reassembler {
    framing: MessageFraming,
    /// Stream bytes not yet forming a complete message
    partial: BytesMut,
    /// Length of the message being collected, once its prefix is read
    expected_len: Option<usize>,
}

impl Reassembler {
    /// Create a reassembler for the given framing policy
    pub fn new(framing: MessageFraming) -> Self {
        Reassembler {
            framing,
            partial: BytesMut::new(),
            expected_len: None,
        }
    }

    /// Feed the next in-order payload, returning every message it completes
    pub fn push(&mut self, payload: Bytes) -> Vec<Bytes> {
        match self.framing {
            MessageFraming::Stream => {
                if payload.is_empty() {
                    Vec::new()
                } else {
                    vec![payload]
                }
            }
            MessageFraming::LengthPrefixed => {
                self.partial.extend_from_slice(&payload);
                self.drain_messages()
            }
        }
    }

    fn drain_messages(&mut self) -> Vec<Bytes> {
        let mut messages = Vec::new();

        loop {
            let len = match self.expected_len {
                Some(len) => len,
                None if self.partial.len() >= LENGTH_PREFIX_SIZE => {
                    let len = self.partial.get_u32() as usize;
                    self.expected_len = Some(len);
                    len
                }
                None => break,
            };

            if self.partial.len() < len {
                break;
            }

            messages.push(self.partial.split_to(len).freeze());
            self.expected_len = None;
        }

        messages
    }

    /// Bytes held while waiting for the rest of a message
    pub fn buffered_bytes(&self) -> usize {
        self.partial.len()
    }
}
