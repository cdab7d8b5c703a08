//! Sender session
//!
//! Owns the pending-message queue (through the [`Framer`]), a FIFO window of
//! at most `W` unacknowledged packets and the bookkeeping for a single
//! shared retransmission timer.
//!
//! # Timer policy
//!
//! Each window entry carries its own retransmission deadline, read off the
//! context's [`Clock`] when the packet leaves. One timer is outstanding at a
//! time and always targets the earliest deadline in the window: it is
//! re-armed whenever a packet is transmitted or the acknowledgment frontier
//! moves, and dropped once the window drains. On expiry every entry whose
//! deadline has passed is resent unchanged with a fresh deadline.
//!
//! [`Clock`]: crate::context::Clock

use crate::checksum;
use crate::config::{ConfigError, ProtocolConfig};
use crate::context::SenderContext;
use crate::framer::Framer;
use crate::packet::{Packet, PacketError};
use crate::sequence::SeqNumber;
use crate::stats::SenderStats;
use bytes::Bytes;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, trace};

/// Transmitted, unacknowledged packet
#[derive(Debug, Clone)]
struct InFlight {
    /// Sequence number carried by `wire`
    seq: SeqNumber,
    /// Stamped wire image, resent byte-for-byte on timeout
    wire: Bytes,
    /// Clock reading at which this packet is due for retransmission
    deadline: Duration,
}

/// Sending half of a reliable session
#[derive(Debug)]
pub struct SenderSession {
    config: ProtocolConfig,
    framer: Framer,
    /// In-flight packets in sequence order (front = oldest)
    window: VecDeque<InFlight>,
    /// Deadline the outstanding timer was armed for, if any
    timer_deadline: Option<Duration>,
    stats: SenderStats,
}

impl SenderSession {
    /// Create a sender session
    pub fn new(config: ProtocolConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        debug!(
            packet_size = config.packet_size,
            window_size = config.window_size,
            timeout_ms = config.retransmit_timeout_ms,
            "sender initialized"
        );

        Ok(SenderSession {
            framer: Framer::new(&config),
            window: VecDeque::with_capacity(config.window_size),
            timer_deadline: None,
            stats: SenderStats::default(),
            config,
        })
    }

    /// Accept a message from the application and transmit what the window allows
    ///
    /// Fails only if the message cannot be framed; nothing is queued then.
    pub fn on_message<C>(&mut self, ctx: &mut C, message: Bytes) -> Result<(), PacketError>
    where
        C: SenderContext + ?Sized,
    {
        trace!(len = message.len(), "message from application");
        let len = message.len() as u64;
        self.framer.push(message)?;
        self.stats.bytes_submitted += len;
        self.fill_and_transmit(ctx);
        Ok(())
    }

    /// Transmit new packets while the window has room and data is pending
    pub fn fill_and_transmit<C>(&mut self, ctx: &mut C)
    where
        C: SenderContext + ?Sized,
    {
        let timeout = self.config.retransmit_timeout();

        while self.window.len() < self.config.window_size {
            let Some((seq, wire)) = self.framer.pack_next() else {
                break;
            };

            trace!(%seq, "transmit");
            ctx.send_packet(wire.clone());
            self.stats.packets_sent += 1;

            self.window.push_back(InFlight {
                seq,
                wire,
                deadline: ctx.now() + timeout,
            });
        }

        self.rearm(ctx);
    }

    /// Handle an acknowledgment packet from the channel
    ///
    /// The ack number is cumulative: every in-flight packet with a sequence
    /// number at or below it is released.
    pub fn on_ack<C>(&mut self, ctx: &mut C, wire: &[u8])
    where
        C: SenderContext + ?Sized,
    {
        if !checksum::verify(wire) {
            debug!("dropping corrupted ack");
            self.stats.acks_corrupted += 1;
            return;
        }

        let ack = match Packet::decode(wire) {
            Ok(packet) => packet.ack_number(),
            Err(err) => {
                debug!(%err, "dropping malformed ack");
                self.stats.acks_corrupted += 1;
                return;
            }
        };
        self.stats.acks_received += 1;

        let mut released = 0usize;
        while self.window.front().is_some_and(|entry| entry.seq <= ack) {
            self.window.pop_front();
            released += 1;
        }

        if released == 0 {
            trace!(%ack, "ack did not advance window");
            self.stats.acks_duplicate += 1;
        } else {
            debug!(%ack, released, in_flight = self.window.len(), "window advanced");
        }

        self.fill_and_transmit(ctx);
    }

    /// Handle expiry of the retransmission timer
    ///
    /// An expiry arriving after the window drained is ignored; one with
    /// nothing due yet only re-arms the timer.
    pub fn on_timeout<C>(&mut self, ctx: &mut C)
    where
        C: SenderContext + ?Sized,
    {
        if self.timer_deadline.take().is_none() {
            trace!("no timer outstanding, expiry ignored");
            return;
        }

        let now = ctx.now();
        let timeout = self.config.retransmit_timeout();
        self.stats.timeouts += 1;

        for entry in self.window.iter_mut() {
            if entry.deadline <= now {
                debug!(seq = %entry.seq, "retransmit");
                ctx.send_packet(entry.wire.clone());
                self.stats.packets_retransmitted += 1;
                entry.deadline = now + timeout;
            }
        }

        self.rearm(ctx);
    }

    /// Point the timer at the earliest deadline in the window
    fn rearm<C>(&mut self, ctx: &mut C)
    where
        C: SenderContext + ?Sized,
    {
        let Some(next) = self.window.iter().map(|entry| entry.deadline).min() else {
            if self.timer_deadline.take().is_some() {
                debug!("window empty, timer dropped");
            }
            return;
        };

        if self.timer_deadline != Some(next) {
            let after = next.saturating_sub(ctx.now());
            trace!(?after, "arm timer");
            self.timer_deadline = Some(next);
            ctx.arm(after);
        }
    }

    /// Number of unacknowledged packets
    pub fn in_flight(&self) -> usize {
        self.window.len()
    }

    /// Sequence numbers currently in flight, oldest first
    pub fn in_flight_seqs(&self) -> impl Iterator<Item = SeqNumber> + '_ {
        self.window.iter().map(|entry| entry.seq)
    }

    /// Application bytes not yet packed
    pub fn pending_bytes(&self) -> usize {
        self.framer.pending_bytes()
    }

    /// Whether everything submitted has been acknowledged
    pub fn is_idle(&self) -> bool {
        self.window.is_empty() && self.framer.is_empty()
    }

    /// Whether a timer expiry is outstanding
    pub fn timer_armed(&self) -> bool {
        self.timer_deadline.is_some()
    }

    /// Sequence number the next new packet will carry
    pub fn next_seq(&self) -> SeqNumber {
        self.framer.next_seq()
    }

    /// Session configuration
    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Session counters
    pub fn stats(&self) -> &SenderStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MessageFraming;
    use crate::context::{Channel, Clock, RetransmitTimer};

    #[derive(Default)]
    struct Recorder {
        now: Duration,
        sent: Vec<Bytes>,
        armed: Vec<Duration>,
    }

    impl Recorder {
        fn advance(&mut self, ms: u64) {
            self.now += Duration::from_millis(ms);
        }
    }

    impl Channel for Recorder {
        fn send_packet(&mut self, packet: Bytes) {
            self.sent.push(packet);
        }
    }

    impl RetransmitTimer for Recorder {
        fn arm(&mut self, after: Duration) {
            self.armed.push(after);
        }
    }

    impl Clock for Recorder {
        fn now(&self) -> Duration {
            self.now
        }
    }

    fn session(window_size: usize) -> SenderSession {
        SenderSession::new(ProtocolConfig {
            packet_size: 20,
            window_size,
            retransmit_timeout_ms: 100,
            framing: MessageFraming::Stream,
            ..Default::default()
        })
        .unwrap()
    }

    fn ack(n: u32) -> Bytes {
        Packet::ack(SeqNumber::new(n)).encode(20).unwrap()
    }

    fn seq_of(wire: &Bytes) -> u32 {
        Packet::decode(wire).unwrap().seq.as_raw()
    }

    fn ms(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = ProtocolConfig {
            window_size: 0,
            ..Default::default()
        };
        assert!(SenderSession::new(config).is_err());
    }

    #[test]
    fn test_window_bounds_transmission() {
        let mut sender = session(3);
        let mut ctx = Recorder::default();

        sender.on_message(&mut ctx, Bytes::from(vec![1u8; 11 * 5])).unwrap();

        assert_eq!(ctx.sent.len(), 3);
        assert_eq!(sender.in_flight(), 3);
        assert_eq!(sender.pending_bytes(), 22);
        assert_eq!(ctx.armed, vec![ms(100)]);
        assert!(sender.timer_armed());
    }

    #[test]
    fn test_cumulative_ack_slides_window() {
        let mut sender = session(3);
        let mut ctx = Recorder::default();
        sender.on_message(&mut ctx, Bytes::from(vec![1u8; 11 * 5])).unwrap();
        ctx.sent.clear();

        sender.on_ack(&mut ctx, &ack(2));

        assert_eq!(
            sender.in_flight_seqs().collect::<Vec<_>>(),
            vec![SeqNumber::new(3), SeqNumber::new(4), SeqNumber::new(5)]
        );
        let sent: Vec<u32> = ctx.sent.iter().map(seq_of).collect();
        assert_eq!(sent, vec![4, 5]);
        assert_eq!(sender.pending_bytes(), 0);
    }

    #[test]
    fn test_duplicate_ack_is_noop() {
        let mut sender = session(4);
        let mut ctx = Recorder::default();
        sender.on_message(&mut ctx, Bytes::from(vec![1u8; 30])).unwrap();
        sender.on_ack(&mut ctx, &ack(1));
        let sent_before = ctx.sent.len();

        sender.on_ack(&mut ctx, &ack(1));
        sender.on_ack(&mut ctx, &ack(0));

        assert_eq!(ctx.sent.len(), sent_before);
        assert_eq!(sender.in_flight(), 2);
        assert_eq!(sender.stats().acks_duplicate, 2);
    }

    #[test]
    fn test_corrupted_ack_ignored() {
        let mut sender = session(4);
        let mut ctx = Recorder::default();
        sender.on_message(&mut ctx, Bytes::from_static(b"data")).unwrap();

        let mut bad = ack(1).to_vec();
        bad[5] ^= 0x01;
        sender.on_ack(&mut ctx, &bad);

        assert_eq!(sender.in_flight(), 1);
        assert_eq!(sender.stats().acks_corrupted, 1);
    }

    #[test]
    fn test_timeout_retransmits_unchanged() {
        let mut sender = session(4);
        let mut ctx = Recorder::default();
        sender.on_message(&mut ctx, Bytes::from(vec![9u8; 15])).unwrap();
        let original = ctx.sent.clone();
        ctx.sent.clear();

        ctx.advance(100);
        sender.on_timeout(&mut ctx);

        assert_eq!(ctx.sent, original);
        assert_eq!(sender.stats().packets_retransmitted, 2);
        assert_eq!(ctx.armed.last(), Some(&ms(100)));
        assert!(sender.timer_armed());
    }

    #[test]
    fn test_draining_window_drops_timer() {
        let mut sender = session(4);
        let mut ctx = Recorder::default();
        sender.on_message(&mut ctx, Bytes::from_static(b"x")).unwrap();
        sender.on_ack(&mut ctx, &ack(1));

        assert!(sender.is_idle());
        assert!(!sender.timer_armed());

        // The expiry armed for the drained window still surfaces
        ctx.advance(100);
        sender.on_timeout(&mut ctx);
        assert_eq!(ctx.sent.len(), 1);
        assert!(!sender.timer_armed());
        assert_eq!(ctx.armed.len(), 1);
        assert_eq!(sender.stats().timeouts, 0);
    }

    #[test]
    fn test_packet_sent_later_keeps_its_own_deadline() {
        let mut sender = session(4);
        let mut ctx = Recorder::default();
        sender.on_message(&mut ctx, Bytes::from_static(b"first")).unwrap();

        ctx.advance(60);
        sender.on_message(&mut ctx, Bytes::from_static(b"second")).unwrap();
        assert_eq!(ctx.armed, vec![ms(100)]);

        // Only the first packet is due at 100 ms
        ctx.advance(40);
        ctx.sent.clear();
        sender.on_timeout(&mut ctx);
        assert_eq!(ctx.sent.iter().map(seq_of).collect::<Vec<_>>(), vec![1]);
        assert_eq!(ctx.armed.last(), Some(&ms(60)));

        ctx.advance(60);
        ctx.sent.clear();
        sender.on_timeout(&mut ctx);
        assert_eq!(ctx.sent.iter().map(seq_of).collect::<Vec<_>>(), vec![2]);
        assert_eq!(ctx.armed.last(), Some(&ms(40)));
    }

    #[test]
    fn test_ack_rearms_for_remaining_packets() {
        let mut sender = session(4);
        let mut ctx = Recorder::default();
        sender.on_message(&mut ctx, Bytes::from_static(b"first")).unwrap();
        ctx.advance(50);
        sender.on_message(&mut ctx, Bytes::from_static(b"second")).unwrap();

        ctx.advance(30);
        sender.on_ack(&mut ctx, &ack(1));

        // Second packet left at 50 ms, so it is due at 150 ms
        assert_eq!(ctx.armed, vec![ms(100), ms(70)]);
    }

    #[test]
    fn test_fresh_timer_after_idle_period() {
        let mut sender = session(4);
        let mut ctx = Recorder::default();
        sender.on_message(&mut ctx, Bytes::from_static(b"a")).unwrap();
        ctx.advance(20);
        sender.on_ack(&mut ctx, &ack(1));

        ctx.advance(230);
        sender.on_message(&mut ctx, Bytes::from_static(b"b")).unwrap();
        assert_eq!(ctx.armed, vec![ms(100), ms(100)]);

        // An expiry ahead of the deadline resends nothing
        ctx.sent.clear();
        ctx.advance(50);
        sender.on_timeout(&mut ctx);
        assert!(ctx.sent.is_empty());
        assert_eq!(ctx.armed.last(), Some(&ms(50)));
    }

    #[test]
    fn test_ack_releases_and_refills_after_empty_queue() {
        let mut sender = session(2);
        let mut ctx = Recorder::default();
        sender.on_message(&mut ctx, Bytes::from_static(b"a")).unwrap();
        sender.on_ack(&mut ctx, &ack(1));
        assert!(sender.is_idle());

        sender.on_message(&mut ctx, Bytes::from_static(b"b")).unwrap();
        assert_eq!(sender.next_seq(), SeqNumber::new(3));
        assert_eq!(seq_of(ctx.sent.last().unwrap()), 2);
    }
}
