//! Discrete-event scheduler
//!
//! Events are processed one at a time in timestamp order; events sharing a
//! timestamp run in the order they were scheduled. Each side owns at most
//! one outstanding timer: arming it again bumps a generation counter so the
//! superseded expiry is recognised and skipped when it surfaces.

use crate::clock::SimTime;
use bytes::Bytes;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Duration;

/// Endpoint of the simulated link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Sender,
    Receiver,
}

impl Side {
    fn index(self) -> usize {
        match self {
            Side::Sender => 0,
            Side::Receiver => 1,
        }
    }
}

/// Something that happens at a point in virtual time
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The application hands the sender a message
    MessageArrival(Bytes),
    /// A packet comes out of the channel at `to`
    PacketArrival { to: Side, packet: Bytes },
    /// A side's retransmission timer expires
    Timeout { side: Side, generation: u64 },
}

#[derive(Debug)]
struct Scheduled {
    at: SimTime,
    order: u64,
    event: Event,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.order == other.order
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; invert so the earliest event pops first
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.order.cmp(&self.order))
    }
}

/// Event queue plus the virtual clock
#[derive(Debug, Default)]
pub struct Scheduler {
    queue: BinaryHeap<Scheduled>,
    now: SimTime,
    next_order: u64,
    /// Current timer generation per side
    generations: [u64; 2],
    /// Whether each side's current generation is still pending
    armed: [bool; 2],
}

impl Scheduler {
    /// Create an empty scheduler at time zero
    pub fn new() -> Self {
        Scheduler::default()
    }

    /// Current virtual time
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Schedule an event `after` from now
    pub fn schedule(&mut self, after: Duration, event: Event) {
        self.schedule_at(self.now + after, event);
    }

    /// Schedule an event at an absolute time (never earlier than now)
    pub fn schedule_at(&mut self, at: SimTime, event: Event) {
        let at = at.max(self.now);
        let order = self.next_order;
        self.next_order += 1;
        self.queue.push(Scheduled { at, order, event });
    }

    /// Replace `side`'s pending timer with one expiring `after` from now
    pub fn arm_timer(&mut self, side: Side, after: Duration) {
        let idx = side.index();
        self.generations[idx] += 1;
        self.armed[idx] = true;
        let generation = self.generations[idx];
        self.schedule(after, Event::Timeout { side, generation });
    }

    /// Whether `side` has a live timer
    pub fn timer_armed(&self, side: Side) -> bool {
        self.armed[side.index()]
    }

    /// Take the next event, advancing the clock
    ///
    /// Superseded timer expiries are discarded here, so every returned
    /// `Timeout` is the live one for its side.
    pub fn pop(&mut self) -> Option<(SimTime, Event)> {
        while let Some(Scheduled { at, event, .. }) = self.queue.pop() {
            self.now = at;

            if let Event::Timeout { side, generation } = event {
                let idx = side.index();
                if generation != self.generations[idx] {
                    continue;
                }
                self.armed[idx] = false;
            }

            return Some((at, event));
        }
        None
    }

    /// Number of queued events (stale expiries included)
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
