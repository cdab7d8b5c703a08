//! Collaborator interfaces
//!
//! Sessions never own the channel, the timer facility or the application.
//! The scheduler passes a context into every handler call. The sender also
//! reads the scheduler's clock so retransmission deadlines are measured
//! from when each packet actually left.

use bytes::Bytes;
use std::time::Duration;

/// Unreliable packet transport
pub trait Channel {
    /// Hand a wire image to the channel; delivery is not guaranteed
    fn send_packet(&mut self, packet: Bytes);
}

/// Single retransmission timer
pub trait RetransmitTimer {
    /// Schedule one expiry `after` from now, replacing any pending deadline
    fn arm(&mut self, after: Duration);
}

/// Monotonic time source shared with the timer facility
pub trait Clock {
    /// Time elapsed since a fixed origin; never decreases
    fn now(&self) -> Duration;
}

/// Upward delivery to the application
pub trait Deliver {
    /// Hand a reassembled, in-order message to the application
    fn deliver_message(&mut self, message: Bytes);
}

/// Everything a sender handler may touch
pub trait SenderContext: Channel + RetransmitTimer + Clock {}

impl<T: Channel + RetransmitTimer + Clock + ?Sized> SenderContext for T {}

/// Everything a receiver handler may touch
pub trait ReceiverContext: Channel + Deliver {}

impl<T: Channel + Deliver + ?Sized> ReceiverContext for T {}
