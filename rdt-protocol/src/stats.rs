//! Session counters

/// Sender statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderStats {
    /// Data packets handed to the channel for the first time
    pub packets_sent: u64,
    /// Data packets handed to the channel again after a timeout
    pub packets_retransmitted: u64,
    /// Application bytes accepted by `on_message`
    pub bytes_submitted: u64,
    /// Acks that passed the integrity check
    pub acks_received: u64,
    /// Acks dropped for a checksum mismatch or bad structure
    pub acks_corrupted: u64,
    /// Acks that did not advance the window
    pub acks_duplicate: u64,
    /// Timer expiries handled
    pub timeouts: u64,
}

/// Receiver statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    /// Packets handed in by the channel
    pub packets_received: u64,
    /// Packets dropped for a checksum mismatch or bad structure
    pub packets_corrupted: u64,
    /// Packets already delivered or already buffered
    pub packets_duplicate: u64,
    /// Packets beyond the receive window
    pub packets_out_of_window: u64,
    /// Packets held for later in-order delivery
    pub packets_buffered: u64,
    /// Messages handed to the application
    pub messages_delivered: u64,
    /// Bytes handed to the application
    pub bytes_delivered: u64,
    /// Cumulative acks handed to the channel
    pub acks_sent: u64,
}
