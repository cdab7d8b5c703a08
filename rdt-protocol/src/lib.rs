//! Reliable Data Transfer Protocol Core
//!
//! This crate implements a sliding-window ARQ engine that delivers an
//! arbitrary byte stream in order and exactly once over a channel that may
//! drop, corrupt, duplicate or reorder fixed-size packets. It covers packet
//! framing and integrity checking, sequence bookkeeping, the sender's
//! window and retransmission timer, and the receiver's reorder buffer and
//! cumulative acknowledgments.
//!
//! Sessions are driven by an external scheduler: every handler runs to
//! completion and reaches the outside world only through the context it is
//! handed (see [`context`]).

pub mod checksum;
pub mod config;
pub mod context;
pub mod framer;
pub mod packet;
pub mod receiver;
pub mod sender;
pub mod sequence;
pub mod stats;

pub use config::{ArqMode, ConfigError, MessageFraming, ProtocolConfig};
pub use context::{Channel, Clock, Deliver, ReceiverContext, RetransmitTimer, SenderContext};
pub use framer::{Framer, Reassembler};
pub use packet::{Packet, PacketError, HEADER_SIZE};
pub use receiver::ReceiverSession;
pub use sender::SenderSession;
pub use sequence::SeqNumber;
pub use stats::{ReceiverStats, SenderStats};
