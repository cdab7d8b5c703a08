//! Sequence Number Handling
//!
//! Every payload-bearing packet consumes exactly one sequence number. Numbers
//! start at [`SeqNumber::INITIAL`] and only ever grow; the receiver's
//! acknowledgment number is the last contiguously delivered sequence number,
//! which is `INITIAL - 1` before anything has been delivered.

use std::fmt;
use std::ops::{Add, AddAssign, Sub};

/// Sequence number carried in the 4-byte header field
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct SeqNumber(u32);

impl SeqNumber {
    /// First sequence number assigned by a sender
    pub const INITIAL: SeqNumber = SeqNumber(1);

    /// Acknowledgment number meaning "nothing delivered yet"
    pub const NONE_DELIVERED: SeqNumber = SeqNumber(0);

    /// Create a new sequence number
    #[inline]
    pub const fn new(value: u32) -> Self {
        SeqNumber(value)
    }

    /// Get the raw sequence number value
    #[inline]
    pub fn as_raw(self) -> u32 {
        self.0
    }

    /// Increment the sequence number by 1
    #[inline]
    pub fn increment(&mut self) {
        self.0 += 1;
    }

    /// Get the next sequence number
    #[inline]
    pub fn next(self) -> Self {
        SeqNumber(self.0 + 1)
    }

    /// Get the previous sequence number, saturating at zero
    #[inline]
    pub fn prev(self) -> Self {
        SeqNumber(self.0.saturating_sub(1))
    }

    /// Signed distance from this sequence number to `other`
    ///
    /// Positive values mean `other` is ahead of `self`.
    #[inline]
    pub fn distance_to(self, other: SeqNumber) -> i64 {
        i64::from(other.0) - i64::from(self.0)
    }
}

impl fmt::Debug for SeqNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SeqNumber({})", self.0)
    }
}

impl fmt::Display for SeqNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SeqNumber {
    fn from(value: u32) -> Self {
        SeqNumber(value)
    }
}

impl From<SeqNumber> for u32 {
    fn from(seq: SeqNumber) -> u32 {
        seq.0
    }
}

impl Add<u32> for SeqNumber {
    type Output = SeqNumber;

    fn add(self, rhs: u32) -> SeqNumber {
        SeqNumber(self.0 + rhs)
    }
}

impl AddAssign<u32> for SeqNumber {
    fn add_assign(&mut self, rhs: u32) {
        self.0 += rhs;
    }
}

impl Sub for SeqNumber {
    type Output = i64;

    /// Calculate the signed distance between two sequence numbers
    fn sub(self, rhs: SeqNumber) -> i64 {
        rhs.distance_to(self)
    }
}
