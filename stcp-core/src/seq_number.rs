use std::fmt::Display;
use std::ops;

const PERIOD: u64 = 1 << 32;

/// Represents a wrapping u32 as carried in segment headers.
/// The absolute (64-bit, non-wrapping) position in the sequence space is
/// recovered with `unwrap` relative to the initial sequence number.
#[derive(Debug, PartialEq, Copy, Clone, Hash, Eq, Default)]
pub struct SequenceNumber(pub u32);

impl SequenceNumber {
    /// Converts an absolute sequence number into its wire form.
    pub fn wrap(absolute: u64, isn: SequenceNumber) -> Self {
        Self(isn.0.wrapping_add(absolute as u32))
    }

    /// Converts this wire sequence number into the absolute sequence number
    /// congruent to it (mod 2^32) that lies closest to `checkpoint`.
    /// Equidistant candidates resolve to the smaller value.
    pub fn unwrap(self, isn: SequenceNumber, checkpoint: u64) -> u64 {
        let offset = u64::from(self.0.wrapping_sub(isn.0));
        let candidate = (checkpoint & !(PERIOD - 1)) + offset;

        let distance = |value: u64| {
            if value > checkpoint {
                value - checkpoint
            } else {
                checkpoint - value
            }
        };

        let mut best = candidate;

        if let Some(lower) = candidate.checked_sub(PERIOD) {
            if distance(lower) <= distance(best) {
                best = lower;
            }
        }

        if let Some(upper) = candidate.checked_add(PERIOD) {
            if distance(upper) < distance(best) {
                best = upper;
            }
        }

        best
    }
}

/// Sequence numbers will wrap after exceeding 32-bit space
impl ops::Add<u32> for SequenceNumber {
    type Output = Self;

    fn add(self, rhs: u32) -> Self {
        Self(self.0.wrapping_add(rhs))
    }
}

/// The forward distance from `rhs` to `self`, modulo 2^32
impl ops::Sub<SequenceNumber> for SequenceNumber {
    type Output = u32;

    fn sub(self, rhs: Self) -> u32 {
        self.0.wrapping_sub(rhs.0)
    }
}

impl Display for SequenceNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Seq({})", self.0)
    }
}
