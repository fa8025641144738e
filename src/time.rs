//! Virtual time types: nanosecond-resolution instants and durations.
//!
//! Mirrors the nanosecond-precision, monotonic-by-construction discipline of
//! the simulation clock this crate is built around, but splits "instant" and
//! "duration" into distinct newtypes instead of one raw `u64`.

use std::fmt;
use std::ops::{Add, AddAssign, Sub};

use serde::{Deserialize, Serialize};

/// A point in virtual time, in nanoseconds since the simulation began.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct SimTime(u64);

impl SimTime {
    pub const ZERO: SimTime = SimTime(0);

    #[must_use]
    pub fn from_nanos(ns: u64) -> Self {
        Self(ns)
    }

    #[must_use]
    pub fn as_nanos(self) -> u64 {
        self.0
    }

    #[must_use]
    pub fn as_millis(self) -> u64 {
        self.0 / 1_000_000
    }

    /// Saturating subtraction; never goes negative (both operands are
    /// monotonic virtual instants so the caller is asking "how long ago").
    #[must_use]
    pub fn saturating_sub(self, other: SimTime) -> SimDuration {
        SimDuration(self.0.saturating_sub(other.0))
    }

    #[must_use]
    pub fn saturating_add_signed(self, delta_ns: i64) -> SimTime {
        Self(self.0.saturating_add_signed(delta_ns))
    }

    /// Rounds down to the nearest multiple of `granularity`, per the
    /// close-time-agreement rule used when a peer closes a ledger.
    #[must_use]
    pub fn round_down(self, granularity: SimDuration) -> SimTime {
        let g = granularity.0.max(1);
        Self(self.0 - (self.0 % g))
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

impl Add<SimDuration> for SimTime {
    type Output = SimTime;
    fn add(self, rhs: SimDuration) -> SimTime {
        SimTime(self.0 + rhs.0)
    }
}

impl AddAssign<SimDuration> for SimTime {
    fn add_assign(&mut self, rhs: SimDuration) {
        self.0 += rhs.0;
    }
}

impl Sub<SimTime> for SimTime {
    type Output = SimDuration;
    fn sub(self, rhs: SimTime) -> SimDuration {
        SimDuration(self.0.saturating_sub(rhs.0))
    }
}

/// A span of virtual time, in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct SimDuration(u64);

impl SimDuration {
    pub const ZERO: SimDuration = SimDuration(0);

    #[must_use]
    pub const fn from_nanos(ns: u64) -> Self {
        Self(ns)
    }

    #[must_use]
    pub const fn from_millis(ms: u64) -> Self {
        Self(ms * 1_000_000)
    }

    #[must_use]
    pub const fn from_secs(s: u64) -> Self {
        Self(s * 1_000_000_000)
    }

    #[must_use]
    pub fn as_nanos(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SimDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

impl Add for SimDuration {
    type Output = SimDuration;
    fn add(self, rhs: SimDuration) -> SimDuration {
        SimDuration(self.0 + rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_time_saturating_sub_never_negative() {
        let earlier = SimTime::from_nanos(100);
        let later = SimTime::from_nanos(50);
        assert_eq!(later.saturating_sub(earlier), SimDuration::ZERO);
    }

    #[test]
    fn sim_time_round_down() {
        let t = SimTime::from_nanos(37);
        let gran = SimDuration::from_nanos(10);
        assert_eq!(t.round_down(gran), SimTime::from_nanos(30));
    }

    #[test]
    fn sim_time_round_down_exact_multiple() {
        let t = SimTime::from_nanos(40);
        let gran = SimDuration::from_nanos(10);
        assert_eq!(t.round_down(gran), SimTime::from_nanos(40));
    }

    #[test]
    fn sim_duration_from_millis_and_secs() {
        assert_eq!(SimDuration::from_millis(5).as_nanos(), 5_000_000);
        assert_eq!(SimDuration::from_secs(2).as_nanos(), 2_000_000_000);
    }

    #[test]
    fn sim_time_skew_saturates_at_zero() {
        let t = SimTime::from_nanos(0);
        assert_eq!(t.saturating_add_signed(-10), SimTime::ZERO);
    }
}
