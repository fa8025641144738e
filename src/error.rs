//! The handful of conditions this crate propagates instead of recovering
//! locally. Everything else in §7's error taxonomy — invalid topology,
//! stale validations, dedup misses, missing ancestors, acquisition misses
//! — stays a local return value (`bool`, `Option`, a status enum); see the
//! relevant module for each.

use thiserror::Error;

use crate::time::SimTime;

#[derive(Debug, Error, PartialEq)]
pub enum SimError {
    #[error("quorum ratio {0} is outside the valid range (0.0, 1.0]")]
    InvalidQuorumRatio(f64),

    #[error("peer count {0} must be at least 1")]
    InvalidPeerCount(usize),

    #[error("requested time {requested} is before current time {now}")]
    TimeTravel { requested: SimTime, now: SimTime },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_are_human_readable() {
        let err = SimError::InvalidQuorumRatio(1.5);
        assert_eq!(err.to_string(), "quorum ratio 1.5 is outside the valid range (0.0, 1.0]");
    }
}
