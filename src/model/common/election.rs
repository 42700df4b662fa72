use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where an election sits in time.
///
/// This is never persisted: it is recomputed from the stored timestamps on
/// every read, so it cannot drift from the wall clock. Both boundaries count
/// as `Open`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElectionStatus {
    /// Voting has not started yet; the election may still be edited.
    Planned,
    /// Voting is in progress.
    Open,
    /// Voting has ended.
    Closed,
}

impl ElectionStatus {
    /// Derive the status of an election with the given window at time `now`.
    pub fn at(now: DateTime<Utc>, start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        if now < start_time {
            Self::Planned
        } else if now <= end_time {
            Self::Open
        } else {
            Self::Closed
        }
    }
}
