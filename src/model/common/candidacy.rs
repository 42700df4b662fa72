use mongodb::bson::Bson;
use serde::{Deserialize, Serialize};

/// The review state of a candidacy application.
///
/// Applications start `Pending` and are moved to `Approved` or `Rejected` by
/// an administrator; the latest decision wins. Only `Approved` candidates may
/// receive votes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandidacyStatus {
    /// Submitted but not yet reviewed.
    Pending,
    /// Accepted by an administrator; the candidate appears on the ballot.
    Approved,
    /// Declined by an administrator.
    Rejected,
}

impl From<CandidacyStatus> for Bson {
    /// Convert to BSON for use in filter documents.
    fn from(status: CandidacyStatus) -> Self {
        // Never fails for a unit enum variant.
        mongodb::bson::to_bson(&status).unwrap()
    }
}
