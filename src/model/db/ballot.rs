use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{common::sync::LedgerSyncState, mongodb::Id};

/// Core ballot data, as stored in the database.
///
/// The unique `(voter_id, election_id)` index makes the insert the
/// check-and-set: whichever of two racing submissions reaches the database
/// second is rejected, so no voter ever holds two ballots in one election.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotCore {
    pub voter_id: Id,
    pub election_id: Id,
    pub candidacy_id: Id,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub cast_at: DateTime<Utc>,
    /// Ledger transaction reference, set once the ballot has been submitted.
    pub tx_ref: Option<String>,
    pub sync_state: LedgerSyncState,
}

impl BallotCore {
    /// A fresh ballot, cast now and not yet on the ledger.
    pub fn new(voter_id: Id, election_id: Id, candidacy_id: Id) -> Self {
        Self {
            voter_id,
            election_id,
            candidacy_id,
            cast_at: Utc::now(),
            tx_ref: None,
            sync_state: LedgerSyncState::Pending,
        }
    }
}

/// A ballot without an ID.
pub type NewBallot = BallotCore;

/// A ballot from the database, with its unique ID.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub ballot: BallotCore,
}

impl Deref for Ballot {
    type Target = BallotCore;

    fn deref(&self) -> &Self::Target {
        &self.ballot
    }
}

impl DerefMut for Ballot {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.ballot
    }
}
