use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::id::ApiId,
    common::sync::LedgerSyncState,
    db::ballot::Ballot,
};

/// A vote, received from a voter. The election comes from the URL; the voter
/// comes from their token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRequest {
    pub candidacy_id: ApiId,
}

/// A cast ballot as seen by its voter: their receipt.
///
/// `tx_ref` and `sync_state` report how far the ballot has got onto the
/// ledger; the vote itself is counted as soon as this struct exists.
#[derive(Debug, Serialize, Deserialize)]
pub struct BallotView {
    pub id: ApiId,
    pub election_id: ApiId,
    pub candidacy_id: ApiId,
    pub cast_at: DateTime<Utc>,
    pub tx_ref: Option<String>,
    pub sync_state: LedgerSyncState,
}

impl From<Ballot> for BallotView {
    fn from(ballot: Ballot) -> Self {
        Self {
            id: ballot.id.into(),
            election_id: ballot.ballot.election_id.into(),
            candidacy_id: ballot.ballot.candidacy_id.into(),
            cast_at: ballot.ballot.cast_at,
            tx_ref: ballot.ballot.tx_ref,
            sync_state: ballot.ballot.sync_state,
        }
    }
}
