use std::ops::{Deref, DerefMut};

use mongodb::bson::{doc, Document};
use serde::{Deserialize, Serialize};

use crate::model::{common::candidacy::CandidacyStatus, mongodb::Id};

/// Core candidacy data, as stored in the database.
///
/// At most one candidacy exists per `(voter_id, election_id)`, enforced by
/// index.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidacyCore {
    pub voter_id: Id,
    pub election_id: Id,
    pub manifesto: String,
    pub status: CandidacyStatus,
    /// Set once the approved candidacy has been mirrored to the ledger.
    pub on_chain_id: Option<String>,
}

impl CandidacyCore {
    /// A fresh application, awaiting review.
    pub fn new(voter_id: Id, election_id: Id, manifesto: String) -> Self {
        Self {
            voter_id,
            election_id,
            manifesto,
            status: CandidacyStatus::Pending,
            on_chain_id: None,
        }
    }

    /// A filter document matching the candidacy of the given voter in the
    /// given election.
    pub fn voter_election_filter(voter_id: Id, election_id: Id) -> Document {
        doc! {
            "voter_id": voter_id,
            "election_id": election_id,
        }
    }
}

/// A candidacy without an ID.
pub type NewCandidacy = CandidacyCore;

/// A candidacy from the database, with its unique ID.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidacy {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub candidacy: CandidacyCore,
}

impl Deref for Candidacy {
    type Target = CandidacyCore;

    fn deref(&self) -> &Self::Target {
        &self.candidacy
    }
}

impl DerefMut for Candidacy {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.candidacy
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl CandidacyCore {
        pub fn example(voter_id: Id, election_id: Id) -> Self {
            Self::new(
                voter_id,
                election_id,
                "A library open 24 hours, every day of term.".to_string(),
            )
        }

        pub fn example_approved(voter_id: Id, election_id: Id) -> Self {
            Self {
                status: CandidacyStatus::Approved,
                ..Self::example(voter_id, election_id)
            }
        }
    }
}
