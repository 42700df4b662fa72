use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::{
    api::id::ApiId,
    common::candidacy::CandidacyStatus,
    db::candidacy::Candidacy,
};

pub const MAX_MANIFESTO_LENGTH: usize = 10_000;

/// A candidacy application, received from a voter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidacyApplication {
    pub manifesto: String,
}

impl CandidacyApplication {
    /// Enforce that the manifesto is non-empty and within bounds.
    pub fn validate(&self) -> Result<(), Error> {
        if self.manifesto.trim().is_empty() {
            return Err(Error::Validation(
                "manifesto must not be empty".to_string(),
            ));
        }
        if self.manifesto.len() > MAX_MANIFESTO_LENGTH {
            return Err(Error::Validation(format!(
                "manifesto must be at most {MAX_MANIFESTO_LENGTH} bytes"
            )));
        }
        Ok(())
    }
}

/// An administrator's decision on a candidacy application.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReviewDecision {
    pub status: CandidacyStatus,
}

impl ReviewDecision {
    /// Enforce that the decision actually decides something.
    pub fn validate(&self) -> Result<(), Error> {
        if self.status == CandidacyStatus::Pending {
            return Err(Error::Validation(
                "a review must approve or reject".to_string(),
            ));
        }
        Ok(())
    }
}

/// A candidacy as seen via the API.
#[derive(Debug, Serialize, Deserialize)]
pub struct CandidacyView {
    pub id: ApiId,
    pub voter_id: ApiId,
    pub election_id: ApiId,
    pub manifesto: String,
    pub status: CandidacyStatus,
    pub on_chain_id: Option<String>,
}

impl From<Candidacy> for CandidacyView {
    fn from(candidacy: Candidacy) -> Self {
        Self {
            id: candidacy.id.into(),
            voter_id: candidacy.candidacy.voter_id.into(),
            election_id: candidacy.candidacy.election_id.into(),
            manifesto: candidacy.candidacy.manifesto,
            status: candidacy.candidacy.status,
            on_chain_id: candidacy.candidacy.on_chain_id,
        }
    }
}

#[cfg(test)]
mod examples {
    use super::*;

    impl CandidacyApplication {
        pub fn example() -> Self {
            Self {
                manifesto: "A library open 24 hours, every day of term.".to_string(),
            }
        }
    }

    #[test]
    fn undecided_reviews_are_rejected() {
        let undecided = ReviewDecision {
            status: CandidacyStatus::Pending,
        };
        assert!(undecided.validate().is_err());

        let approve = ReviewDecision {
            status: CandidacyStatus::Approved,
        };
        assert!(approve.validate().is_ok());
    }

    #[test]
    fn empty_and_oversized_manifestos_are_rejected() {
        let empty = CandidacyApplication {
            manifesto: "  ".to_string(),
        };
        assert!(empty.validate().is_err());

        let oversized = CandidacyApplication {
            manifesto: "x".repeat(MAX_MANIFESTO_LENGTH + 1),
        };
        assert!(oversized.validate().is_err());

        assert!(CandidacyApplication::example().validate().is_ok());
    }
}
