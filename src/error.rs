use rocket::{http::Status, response::Responder};
use thiserror::Error;

use crate::model::common::sync::EntityType;
use crate::model::mongodb::Id;

pub type Result<T> = std::result::Result<T, Error>;

/// All the ways a request can fail.
///
/// Business-rule violations get their own variants so callers always see one
/// specific, named reason; they are checked before any mutation and never
/// retried automatically. Ledger errors are confined to the bridge boundary
/// and never unwind a committed ballot.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] mongodb::error::Error),
    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error(transparent)]
    Argon2(#[from] argon2::Error),
    #[error("Invalid request: {0}")]
    Validation(String),
    #[error("Election {0} is not open for voting")]
    ElectionNotOpen(Id),
    #[error("Candidacy {0} is not an approved candidate for this election")]
    IneligibleCandidate(Id),
    #[error("A ballot has already been cast in election {0} by this voter")]
    AlreadyVoted(Id),
    #[error("Election {0} has opened and is locked against changes")]
    ElectionLocked(Id),
    #[error("A candidacy for election {0} already exists for this voter")]
    DuplicateCandidacy(Id),
    #[error("Ledger unreachable: {0}")]
    LedgerUnavailable(String),
    #[error("Ledger rejected the submission: {0}")]
    LedgerRejected(String),
    #[error("{0} {1} depends on an entity that has not been synced yet")]
    NotSynced(EntityType, Id),
    #[error("{1}")]
    Status(Status, String),
}

impl Error {
    /// A 404 for the described resource.
    pub fn not_found(what: impl Into<String>) -> Self {
        let mut msg = what.into();
        msg.push_str(" not found");
        Self::Status(Status::NotFound, msg)
    }

    /// The HTTP status this error maps to.
    pub fn status(&self) -> Status {
        match self {
            Self::Db(_) | Self::Argon2(_) => Status::InternalServerError,
            Self::Jwt(_) => Status::Unauthorized,
            Self::Validation(_) => Status::BadRequest,
            Self::ElectionNotOpen(_) | Self::IneligibleCandidate(_) | Self::ElectionLocked(_) => {
                Status::UnprocessableEntity
            }
            Self::AlreadyVoted(_) | Self::DuplicateCandidacy(_) => Status::Conflict,
            Self::LedgerUnavailable(_) => Status::ServiceUnavailable,
            Self::LedgerRejected(_) => Status::BadGateway,
            Self::NotSynced(_, _) => Status::PreconditionFailed,
            Self::Status(status, _) => *status,
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, _: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        if status.code >= 500 {
            error!("{self}");
        } else {
            warn!("{self}");
        }
        Err(status)
    }
}
