//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in a DB-friendly way, e.g.:
//!
//! - IDs and datetimes are serialised in MongoDB's own format.

pub mod admin;
pub mod ballot;
pub mod candidacy;
pub mod election;
pub mod sync_record;
pub mod voter;

pub use admin::{Admin, AdminCore, NewAdmin};
pub use ballot::{Ballot, BallotCore, NewBallot};
pub use candidacy::{Candidacy, CandidacyCore, NewCandidacy};
pub use election::{Election, ElectionCore, NewElection};
pub use sync_record::{NewSyncRecord, SyncRecord, SyncRecordCore};
pub use voter::{NewVoter, Voter, VoterCore};
