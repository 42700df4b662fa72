use mongodb::{bson::doc, Database};
use rocket::{serde::json::Json, tokio, Route, State};

use crate::{
    error::{Error, Result},
    ledger::LedgerBridge,
    model::{
        api::{
            auth::AuthToken,
            ballot::{BallotView, VoteRequest},
        },
        common::{candidacy::CandidacyStatus, election::ElectionStatus},
        db::{Ballot, BallotCore, Candidacy, Election, NewBallot, Voter},
        mongodb::{is_duplicate_key_error, Coll, Id},
    },
};

pub fn routes() -> Vec<Route> {
    routes![submit_vote, my_ballot]
}

/// Cast a vote.
///
/// The insert into the ballots collection is the double-vote guard: handlers
/// run concurrently across processes, so the unique `(voter_id, election_id)`
/// index is the only arbiter. Ledger mirroring happens on a detached task
/// after the ballot is committed and never delays or fails the response.
#[post("/elections/<election_id>/votes", data = "<request>", format = "json")]
async fn submit_vote(
    token: AuthToken<Voter>,
    election_id: Id,
    request: Json<VoteRequest>,
    elections: Coll<Election>,
    candidacies: Coll<Candidacy>,
    ballots: Coll<Ballot>,
    new_ballots: Coll<NewBallot>,
    db: &State<Database>,
    bridge: &State<LedgerBridge>,
) -> Result<Json<BallotView>> {
    let election = elections
        .find_one(election_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {}", election_id)))?;
    if election.status() != ElectionStatus::Open {
        return Err(Error::ElectionNotOpen(election_id));
    }

    let candidacy_id = *request.candidacy_id;
    let eligible = candidacies
        .find_one(candidacy_id.as_doc(), None)
        .await?
        .filter(|candidacy| {
            candidacy.election_id == election_id && candidacy.status == CandidacyStatus::Approved
        });
    if eligible.is_none() {
        return Err(Error::IneligibleCandidate(candidacy_id));
    }

    let ballot = BallotCore::new(token.id, election_id, candidacy_id);
    let new_id: Id = match new_ballots.insert_one(&ballot, None).await {
        Ok(insertion) => insertion
            .inserted_id
            .as_object_id()
            .unwrap() // Safe because the ID comes directly from the database.
            .into(),
        Err(err) if is_duplicate_key_error(&err) => {
            return Err(Error::AlreadyVoted(election_id));
        }
        Err(err) => return Err(err.into()),
    };
    let db_ballot = ballots.find_one(new_id.as_doc(), None).await?.unwrap();

    // Fire-and-forget mirror; the retrier picks up anything that fails here.
    let bridge = bridge.inner().clone();
    let task_db = db.inner().clone();
    tokio::spawn(async move {
        if let Err(err) = bridge.sync_ballot(&task_db, new_id).await {
            warn!("Detached sync for ballot {new_id} failed: {err}");
        }
    });

    Ok(Json(db_ballot.into()))
}

/// The authenticated voter's ballot in the given election, if any.
#[get("/elections/<election_id>/my-ballot")]
async fn my_ballot(
    token: AuthToken<Voter>,
    election_id: Id,
    ballots: Coll<Ballot>,
) -> Result<Json<BallotView>> {
    let filter = doc! {
        "voter_id": token.id,
        "election_id": election_id,
    };
    let ballot = ballots
        .find_one(filter, None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Ballot for election {}", election_id)))?;
    Ok(Json(ballot.into()))
}
