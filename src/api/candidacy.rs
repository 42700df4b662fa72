use mongodb::{bson::doc, options::FindOptions};
use rocket::{futures::TryStreamExt, serde::json::Json, Route};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::AuthToken,
            candidacy::{CandidacyApplication, CandidacyView, ReviewDecision},
        },
        common::election::ElectionStatus,
        db::{Admin, Candidacy, CandidacyCore, Election, NewCandidacy, Voter},
        mongodb::{is_duplicate_key_error, Coll, Id},
    },
};

pub fn routes() -> Vec<Route> {
    routes![apply, get_candidacies, review_candidacy]
}

/// Apply to stand in an election.
///
/// Applications are accepted while the election is planned or open; the
/// unique index on `(voter_id, election_id)` rejects a second application.
#[post("/elections/<election_id>/candidacies", data = "<application>", format = "json")]
async fn apply(
    token: AuthToken<Voter>,
    election_id: Id,
    application: Json<CandidacyApplication>,
    elections: Coll<Election>,
    candidacies: Coll<Candidacy>,
    new_candidacies: Coll<NewCandidacy>,
) -> Result<Json<CandidacyView>> {
    application.validate()?;

    let election = elections
        .find_one(election_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {}", election_id)))?;
    if election.status() == ElectionStatus::Closed {
        return Err(Error::ElectionLocked(election_id));
    }

    let candidacy = CandidacyCore::new(token.id, election_id, application.0.manifesto);
    let new_id: Id = match new_candidacies.insert_one(&candidacy, None).await {
        Ok(insertion) => insertion
            .inserted_id
            .as_object_id()
            .unwrap() // Safe because the ID comes directly from the database.
            .into(),
        Err(err) if is_duplicate_key_error(&err) => {
            return Err(Error::DuplicateCandidacy(election_id));
        }
        Err(err) => return Err(err.into()),
    };

    let db_candidacy = candidacies.find_one(new_id.as_doc(), None).await?.unwrap();
    Ok(Json(db_candidacy.into()))
}

/// All candidacies for an election, pending ones included, for review.
#[get("/elections/<election_id>/candidacies")]
async fn get_candidacies(
    _token: AuthToken<Admin>,
    election_id: Id,
    candidacies: Coll<Candidacy>,
) -> Result<Json<Vec<CandidacyView>>> {
    let filter = doc! {
        "election_id": election_id,
    };
    let options = FindOptions::builder().sort(doc! { "_id": 1 }).build();
    let list: Vec<Candidacy> = candidacies.find(filter, options).await?.try_collect().await?;
    Ok(Json(list.into_iter().map(Into::into).collect()))
}

/// Approve or reject a candidacy.
///
/// Repeating the current decision is a no-op; a different decision
/// overwrites it. Once the election has closed the candidate set is fixed.
#[post("/candidacies/<candidacy_id>/review", data = "<decision>", format = "json")]
async fn review_candidacy(
    _token: AuthToken<Admin>,
    candidacy_id: Id,
    decision: Json<ReviewDecision>,
    candidacies: Coll<Candidacy>,
    elections: Coll<Election>,
) -> Result<Json<CandidacyView>> {
    decision.validate()?;

    let candidacy = candidacies
        .find_one(candidacy_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Candidacy {}", candidacy_id)))?;

    let election = elections
        .find_one(candidacy.election_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {}", candidacy.election_id)))?;
    if election.status() == ElectionStatus::Closed {
        return Err(Error::ElectionLocked(election.id));
    }

    if candidacy.status == decision.status {
        return Ok(Json(candidacy.into()));
    }

    candidacies
        .update_one(
            candidacy_id.as_doc(),
            doc! { "$set": { "status": decision.status } },
            None,
        )
        .await?;
    let updated = candidacies
        .find_one(candidacy_id.as_doc(), None)
        .await?
        .unwrap();
    Ok(Json(updated.into()))
}
