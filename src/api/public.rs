use mongodb::{bson::doc, options::FindOptions};
use rocket::{futures::TryStreamExt, serde::json::Json, Route};

use crate::error::{Error, Result};
use crate::model::{
    api::{candidacy::CandidacyView, election::ElectionView},
    common::{candidacy::CandidacyStatus, election::ElectionStatus},
    db::{Candidacy, Election},
    mongodb::{Coll, Id},
};

pub fn routes() -> Vec<Route> {
    routes![get_elections, get_election, get_election_status, get_candidates]
}

/// All elections, with their statuses as of now.
#[get("/elections")]
async fn get_elections(elections: Coll<Election>) -> Result<Json<Vec<ElectionView>>> {
    let options = FindOptions::builder().sort(doc! { "start_time": 1 }).build();
    let list: Vec<Election> = elections.find(None, options).await?.try_collect().await?;
    Ok(Json(list.into_iter().map(Into::into).collect()))
}

#[get("/elections/<election_id>")]
async fn get_election(election_id: Id, elections: Coll<Election>) -> Result<Json<ElectionView>> {
    let election = elections
        .find_one(election_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {}", election_id)))?;
    Ok(Json(election.into()))
}

#[get("/elections/<election_id>/status")]
async fn get_election_status(
    election_id: Id,
    elections: Coll<Election>,
) -> Result<Json<ElectionStatus>> {
    let election = elections
        .find_one(election_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {}", election_id)))?;
    Ok(Json(election.status()))
}

/// The ballot-eligible candidates of an election.
///
/// Sorted by candidacy id ascending so every voter sees the same ordering.
#[get("/elections/<election_id>/candidates")]
async fn get_candidates(
    election_id: Id,
    elections: Coll<Election>,
    candidacies: Coll<Candidacy>,
) -> Result<Json<Vec<CandidacyView>>> {
    // 404 on unknown elections rather than an empty list.
    elections
        .find_one(election_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {}", election_id)))?;

    let filter = doc! {
        "election_id": election_id,
        "status": CandidacyStatus::Approved,
    };
    let options = FindOptions::builder().sort(doc! { "_id": 1 }).build();
    let approved: Vec<Candidacy> = candidacies
        .find(filter, options)
        .await?
        .try_collect()
        .await?;
    Ok(Json(approved.into_iter().map(Into::into).collect()))
}
