use mongodb::{bson::doc, options::FindOptions, Database};
use rocket::{futures::TryStreamExt, serde::json::Json, Route, State};

use crate::{
    error::Result,
    ledger::LedgerBridge,
    model::{
        api::{auth::AuthToken, sync::SyncRecordView},
        common::sync::EntityType,
        db::{Admin, SyncRecord},
        mongodb::{Coll, Id},
    },
};

pub fn routes() -> Vec<Route> {
    routes![
        sync_election,
        sync_candidacy,
        sync_ballot,
        get_sync_records,
    ]
}

/// Mirror an election onto the ledger now, returning its on-chain id.
///
/// Idempotent: an already-mirrored election returns its existing id without
/// another submission.
#[post("/sync/elections/<election_id>")]
async fn sync_election(
    _token: AuthToken<Admin>,
    election_id: Id,
    db: &State<Database>,
    bridge: &State<LedgerBridge>,
) -> Result<Json<String>> {
    Ok(Json(bridge.sync_election(db, election_id).await?))
}

/// Mirror a candidacy onto the ledger now, returning its on-chain id.
#[post("/sync/candidacies/<candidacy_id>")]
async fn sync_candidacy(
    _token: AuthToken<Admin>,
    candidacy_id: Id,
    db: &State<Database>,
    bridge: &State<LedgerBridge>,
) -> Result<Json<String>> {
    Ok(Json(bridge.sync_candidacy(db, candidacy_id).await?))
}

/// Mirror a ballot onto the ledger now, returning its transaction reference.
#[post("/sync/ballots/<ballot_id>")]
async fn sync_ballot(
    _token: AuthToken<Admin>,
    ballot_id: Id,
    db: &State<Database>,
    bridge: &State<LedgerBridge>,
) -> Result<Json<String>> {
    Ok(Json(bridge.sync_ballot(db, ballot_id).await?))
}

/// The audit trail for one entity, oldest first.
#[get("/sync/records/<entity_type>/<entity_id>")]
async fn get_sync_records(
    _token: AuthToken<Admin>,
    entity_type: EntityType,
    entity_id: Id,
    records: Coll<SyncRecord>,
) -> Result<Json<Vec<SyncRecordView>>> {
    let filter = doc! {
        "entity_type": entity_type,
        "entity_id": entity_id,
    };
    let options = FindOptions::builder().sort(doc! { "recorded_at": 1 }).build();
    let trail: Vec<SyncRecord> = records.find(filter, options).await?.try_collect().await?;
    Ok(Json(trail.into_iter().map(Into::into).collect()))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::Status,
        local::asynchronous::Client,
        serde::json::serde_json,
    };

    use crate::{
        error::Error,
        ledger::LedgerClient,
        model::{
            common::{candidacy::CandidacyStatus, sync::SyncOutcome},
            db::{
                CandidacyCore, ElectionCore, NewCandidacy, NewElection, NewSyncRecord, NewVoter,
                SyncRecordCore, VoterCore,
            },
        },
    };

    use super::*;

    const VOTER_ADDRESS: &str = "0xa234567890123456789012345678901234567890";

    #[backend_test(admin)]
    async fn syncing_nothing_is_not_found(client: Client) {
        let response = client
            .post(uri!(sync_election(Id::new())))
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test(admin)]
    async fn unreachable_ledgers_are_unavailable(client: Client, db: Database) {
        // The test ledger URL has nothing behind it.
        let election_id = insert_election(&db, ElectionCore::example()).await;
        let response = client
            .post(uri!(sync_election(election_id)))
            .dispatch()
            .await;
        assert_eq!(Status::ServiceUnavailable, response.status());

        // Nothing was written back.
        let election = Coll::<crate::model::db::Election>::from_db(&db)
            .find_one(election_id.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(election.on_chain_id, None);
    }

    #[backend_test]
    async fn election_sync_round_trips_and_is_idempotent(db: Database) {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/elections")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"on_chain_id": "el-1", "tx_ref": "0xaaa", "block_ref": null, "status": "accepted"}"#,
            )
            .expect(1)
            .create_async()
            .await;
        let bridge = bridge_for(&server);

        let election_id = insert_election(&db, ElectionCore::example()).await;

        let on_chain_id = bridge.sync_election(&db, election_id).await.unwrap();
        assert_eq!(on_chain_id, "el-1");

        // The id was written back and one record appended.
        let election = Coll::<crate::model::db::Election>::from_db(&db)
            .find_one(election_id.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(election.on_chain_id.as_deref(), Some("el-1"));
        let records = records_for(&db, EntityType::Election, election_id).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].outcome, SyncOutcome::Accepted);

        // Syncing again is a no-op: same id, no second submission, no second
        // record.
        let again = bridge.sync_election(&db, election_id).await.unwrap();
        assert_eq!(again, "el-1");
        let records = records_for(&db, EntityType::Election, election_id).await;
        assert_eq!(records.len(), 1);
        mock.assert_async().await;
    }

    #[backend_test]
    async fn candidacy_sync_requires_the_election_first(db: Database) {
        let server = mockito::Server::new_async().await;
        let bridge = bridge_for(&server);

        let election_id = insert_election(&db, ElectionCore::example()).await;
        let voter_id = insert_voter_with_address(&db).await;
        let candidacy_id = insert_candidacy(
            &db,
            CandidacyCore {
                status: CandidacyStatus::Approved,
                ..CandidacyCore::example(voter_id, election_id)
            },
        )
        .await;

        let err = bridge.sync_candidacy(&db, candidacy_id).await.unwrap_err();
        assert!(matches!(err, Error::NotSynced(EntityType::Election, _)));
    }

    #[backend_test]
    async fn ballot_sync_attaches_the_tx_ref(db: Database) {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v1/elections")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"on_chain_id": "el-1", "tx_ref": "0xaaa", "block_ref": null, "status": "accepted"}"#,
            )
            .create_async()
            .await;
        server
            .mock("POST", "/api/v1/candidacies")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"on_chain_id": "ca-1", "tx_ref": "0xbbb", "block_ref": null, "status": "accepted"}"#,
            )
            .create_async()
            .await;
        server
            .mock("POST", "/api/v1/ballots")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"on_chain_id": null, "tx_ref": "0xccc", "block_ref": "0xb9", "status": "included"}"#,
            )
            .create_async()
            .await;
        let bridge = bridge_for(&server);

        let election_id = insert_election(&db, ElectionCore::example()).await;
        let voter_id = insert_voter_with_address(&db).await;
        let candidacy_id = insert_candidacy(
            &db,
            CandidacyCore {
                status: CandidacyStatus::Approved,
                ..CandidacyCore::example(voter_id, election_id)
            },
        )
        .await;
        let ballot_id = Coll::<crate::model::db::NewBallot>::from_db(&db)
            .insert_one(
                crate::model::db::BallotCore::new(voter_id, election_id, candidacy_id),
                None,
            )
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
            .into();

        bridge.sync_election(&db, election_id).await.unwrap();
        bridge.sync_candidacy(&db, candidacy_id).await.unwrap();
        let tx_ref = bridge.sync_ballot(&db, ballot_id).await.unwrap();
        assert_eq!(tx_ref, "0xccc");

        let ballot = Coll::<crate::model::db::Ballot>::from_db(&db)
            .find_one(ballot_id.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ballot.tx_ref.as_deref(), Some("0xccc"));
        let records = records_for(&db, EntityType::Ballot, ballot_id).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].outcome, SyncOutcome::Included);
    }

    #[backend_test(admin)]
    async fn record_trails_are_listed_per_entity(client: Client, db: Database) {
        let election_id = Id::new();
        let records = Coll::<NewSyncRecord>::from_db(&db);
        records
            .insert_one(
                SyncRecordCore::new(
                    EntityType::Election,
                    election_id,
                    Some("el-1".to_string()),
                    "0xaaa".to_string(),
                    None,
                    SyncOutcome::Accepted,
                ),
                None,
            )
            .await
            .unwrap();
        // A record for a different entity stays out of the listing.
        records
            .insert_one(
                SyncRecordCore::new(
                    EntityType::Ballot,
                    Id::new(),
                    None,
                    "0xbbb".to_string(),
                    None,
                    SyncOutcome::Included,
                ),
                None,
            )
            .await
            .unwrap();

        let response = client
            .get(format!("/sync/records/election/{}", election_id))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let trail: Vec<SyncRecordView> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].tx_ref, "0xaaa");
        assert_eq!(*trail[0].entity_id, election_id);
    }

    fn bridge_for(server: &mockito::ServerGuard) -> LedgerBridge {
        LedgerBridge::new(LedgerClient::new(
            &server.url(),
            std::time::Duration::from_secs(2),
        ))
    }

    async fn records_for(db: &Database, entity_type: EntityType, entity_id: Id) -> Vec<SyncRecord> {
        Coll::<SyncRecord>::from_db(db)
            .find(
                doc! { "entity_type": entity_type, "entity_id": entity_id },
                None,
            )
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap()
    }

    async fn insert_election(db: &Database, election: ElectionCore) -> Id {
        Coll::<NewElection>::from_db(db)
            .insert_one(election, None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
            .into()
    }

    async fn insert_candidacy(db: &Database, candidacy: CandidacyCore) -> Id {
        Coll::<NewCandidacy>::from_db(db)
            .insert_one(candidacy, None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
            .into()
    }

    async fn insert_voter_with_address(db: &Database) -> Id {
        let voter = VoterCore {
            address: Some(VOTER_ADDRESS.to_string()),
            ..VoterCore::example()
        };
        Coll::<NewVoter>::from_db(db)
            .insert_one(voter, None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
            .into()
    }
}
