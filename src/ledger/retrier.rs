use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use mongodb::{bson::doc, error::Error as DbError, Database};
use rocket::{
    fairing::{Fairing, Info, Kind},
    futures::{
        future::{BoxFuture, FutureExt},
        TryStreamExt,
    },
    tokio::sync::Mutex,
    Orbit, Rocket,
};

use crate::{
    config::Config,
    error::Error,
    ledger::LedgerBridge,
    model::{
        common::{candidacy::CandidacyStatus, sync::EntityType},
        db::{Ballot, Candidacy, Election},
        mongodb::{Coll, Id},
    },
    scheduled_task::ScheduledTask,
};

/// Map from entities to in-flight retry tasks.
type TaskMap = HashMap<(EntityType, Id), ScheduledTask<Result<String, Error>>>;

/// Background retrier for entities that are not mirrored on the ledger yet.
///
/// Each sweep scans the store for elections and approved candidacies without
/// an on-chain id and ballots without a transaction reference, and schedules
/// one retry task per entity. A task attempts the sync exactly once and then
/// removes itself; whatever still isn't mirrored gets picked up by the next
/// sweep. All retries go through the idempotent [`LedgerBridge`], so sweeping
/// an entity that completed in the meantime is a no-op.
pub struct SyncRetrier {
    tasks: Arc<Mutex<TaskMap>>,
    sweep: Arc<Mutex<Option<ScheduledTask<()>>>>,
}

impl SyncRetrier {
    /// Create a retrier with no scheduled work.
    pub fn new() -> Self {
        Self {
            tasks: Default::default(),
            sweep: Default::default(),
        }
    }

    /// Run one sweep now and schedule recurring sweeps every `interval`.
    pub async fn start(&self, bridge: LedgerBridge, db: Database, interval: Duration) {
        match self.schedule_pending(&bridge, &db).await {
            Ok(scheduled) => info!("Initial sync sweep scheduled {scheduled} retries"),
            Err(e) => error!("Initial sync sweep failed to scan the database: {e}"),
        }
        let next = Self::sweep(
            bridge,
            db,
            interval,
            self.tasks.clone(),
            self.sweep.clone(),
        );
        let task = ScheduledTask::new(next, Utc::now() + interval);
        *self.sweep.lock().await = Some(task);
    }

    /// Schedule a retry task for every unsynced entity, skipping entities
    /// with a retry already in flight. Returns the number of tasks scheduled.
    pub async fn schedule_pending(
        &self,
        bridge: &LedgerBridge,
        db: &Database,
    ) -> Result<usize, DbError> {
        let mut pending = Vec::new();

        let elections: Vec<Election> = Coll::<Election>::from_db(db)
            .find(doc! { "on_chain_id": null }, None)
            .await?
            .try_collect()
            .await?;
        pending.extend(
            elections
                .iter()
                .map(|election| (EntityType::Election, election.id)),
        );

        // Only approved candidacies get mirrored.
        let candidacy_filter = doc! {
            "on_chain_id": null,
            "status": CandidacyStatus::Approved,
        };
        let candidacies: Vec<Candidacy> = Coll::<Candidacy>::from_db(db)
            .find(candidacy_filter, None)
            .await?
            .try_collect()
            .await?;
        pending.extend(
            candidacies
                .iter()
                .map(|candidacy| (EntityType::Candidacy, candidacy.id)),
        );

        let ballots: Vec<Ballot> = Coll::<Ballot>::from_db(db)
            .find(doc! { "tx_ref": null }, None)
            .await?
            .try_collect()
            .await?;
        pending.extend(ballots.iter().map(|ballot| (EntityType::Ballot, ballot.id)));

        let mut scheduled = 0;
        let mut tasks_locked = self.tasks.lock().await;
        for key in pending {
            if tasks_locked.contains_key(&key) {
                continue;
            }
            let attempt = Self::attempt(bridge.clone(), db.clone(), key, self.tasks.clone());
            tasks_locked.insert(key, ScheduledTask::new(attempt, Utc::now()));
            scheduled += 1;
        }
        Ok(scheduled)
    }

    /// Is a retry currently in flight for the given entity?
    pub async fn has_task(&self, entity_type: EntityType, entity_id: Id) -> bool {
        self.tasks.lock().await.contains_key(&(entity_type, entity_id))
    }

    /// Wait for every in-flight retry task to resolve.
    pub async fn finish(&self) {
        loop {
            let task = {
                let mut tasks_locked = self.tasks.lock().await;
                let key = tasks_locked.keys().next().copied();
                key.and_then(|key| tasks_locked.remove(&key))
            };
            match task {
                Some(task) => {
                    let _ = task.await;
                }
                None => break,
            }
        }
    }

    /// Cancel the recurring sweep and every in-flight retry task.
    pub async fn stop(&self) {
        if let Some(sweep) = self.sweep.lock().await.take() {
            sweep.cancel().await;
        }
        let tasks: Vec<_> = {
            let mut tasks_locked = self.tasks.lock().await;
            tasks_locked.drain().map(|(_, task)| task).collect()
        };
        for task in tasks {
            task.cancel().await;
        }
    }

    /// Attempt a single sync and remove the task from the map, whatever the
    /// outcome. Failures are left for the next sweep rather than retried
    /// in place.
    async fn attempt(
        bridge: LedgerBridge,
        db: Database,
        key: (EntityType, Id),
        tasks: Arc<Mutex<TaskMap>>,
    ) -> Result<String, Error> {
        let (entity_type, entity_id) = key;
        let result = match entity_type {
            EntityType::Election => bridge.sync_election(&db, entity_id).await,
            EntityType::Candidacy => bridge.sync_candidacy(&db, entity_id).await,
            EntityType::Ballot => bridge.sync_ballot(&db, entity_id).await,
        };
        match &result {
            Ok(chain_ref) => debug!("Retried {entity_type} {entity_id}, mirrored as {chain_ref}"),
            Err(e) => debug!("Retry for {entity_type} {entity_id} failed, leaving for next sweep: {e}"),
        }
        tasks.lock().await.remove(&key);
        result
    }

    /// One recurring sweep. Since this is a recursive async function, we must
    /// use `BoxFuture` to avoid an infinitely-recursive state machine.
    fn sweep(
        bridge: LedgerBridge,
        db: Database,
        interval: Duration,
        tasks: Arc<Mutex<TaskMap>>,
        sweep_handle: Arc<Mutex<Option<ScheduledTask<()>>>>,
    ) -> BoxFuture<'static, ()> {
        async move {
            let retrier = SyncRetrier {
                tasks: tasks.clone(),
                sweep: sweep_handle.clone(),
            };
            match retrier.schedule_pending(&bridge, &db).await {
                Ok(0) => trace!("Sync sweep had nothing to do"),
                Ok(scheduled) => info!("Sync sweep scheduled {scheduled} retries"),
                Err(e) => error!("Sync sweep failed to scan the database: {e}"),
            }

            // Re-schedule the sweep.
            let next = Self::sweep(bridge, db, interval, tasks, sweep_handle.clone());
            let task = ScheduledTask::new(next, Utc::now() + interval);
            *sweep_handle.lock().await = Some(task);
        }
        .boxed()
    }
}

impl Default for SyncRetrier {
    fn default() -> Self {
        Self::new()
    }
}

/// A fairing that starts the sync retrier at liftoff. Depends on the
/// database, the ledger bridge and the config being in managed state.
pub struct SyncRetrierFairing;

#[rocket::async_trait]
impl Fairing for SyncRetrierFairing {
    fn info(&self) -> Info {
        Info {
            name: "Sync Retrier",
            kind: Kind::Liftoff,
        }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        // Unwraps safe: the ignite fairings either managed these or aborted
        // the launch.
        let db = rocket.state::<Database>().unwrap().clone();
        let bridge = rocket.state::<LedgerBridge>().unwrap().clone();
        let interval = rocket.state::<Config>().unwrap().sync_retry_interval();

        info!("Starting the sync retrier...");
        let retrier = SyncRetrier::new();
        retrier.start(bridge, db, interval).await;
        info!("...sync retrier running");
    }
}

#[cfg(test)]
mod tests {
    use rocket::serde::json::serde_json;

    use crate::{
        ledger::LedgerClient,
        model::{
            common::sync::LedgerSyncState,
            db::{BallotCore, CandidacyCore, ElectionCore, NewBallot, NewCandidacy, NewElection, NewVoter, VoterCore},
        },
    };

    use super::*;

    const VOTER_ADDRESS: &str = "0xa234567890123456789012345678901234567890";

    #[backend_test]
    async fn sweeps_mirror_everything_bottom_up(db: Database) {
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
        let bridge = LedgerBridge::new(LedgerClient::new(
            &server.url(),
            std::time::Duration::from_secs(2),
        ));

        // An unsynced election with an approved candidacy and a cast ballot.
        let election_id = insert_election(&db).await;
        let voter_id = insert_voter(&db).await;
        let candidacy_id = insert_candidacy(&db, voter_id, election_id).await;
        let ballot_id = insert_ballot(&db, voter_id, election_id, candidacy_id).await;

        let retrier = SyncRetrier::new();

        // First sweep: the election mirrors; the candidacy and ballot lose
        // the race against their parents and wait for the next sweep.
        let scheduled = retrier.schedule_pending(&bridge, &db).await.unwrap();
        assert_eq!(scheduled, 3);
        retrier.finish().await;

        let election = Coll::<Election>::from_db(&db)
            .find_one(election_id.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(election.on_chain_id.as_deref(), Some("el-1"));

        // Second sweep mirrors the candidacy (and possibly the ballot).
        retrier.schedule_pending(&bridge, &db).await.unwrap();
        retrier.finish().await;
        let candidacy = Coll::<Candidacy>::from_db(&db)
            .find_one(candidacy_id.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(candidacy.on_chain_id.as_deref(), Some("ca-1"));

        // Third sweep leaves nothing behind.
        retrier.schedule_pending(&bridge, &db).await.unwrap();
        retrier.finish().await;
        let ballot = Coll::<Ballot>::from_db(&db)
            .find_one(ballot_id.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ballot.tx_ref.as_deref(), Some("0xccc"));
        assert_eq!(ballot.sync_state, LedgerSyncState::Confirmed);

        let scheduled = retrier.schedule_pending(&bridge, &db).await.unwrap();
        assert_eq!(scheduled, 0);
    }

    #[backend_test]
    async fn failed_retries_wait_for_the_next_sweep(db: Database) {
        // Nothing listens on port 1.
        let bridge = LedgerBridge::new(LedgerClient::new(
            "http://127.0.0.1:1",
            std::time::Duration::from_millis(200),
        ));
        let election_id = insert_election(&db).await;

        let retrier = SyncRetrier::new();
        let scheduled = retrier.schedule_pending(&bridge, &db).await.unwrap();
        assert_eq!(scheduled, 1);
        retrier.finish().await;

        // Still unsynced, so the next sweep picks it up again.
        assert!(!retrier.has_task(EntityType::Election, election_id).await);
        let scheduled = retrier.schedule_pending(&bridge, &db).await.unwrap();
        assert_eq!(scheduled, 1);
        retrier.stop().await;
    }

    #[backend_test]
    async fn pending_candidacies_are_not_mirrored(db: Database) {
        let bridge = LedgerBridge::new(LedgerClient::new(
            "http://127.0.0.1:1",
            std::time::Duration::from_millis(200),
        ));
        let election_id = insert_election(&db).await;
        let voter_id = insert_voter(&db).await;
        // A pending candidacy must not be scheduled.
        Coll::<NewCandidacy>::from_db(&db)
            .insert_one(CandidacyCore::example(voter_id, election_id), None)
            .await
            .unwrap();

        let retrier = SyncRetrier::new();
        let scheduled = retrier.schedule_pending(&bridge, &db).await.unwrap();
        // Only the election.
        assert_eq!(scheduled, 1);
        retrier.stop().await;
    }

    async fn insert_election(db: &Database) -> Id {
        Coll::<NewElection>::from_db(db)
            .insert_one(ElectionCore::example(), None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
            .into()
    }

    async fn insert_voter(db: &Database) -> Id {
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

    async fn insert_candidacy(db: &Database, voter_id: Id, election_id: Id) -> Id {
        let candidacy = CandidacyCore {
            status: CandidacyStatus::Approved,
            ..CandidacyCore::example(voter_id, election_id)
        };
        Coll::<NewCandidacy>::from_db(db)
            .insert_one(candidacy, None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
            .into()
    }

    async fn insert_ballot(db: &Database, voter_id: Id, election_id: Id, candidacy_id: Id) -> Id {
        Coll::<NewBallot>::from_db(db)
            .insert_one(BallotCore::new(voter_id, election_id, candidacy_id), None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
            .into()
    }
}
