use data_encoding::HEXLOWER;
use mongodb::{bson::doc, Database};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::ledger::client::{LedgerClient, SubmitReceipt};
use crate::model::{
    common::sync::{EntityType, LedgerSyncState},
    db::{
        ballot::Ballot,
        candidacy::Candidacy,
        election::Election,
        sync_record::{NewSyncRecord, SyncRecordCore},
        voter::Voter,
    },
    mongodb::{is_duplicate_key_error, Coll, Id},
};

/// Mirrors store entities onto the ledger.
///
/// Every operation is idempotent: the stored on-chain id (or `tx_ref` for
/// ballots) is the marker, so re-running a sync that already completed is a
/// no-op returning the existing identifier. The bridge never retries
/// internally; retry policy belongs to the caller.
#[derive(Clone)]
pub struct LedgerBridge {
    client: LedgerClient,
}

impl LedgerBridge {
    pub fn new(client: LedgerClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &LedgerClient {
        &self.client
    }

    /// Mirror an election onto the ledger, returning its on-chain id.
    pub async fn sync_election(&self, db: &Database, election_id: Id) -> Result<String> {
        let elections = Coll::<Election>::from_db(db);
        let election = elections
            .find_one(election_id.as_doc(), None)
            .await?
            .ok_or_else(|| Error::not_found(format!("election {election_id}")))?;

        if let Some(on_chain_id) = election.on_chain_id.clone() {
            debug!("Election {election_id} already mirrored as {on_chain_id}");
            return Ok(on_chain_id);
        }

        let receipt = self
            .client
            .register_election(&election.name, election.start_time, election.end_time)
            .await?;
        let on_chain_id = Self::require_on_chain_id(&receipt)?;

        elections
            .update_one(
                election_id.as_doc(),
                doc! { "$set": { "on_chain_id": &on_chain_id } },
                None,
            )
            .await?;
        self.record(db, EntityType::Election, election_id, receipt)
            .await?;

        info!("Election {election_id} mirrored as {on_chain_id}");
        Ok(on_chain_id)
    }

    /// Mirror a candidacy onto the ledger, returning its on-chain id.
    ///
    /// The parent election must already be mirrored.
    pub async fn sync_candidacy(&self, db: &Database, candidacy_id: Id) -> Result<String> {
        let candidacies = Coll::<Candidacy>::from_db(db);
        let candidacy = candidacies
            .find_one(candidacy_id.as_doc(), None)
            .await?
            .ok_or_else(|| Error::not_found(format!("candidacy {candidacy_id}")))?;

        if let Some(on_chain_id) = candidacy.on_chain_id.clone() {
            debug!("Candidacy {candidacy_id} already mirrored as {on_chain_id}");
            return Ok(on_chain_id);
        }

        let election_chain_id = self
            .election_chain_id(db, candidacy.election_id)
            .await?;
        let address = self.voter_address(db, candidacy.voter_id).await?;
        let digest = HEXLOWER.encode(&Sha256::digest(candidacy.manifesto.as_bytes()));

        let receipt = self
            .client
            .register_candidacy(&election_chain_id, &address, &digest)
            .await?;
        let on_chain_id = Self::require_on_chain_id(&receipt)?;

        candidacies
            .update_one(
                candidacy_id.as_doc(),
                doc! { "$set": { "on_chain_id": &on_chain_id } },
                None,
            )
            .await?;
        self.record(db, EntityType::Candidacy, candidacy_id, receipt)
            .await?;

        info!("Candidacy {candidacy_id} mirrored as {on_chain_id}");
        Ok(on_chain_id)
    }

    /// Mirror a ballot onto the ledger, returning its transaction reference.
    ///
    /// The parent election and the voted-for candidacy must both already be
    /// mirrored. On failure the ballot is marked `Failed` so voters see an
    /// honest receipt, and the error propagates for the caller's retry
    /// policy; the ballot itself stays counted either way.
    pub async fn sync_ballot(&self, db: &Database, ballot_id: Id) -> Result<String> {
        let ballots = Coll::<Ballot>::from_db(db);
        let ballot = ballots
            .find_one(ballot_id.as_doc(), None)
            .await?
            .ok_or_else(|| Error::not_found(format!("ballot {ballot_id}")))?;

        if let Some(tx_ref) = ballot.tx_ref.clone() {
            debug!("Ballot {ballot_id} already mirrored as {tx_ref}");
            return Ok(tx_ref);
        }

        let election_chain_id = self.election_chain_id(db, ballot.election_id).await?;

        let candidacy = Coll::<Candidacy>::from_db(db)
            .find_one(ballot.candidacy_id.as_doc(), None)
            .await?
            .ok_or_else(|| Error::not_found(format!("candidacy {}", ballot.candidacy_id)))?;
        let candidacy_chain_id = candidacy
            .candidacy
            .on_chain_id
            .ok_or(Error::NotSynced(EntityType::Candidacy, candidacy.id))?;

        let address = self.voter_address(db, ballot.voter_id).await?;

        let submission = self
            .client
            .submit_ballot(&election_chain_id, &candidacy_chain_id, &address)
            .await;
        let receipt = match submission {
            Ok(receipt) => receipt,
            Err(err) => {
                warn!("Ballot {ballot_id} failed to mirror: {err}");
                // Best effort; the retrier will pick the ballot up again.
                let _ = ballots
                    .update_one(
                        ballot_id.as_doc(),
                        doc! { "$set": { "sync_state": LedgerSyncState::Failed } },
                        None,
                    )
                    .await;
                return Err(err);
            }
        };

        let tx_ref = receipt.tx_ref.clone();
        // Write-back first: a tx_ref with no matching record is the
        // reconciliation signal for operational tooling.
        ballots
            .update_one(
                ballot_id.as_doc(),
                doc! { "$set": {
                    "tx_ref": &tx_ref,
                    "sync_state": LedgerSyncState::Confirmed,
                } },
                None,
            )
            .await?;
        self.record(db, EntityType::Ballot, ballot_id, receipt)
            .await?;

        info!("Ballot {ballot_id} mirrored as {tx_ref}");
        Ok(tx_ref)
    }

    async fn election_chain_id(&self, db: &Database, election_id: Id) -> Result<String> {
        let election = Coll::<Election>::from_db(db)
            .find_one(election_id.as_doc(), None)
            .await?
            .ok_or_else(|| Error::not_found(format!("election {election_id}")))?;
        election
            .election
            .on_chain_id
            .ok_or(Error::NotSynced(EntityType::Election, election.id))
    }

    async fn voter_address(&self, db: &Database, voter_id: Id) -> Result<String> {
        let voter = Coll::<Voter>::from_db(db)
            .find_one(voter_id.as_doc(), None)
            .await?
            .ok_or_else(|| Error::not_found(format!("voter {voter_id}")))?;
        voter.voter.address.ok_or_else(|| {
            Error::Status(
                rocket::http::Status::PreconditionFailed,
                format!("voter {voter_id} has no ledger address"),
            )
        })
    }

    /// Append the audit row for an accepted submission.
    ///
    /// A duplicate `(entity_type, entity_id, tx_ref)` means the row already
    /// exists from an earlier attempt, so it is not an error.
    async fn record(
        &self,
        db: &Database,
        entity_type: EntityType,
        entity_id: Id,
        receipt: SubmitReceipt,
    ) -> Result<()> {
        let record = SyncRecordCore::new(
            entity_type,
            entity_id,
            receipt.on_chain_id,
            receipt.tx_ref,
            receipt.block_ref,
            receipt.status,
        );
        match Coll::<NewSyncRecord>::from_db(db)
            .insert_one(record, None)
            .await
        {
            Ok(_) => Ok(()),
            Err(err) if is_duplicate_key_error(&err) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn require_on_chain_id(receipt: &SubmitReceipt) -> Result<String> {
        receipt
            .on_chain_id
            .clone()
            .ok_or_else(|| Error::LedgerRejected("receipt missing on-chain id".to_string()))
    }
}
