use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{
    common::sync::{EntityType, SyncOutcome},
    mongodb::Id,
};

/// Core sync record data, as stored in the database.
///
/// One row per accepted ledger submission, append-only. Rows are never
/// updated or deleted; a re-submission of the same entity produces a new row
/// with a new `tx_ref`.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecordCore {
    pub entity_type: EntityType,
    pub entity_id: Id,
    /// The ledger-side identifier, where the entity kind has one.
    pub on_chain_id: Option<String>,
    pub tx_ref: String,
    /// The block the transaction landed in, if the ledger reported one.
    pub block_ref: Option<String>,
    pub outcome: SyncOutcome,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub recorded_at: DateTime<Utc>,
}

impl SyncRecordCore {
    /// A record of a submission accepted just now.
    pub fn new(
        entity_type: EntityType,
        entity_id: Id,
        on_chain_id: Option<String>,
        tx_ref: String,
        block_ref: Option<String>,
        outcome: SyncOutcome,
    ) -> Self {
        Self {
            entity_type,
            entity_id,
            on_chain_id,
            tx_ref,
            block_ref,
            outcome,
            recorded_at: Utc::now(),
        }
    }
}

/// A sync record without an ID.
pub type NewSyncRecord = SyncRecordCore;

/// A sync record from the database, with its unique ID.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecord {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub record: SyncRecordCore,
}

impl Deref for SyncRecord {
    type Target = SyncRecordCore;

    fn deref(&self) -> &Self::Target {
        &self.record
    }
}
