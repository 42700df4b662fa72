use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::id::ApiId,
    common::sync::{EntityType, SyncOutcome},
    db::sync_record::SyncRecord,
};

/// A sync record as seen via the API.
#[derive(Debug, Serialize, Deserialize)]
pub struct SyncRecordView {
    pub id: ApiId,
    pub entity_type: EntityType,
    pub entity_id: ApiId,
    pub on_chain_id: Option<String>,
    pub tx_ref: String,
    pub block_ref: Option<String>,
    pub outcome: SyncOutcome,
    pub recorded_at: DateTime<Utc>,
}

impl From<SyncRecord> for SyncRecordView {
    fn from(record: SyncRecord) -> Self {
        Self {
            id: record.id.into(),
            entity_type: record.record.entity_type,
            entity_id: record.record.entity_id.into(),
            on_chain_id: record.record.on_chain_id,
            tx_ref: record.record.tx_ref,
            block_ref: record.record.block_ref,
            outcome: record.record.outcome,
            recorded_at: record.record.recorded_at,
        }
    }
}
