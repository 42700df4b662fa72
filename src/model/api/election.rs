use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::{
    api::id::ApiId,
    common::election::ElectionStatus,
    db::election::{Election, NewElection},
};

/// An election specification, received from an administrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionSpec {
    pub name: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl TryFrom<ElectionSpec> for NewElection {
    type Error = Error;

    /// Convert an [`ElectionSpec`] into a storable election, enforcing that
    /// the name is non-empty and the voting window is non-degenerate.
    fn try_from(spec: ElectionSpec) -> Result<Self, Self::Error> {
        if spec.name.trim().is_empty() {
            return Err(Error::Validation("name must not be empty".to_string()));
        }
        if spec.end_time <= spec.start_time {
            return Err(Error::Validation(format!(
                "end time {} must be after start time {}",
                spec.end_time, spec.start_time
            )));
        }
        Ok(Self {
            name: spec.name,
            description: spec.description,
            start_time: spec.start_time,
            end_time: spec.end_time,
            on_chain_id: None,
        })
    }
}

/// An election as seen via the API, with its derived status.
#[derive(Debug, Serialize, Deserialize)]
pub struct ElectionView {
    pub id: ApiId,
    pub name: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: ElectionStatus,
    pub on_chain_id: Option<String>,
}

impl From<Election> for ElectionView {
    fn from(election: Election) -> Self {
        let status = election.status();
        Self {
            id: election.id.into(),
            name: election.election.name,
            description: election.election.description,
            start_time: election.election.start_time,
            end_time: election.election.end_time,
            status,
            on_chain_id: election.election.on_chain_id,
        }
    }
}
