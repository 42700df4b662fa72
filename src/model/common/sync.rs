use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use mongodb::bson::Bson;
use rocket::request::FromParam;
use serde::{Deserialize, Serialize};

/// The kinds of entity that get mirrored to the ledger.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Election,
    Candidacy,
    Ballot,
}

impl Display for EntityType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Election => write!(f, "election"),
            Self::Candidacy => write!(f, "candidacy"),
            Self::Ballot => write!(f, "ballot"),
        }
    }
}

impl FromStr for EntityType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "election" => Ok(Self::Election),
            "candidacy" => Ok(Self::Candidacy),
            "ballot" => Ok(Self::Ballot),
            _ => Err(()),
        }
    }
}

impl<'a> FromParam<'a> for EntityType {
    type Error = ();

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        param.parse()
    }
}

impl From<EntityType> for Bson {
    fn from(entity_type: EntityType) -> Self {
        Bson::String(entity_type.to_string())
    }
}

/// What the ledger said when we submitted an entity.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOutcome {
    /// The ledger accepted the submission into its mempool.
    Accepted,
    /// The ledger reported the transaction included in a block.
    Included,
}

/// Where a ballot sits relative to the ledger.
///
/// `Pending` until the first submission attempt resolves; a ballot is counted
/// locally regardless of this state, which only affects what voters see on
/// their receipt.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerSyncState {
    Pending,
    Confirmed,
    Failed,
}

impl From<LedgerSyncState> for Bson {
    fn from(state: LedgerSyncState) -> Self {
        // Never fails for a unit enum variant.
        mongodb::bson::to_bson(&state).unwrap()
    }
}
