use mongodb::bson::doc;
use rocket::{http::Status, serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    identity::IdentityDeriver,
    ledger::LedgerBridge,
    model::{
        api::{auth::AuthToken, voter::VoterView},
        db::Voter,
        mongodb::Coll,
    },
};

pub fn routes() -> Vec<Route> {
    routes![get_voter, generate_address, get_balance]
}

/// The authenticated voter's own profile.
#[get("/voter")]
async fn get_voter(token: AuthToken<Voter>, voters: Coll<Voter>) -> Result<Json<VoterView>> {
    let voter = voters
        .find_one(token.id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Voter {}", token.id)))?;
    Ok(Json(voter.into()))
}

/// Backfill the voter's ledger address.
///
/// Registration derives the address up front, so this only does work for
/// rows that predate derivation. Idempotent: an existing address is returned
/// unchanged, never re-derived.
#[post("/voter/address")]
async fn generate_address(
    token: AuthToken<Voter>,
    voters: Coll<Voter>,
    deriver: &State<IdentityDeriver>,
) -> Result<Json<VoterView>> {
    let voter = voters
        .find_one(token.id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Voter {}", token.id)))?;

    if voter.address.is_some() {
        return Ok(Json(voter.into()));
    }

    let identity = deriver.derive(&voter.email, &voter.name)?;
    voters
        .update_one(
            token.id.as_doc(),
            doc! { "$set": { "address": identity.address() } },
            None,
        )
        .await?;
    let updated = voters.find_one(token.id.as_doc(), None).await?.unwrap();
    Ok(Json(updated.into()))
}

/// The ledger balance of the voter's address. Informational only; ledger
/// failures read as zero.
#[get("/voter/balance")]
async fn get_balance(
    token: AuthToken<Voter>,
    voters: Coll<Voter>,
    bridge: &State<LedgerBridge>,
) -> Result<Json<u64>> {
    let voter = voters
        .find_one(token.id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Voter {}", token.id)))?;
    let address = voter.voter.address.ok_or_else(|| {
        Error::Status(
            Status::PreconditionFailed,
            "Voter has no ledger address".to_string(),
        )
    })?;
    Ok(Json(bridge.client().get_balance(&address).await))
}

#[cfg(test)]
mod tests {
    use mongodb::Database;
    use rocket::{local::asynchronous::Client, serde::json::serde_json};

    use crate::{
        identity::is_valid_address,
        model::{api::voter::VoterRegistration, db::VoterCore},
    };

    use super::*;

    #[backend_test(voter)]
    async fn voters_see_their_own_profile(client: Client) {
        let response = client.get(uri!(get_voter)).dispatch().await;
        assert_eq!(Status::Ok, response.status());

        let view: VoterView =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(view.email, VoterRegistration::example().email);
        assert!(is_valid_address(view.address.as_deref().unwrap()));
    }

    #[backend_test(voter)]
    async fn address_backfill_is_idempotent(client: Client, db: Database) {
        // Simulate a voter row that predates address derivation.
        let voters = Coll::<Voter>::from_db(&db);
        voters
            .update_many(doc! {}, doc! { "$unset": { "address": "" } }, None)
            .await
            .unwrap();

        let response = client.post(uri!(generate_address)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let view: VoterView =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        let first_address = view.address.unwrap();
        assert!(is_valid_address(&first_address));

        // A second call returns the same address.
        let response = client.post(uri!(generate_address)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let view: VoterView =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(view.address.as_deref(), Some(first_address.as_str()));

        // And the stored row agrees.
        let stored = voters
            .find_one(
                VoterCore::email_filter(&VoterRegistration::example().email),
                None,
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.address.as_deref(), Some(first_address.as_str()));
    }

    #[backend_test(voter)]
    async fn balance_without_an_address_is_a_precondition_failure(client: Client, db: Database) {
        Coll::<Voter>::from_db(&db)
            .update_many(doc! {}, doc! { "$unset": { "address": "" } }, None)
            .await
            .unwrap();

        let response = client.get(uri!(get_balance)).dispatch().await;
        assert_eq!(Status::PreconditionFailed, response.status());
    }

    #[backend_test(voter)]
    async fn unreachable_ledgers_read_as_zero(client: Client) {
        // The test ledger URL has nothing behind it.
        let response = client.get(uri!(get_balance)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let balance: u64 =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(balance, 0);
    }
}
