use mongodb::bson::doc;
use rocket::{
    http::{Cookie, CookieJar, Status},
    serde::json::Json,
    Route, State,
};

use crate::{
    error::{Error, Result},
    identity::IdentityDeriver,
    model::{
        api::{
            admin::AdminCredentials,
            auth::{AuthToken, AUTH_TOKEN_COOKIE},
            voter::{VoterCredentials, VoterRegistration, VoterView},
        },
        db::{Admin, NewVoter, Voter, VoterCore},
        mongodb::{is_duplicate_key_error, Coll, Id},
    },
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![authenticate_admin, register_voter, authenticate_voter, logout]
}

#[post("/auth/admin", data = "<credentials>", format = "json")]
pub async fn authenticate_admin(
    cookies: &CookieJar<'_>,
    credentials: Json<AdminCredentials>,
    admins: Coll<Admin>,
    config: &State<Config>,
) -> Result<()> {
    let with_username = doc! {
        "username": &credentials.username
    };

    let admin = admins
        .find_one(with_username, None)
        .await?
        .filter(|admin| admin.verify_password(&credentials.password))
        .ok_or_else(|| {
            Error::Status(
                Status::Unauthorized,
                "No admin found with the provided username and password combination.".to_string(),
            )
        })?;

    let token = AuthToken::new(&admin);
    cookies.add(token.into_cookie(config));

    Ok(())
}

/// Register a new voter and log them in.
///
/// The ledger address is derived here, synchronously, so every voter row
/// carries one from the start.
#[post("/auth/voter/register", data = "<registration>", format = "json")]
pub async fn register_voter(
    cookies: &CookieJar<'_>,
    registration: Json<VoterRegistration>,
    voters: Coll<Voter>,
    new_voters: Coll<NewVoter>,
    deriver: &State<IdentityDeriver>,
    config: &State<Config>,
) -> Result<Json<VoterView>> {
    let mut voter: VoterCore = registration.0.try_into()?;
    let identity = deriver.derive(&voter.email, &voter.name)?;
    voter.address = Some(identity.address().to_string());

    let new_id: Id = match new_voters.insert_one(&voter, None).await {
        Ok(insertion) => insertion
            .inserted_id
            .as_object_id()
            .unwrap() // Safe because the ID comes directly from the database.
            .into(),
        Err(err) if is_duplicate_key_error(&err) => {
            return Err(Error::Status(
                Status::Conflict,
                format!("A voter with email {} already exists.", voter.email),
            ));
        }
        Err(err) => return Err(err.into()),
    };
    let db_voter = voters.find_one(new_id.as_doc(), None).await?.unwrap();

    let token = AuthToken::new(&db_voter);
    cookies.add(token.into_cookie(config));

    Ok(Json(db_voter.into()))
}

#[post("/auth/voter", data = "<credentials>", format = "json")]
pub async fn authenticate_voter(
    cookies: &CookieJar<'_>,
    credentials: Json<VoterCredentials>,
    voters: Coll<Voter>,
    config: &State<Config>,
) -> Result<()> {
    let voter = voters
        .find_one(VoterCore::email_filter(&credentials.email), None)
        .await?
        .filter(|voter| voter.verify_password(&credentials.password))
        .ok_or_else(|| {
            Error::Status(
                Status::Unauthorized,
                "No voter found with the provided email and password combination.".to_string(),
            )
        })?;

    let token = AuthToken::new(&voter);
    cookies.add(token.into_cookie(config));

    Ok(())
}

#[delete("/auth")]
pub fn logout(cookies: &CookieJar) -> Status {
    cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
    Status::Ok
}
