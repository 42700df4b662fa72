use mongodb::{bson::doc, Client};
use rocket::{futures::TryStreamExt, http::Status, serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            admin::AdminCredentials,
            auth::AuthToken,
            election::{ElectionSpec, ElectionView},
        },
        common::election::ElectionStatus,
        db::{Admin, Candidacy, Election, NewAdmin, NewElection},
        mongodb::{Coll, Id},
    },
};

pub fn routes() -> Vec<Route> {
    routes![
        get_admins,
        create_admin,
        delete_admin,
        create_election,
        modify_election,
        delete_election,
    ]
}

#[get("/admins")]
async fn get_admins(_token: AuthToken<Admin>, admins: Coll<Admin>) -> Result<Json<Vec<String>>> {
    let admin_list: Vec<Admin> = admins.find(None, None).await?.try_collect().await?;
    let admin_names = admin_list
        .into_iter()
        .map(|admin| admin.admin.username)
        .collect();
    Ok(Json(admin_names))
}

#[post("/admins", data = "<new_admin>", format = "json")]
async fn create_admin(
    _token: AuthToken<Admin>,
    new_admin: Json<AdminCredentials>,
    admins: Coll<NewAdmin>,
) -> Result<()> {
    // Check username uniqueness.
    let filter = doc! {
        "username": &new_admin.username,
    };
    let existing = admins.find_one(filter, None).await?;
    if existing.is_some() {
        return Err(Error::Status(
            Status::BadRequest,
            format!("Admin username already in use: {}", new_admin.username),
        ));
    }

    // Create and insert the admin.
    let admin: NewAdmin = new_admin.0.try_into()?;
    admins.insert_one(admin, None).await?;
    Ok(())
}

#[delete("/admins", data = "<username>", format = "json")]
async fn delete_admin(
    _token: AuthToken<Admin>,
    username: String,
    admins: Coll<Admin>,
) -> Result<()> {
    // Prevent deleting the last admin.
    let count = admins.count_documents(None, None).await?;
    if count == 1 {
        return Err(Error::Status(
            Status::UnprocessableEntity,
            "Cannot delete last admin!".to_string(),
        ));
    }

    let filter = doc! {
        "username": &username,
    };
    let result = admins.delete_one(filter, None).await?;
    if result.deleted_count == 0 {
        Err(Error::not_found(format!("Admin {}", username)))
    } else {
        Ok(())
    }
}

#[post("/elections", data = "<spec>", format = "json")]
async fn create_election(
    _token: AuthToken<Admin>,
    spec: Json<ElectionSpec>,
    new_elections: Coll<NewElection>,
    elections: Coll<Election>,
) -> Result<Json<ElectionView>> {
    let election: NewElection = spec.0.try_into()?;
    let new_id: Id = new_elections
        .insert_one(&election, None)
        .await?
        .inserted_id
        .as_object_id()
        .unwrap() // Valid because the ID comes directly from the DB
        .into();

    // Retrieve the full election information including ID.
    let election = elections.find_one(new_id.as_doc(), None).await?.unwrap();
    Ok(Json(election.into()))
}

/// Replace an election's details.
///
/// Only allowed while the election is still planned; once the window opens
/// the schedule and name are fixed for good.
#[put("/elections/<election_id>", data = "<spec>", format = "json")]
async fn modify_election(
    _token: AuthToken<Admin>,
    election_id: Id,
    spec: Json<ElectionSpec>,
    new_elections: Coll<NewElection>,
    elections: Coll<Election>,
) -> Result<Json<ElectionView>> {
    // Get the existing election.
    let election = elections
        .find_one(election_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {}", election_id)))?;

    if election.status() != ElectionStatus::Planned {
        return Err(Error::ElectionLocked(election_id));
    }

    // Replace with the new spec. The ledger mirror, if any, survives edits to
    // the local fields.
    let mut new_election: NewElection = spec.0.try_into()?;
    new_election.on_chain_id = election.election.on_chain_id.clone();
    let result = new_elections
        .replace_one(election_id.as_doc(), &new_election, None)
        .await?;
    assert_eq!(result.modified_count, 1);

    let db_election = elections
        .find_one(election_id.as_doc(), None)
        .await?
        .unwrap();
    Ok(Json(db_election.into()))
}

/// Delete an election and its candidacies.
///
/// Only allowed while the election is still planned. No ballots can exist
/// yet, so only candidacies cascade; sync records are an append-only audit
/// trail and are kept.
#[delete("/elections/<election_id>")]
async fn delete_election(
    _token: AuthToken<Admin>,
    election_id: Id,
    elections: Coll<Election>,
    candidacies: Coll<Candidacy>,
    db_client: &State<Client>,
) -> Result<()> {
    // Get the election.
    let election = elections
        .find_one(election_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {}", election_id)))?;

    if election.status() != ElectionStatus::Planned {
        return Err(Error::ElectionLocked(election_id));
    }

    // Atomically delete the election and all associated data.
    {
        let mut session = db_client.start_session(None).await?;
        session.start_transaction(None).await?;

        let result = elections
            .delete_one_with_session(election_id.as_doc(), None, &mut session)
            .await?;
        assert_eq!(result.deleted_count, 1);

        let filter = doc! {
            "election_id": election_id,
        };
        candidacies
            .delete_many_with_session(filter, None, &mut session)
            .await?;

        session.commit_transaction().await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use mongodb::{bson::Document, Database};
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::{Client, LocalResponse},
        serde::json::serde_json,
    };

    use crate::model::{
        db::{admin::DEFAULT_ADMIN_USERNAME, CandidacyCore, NewCandidacy},
        mongodb::MongoCollection,
    };

    use super::*;

    #[backend_test(admin)]
    async fn create_delete_admin(client: Client, db: Database) {
        // Create admin
        create_admin(&client, &AdminCredentials::example2()).await;

        // Ensure the admin has been inserted
        let admins = Coll::<Admin>::from_db(&db);
        let with_username = doc! { "username": &AdminCredentials::example2().username };
        let inserted_admin = admins
            .find_one(with_username.clone(), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            AdminCredentials::example2().username,
            inserted_admin.username
        );

        // Delete the admin.
        let count = admins.count_documents(None, None).await.unwrap();
        assert_eq!(count, 3); // Default admin, test admin, new admin.
        let response = client
            .delete(uri!(delete_admin))
            .header(ContentType::JSON)
            .body(AdminCredentials::example2().username)
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());

        // Ensure the admin has been deleted.
        let count = admins.count_documents(None, None).await.unwrap();
        assert_eq!(count, 2);
        let expected = vec![
            DEFAULT_ADMIN_USERNAME.to_string(),
            AdminCredentials::example1().username,
        ];
        let remaining_admins: Vec<String> = admins
            .find(None, None)
            .await
            .unwrap()
            .map_ok(|a| a.admin.username)
            .try_collect()
            .await
            .unwrap();
        assert_eq!(expected, remaining_admins);
    }

    #[backend_test(admin)]
    async fn bad_create_admin(client: Client, db: Database) {
        // Try empty username.
        let credentials = AdminCredentials {
            username: "".to_string(),
            password: "long-enough-password".to_string(),
        };
        create_admin_expect_status(&client, &credentials, Status::BadRequest).await;

        // Try short password.
        let credentials = AdminCredentials {
            username: "foo".to_string(),
            password: "foo".to_string(),
        };
        create_admin_expect_status(&client, &credentials, Status::BadRequest).await;

        // Try empty both.
        create_admin_expect_status(&client, &AdminCredentials::empty(), Status::BadRequest).await;

        // Try duplicate username.
        create_admin_expect_status(&client, &AdminCredentials::example1(), Status::BadRequest)
            .await;

        // Ensure no admins were created.
        let num_admins = count_matches::<Admin>(&db, doc! {}).await;
        assert_eq!(num_admins, 2); // Default admin and test admin.
    }

    #[backend_test(admin)]
    async fn list_admins(client: Client) {
        create_admin(&client, &AdminCredentials::example2()).await;

        let response = client.get(uri!(get_admins)).dispatch().await;
        assert_eq!(Status::Ok, response.status());

        let admins: Vec<String> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        let expected = vec![
            DEFAULT_ADMIN_USERNAME.to_string(),
            AdminCredentials::example1().username,
            AdminCredentials::example2().username,
        ];
        assert_eq!(admins, expected);
    }

    #[backend_test]
    async fn admin_routes_need_admin_rights(client: Client) {
        // An unauthenticated request forwards straight past the guard.
        let response = client.get(uri!(get_admins)).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test(admin)]
    async fn create_election(client: Client, db: Database) {
        // Create an election.
        let response = client
            .post(uri!(create_election))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&ElectionSpec::future_example()).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let raw_response = response.into_string().await.unwrap();
        let response_election: ElectionView = serde_json::from_str(&raw_response).unwrap();
        assert_eq!(response_election.status, ElectionStatus::Planned);
        assert_eq!(response_election.on_chain_id, None);

        // Ensure it is present in the DB.
        let with_name = doc! { "name": &ElectionSpec::future_example().name };
        let inserted = Coll::<Election>::from_db(&db)
            .find_one(with_name, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(inserted.name, ElectionSpec::future_example().name);
    }

    #[backend_test(admin)]
    async fn bad_create_election(client: Client, db: Database) {
        // End before start.
        let mut spec = ElectionSpec::future_example();
        std::mem::swap(&mut spec.start_time, &mut spec.end_time);
        let response = client
            .post(uri!(create_election))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&spec).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());
        assert_eq!(count_matches::<Election>(&db, doc! {}).await, 0);
    }

    #[backend_test(admin)]
    async fn modify_election(client: Client, db: Database) {
        // Try to modify an election that doesn't exist.
        modify_expect_status(
            &client,
            Id::new(),
            &ElectionSpec::future_example(),
            Status::NotFound,
        )
        .await;

        // Create a planned election.
        let mut spec = ElectionSpec::future_example();
        let election = create_election_for_spec(&client, &spec).await;

        // Modify it.
        spec.name = "New Name".to_string();
        let modified = modify_election_with_spec(&client, *election.id, &spec).await;
        assert_eq!(modified.name, spec.name);
        assert_eq!(modified.end_time, election.end_time);
        let in_db = get_election_by_id(&db, *election.id).await;
        assert_eq!(in_db.name, spec.name);

        // An open election is locked.
        let open = create_election_for_spec(&client, &ElectionSpec::current_example()).await;
        modify_expect_status(
            &client,
            *open.id,
            &ElectionSpec::future_example(),
            Status::UnprocessableEntity,
        )
        .await;

        // As is a closed one.
        let closed = create_election_for_spec(&client, &ElectionSpec::past_example()).await;
        modify_expect_status(
            &client,
            *closed.id,
            &ElectionSpec::future_example(),
            Status::UnprocessableEntity,
        )
        .await;
    }

    #[backend_test(admin)]
    async fn delete_election(client: Client, db: Database) {
        // Try to delete an election that doesn't exist.
        delete_expect_status(&client, Id::new(), Status::NotFound).await;

        // Create a planned election with a pending candidacy.
        let election = create_election_for_spec(&client, &ElectionSpec::future_example()).await;
        Coll::<NewCandidacy>::from_db(&db)
            .insert_one(CandidacyCore::example(Id::new(), *election.id), None)
            .await
            .unwrap();

        // Delete it; the candidacy goes with it.
        delete(&client, *election.id).await;
        assert_no_matches::<Election>(&db, election.id.as_doc()).await;
        assert_no_matches::<Candidacy>(&db, doc! { "election_id": *election.id }).await;

        // Open and closed elections can't be deleted.
        let open = create_election_for_spec(&client, &ElectionSpec::current_example()).await;
        delete_expect_status(&client, *open.id, Status::UnprocessableEntity).await;
        get_election_by_id(&db, *open.id).await;

        let closed = create_election_for_spec(&client, &ElectionSpec::past_example()).await;
        delete_expect_status(&client, *closed.id, Status::UnprocessableEntity).await;
        get_election_by_id(&db, *closed.id).await;
    }

    async fn get_election_by_id(db: &Database, id: Id) -> Election {
        Coll::<Election>::from_db(db)
            .find_one(id.as_doc(), None)
            .await
            .unwrap()
            .unwrap()
    }

    async fn count_matches<T: MongoCollection>(db: &Database, filter: Document) -> u64 {
        Coll::<T>::from_db(db)
            .count_documents(filter, None)
            .await
            .unwrap()
    }

    async fn assert_no_matches<T: MongoCollection>(db: &Database, filter: Document) {
        let matches = count_matches::<T>(db, filter).await;
        assert_eq!(matches, 0);
    }

    async fn create_election_for_spec(client: &Client, spec: &ElectionSpec) -> ElectionView {
        let response = client
            .post(uri!(create_election))
            .header(ContentType::JSON)
            .body(serde_json::to_string(spec).unwrap())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        serde_json::from_str(&response.into_string().await.unwrap()).unwrap()
    }

    async fn create_admin(client: &Client, spec: &AdminCredentials) {
        create_admin_expect_status(client, spec, Status::Ok).await
    }

    async fn create_admin_expect_status(client: &Client, spec: &AdminCredentials, status: Status) {
        let response = client
            .post(uri!(create_admin))
            .header(ContentType::JSON)
            .body(serde_json::to_string(spec).unwrap())
            .dispatch()
            .await;
        assert_eq!(status, response.status());
    }

    async fn modify_election_with_spec(client: &Client, id: Id, spec: &ElectionSpec) -> ElectionView {
        let response = modify_expect_status(client, id, spec, Status::Ok).await;
        serde_json::from_str(&response.into_string().await.unwrap()).unwrap()
    }

    async fn modify_expect_status<'c>(
        client: &'c Client,
        id: Id,
        spec: &ElectionSpec,
        status: Status,
    ) -> LocalResponse<'c> {
        let response = client
            .put(uri!(modify_election(id)))
            .header(ContentType::JSON)
            .body(serde_json::to_string(spec).unwrap())
            .dispatch()
            .await;
        assert_eq!(response.status(), status);
        response
    }

    async fn delete(client: &Client, id: Id) {
        delete_expect_status(client, id, Status::Ok).await
    }

    async fn delete_expect_status(client: &Client, id: Id, status: Status) {
        let response = client.delete(uri!(delete_election(id))).dispatch().await;
        assert_eq!(response.status(), status);
    }
}
