#[macro_use]
extern crate log;

#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

pub mod api;
pub mod config;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod logging;
pub mod model;
pub mod scheduled_task;

pub use config::Config;

/// Assemble the server: all API routes plus the fairings that load the
/// config, connect the database, build the ledger bridge, and start the
/// background sync retrier.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .attach(logging::LoggerFairing)
        .attach(config::ConfigFairing)
        .attach(config::DatabaseFairing)
        .attach(config::LedgerFairing)
        .attach(ledger::SyncRetrierFairing)
}

/// Connect to the test database server.
#[cfg(test)]
pub(crate) async fn db_client() -> mongodb::Client {
    let db_uri = rocket::Config::figment()
        .extract_inner::<String>("db_uri")
        .expect("`db_uri` not set");
    mongodb::Client::with_uri_str(&db_uri)
        .await
        .unwrap_or_else(|_| panic!("Could not connect to database with `db_uri` \"{db_uri}\""))
}

/// A random database name, so concurrent tests never collide.
#[cfg(test)]
pub(crate) fn database() -> String {
    let random: u32 = rand::random();
    format!("test{random}")
}

/// Build a rocket against the given database and ledger bridge, with the
/// same routes and managed state as production but no background fairings.
#[cfg(test)]
pub(crate) async fn rocket_for_db_and_bridge(
    db_client: mongodb::Client,
    db_name: &str,
    bridge: ledger::LedgerBridge,
) -> Rocket<Build> {
    let figment = rocket::Config::figment();
    let config: Config = figment.extract().expect("Invalid test config");
    let db = db_client.database(db_name);

    model::mongodb::ensure_indexes_exist(&db)
        .await
        .expect("Failed to create indexes");
    model::db::admin::ensure_admin_exists(&model::mongodb::Coll::from_db(&db))
        .await
        .expect("Failed to create the default admin");

    let deriver = identity::IdentityDeriver::new(config.identity_secret());
    rocket::custom(figment)
        .mount("/", api::routes())
        .manage(config)
        .manage(db_client)
        .manage(db)
        .manage(deriver)
        .manage(bridge)
}
