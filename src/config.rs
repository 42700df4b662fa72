use chrono::Duration;
use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::{
    identity::IdentityDeriver,
    ledger::{LedgerBridge, LedgerClient},
    model::{db::admin::ensure_admin_exists, mongodb::ensure_indexes_exist, mongodb::Coll},
};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    auth_ttl: u32,
    ledger_url: String,
    ledger_timeout: u32,
    sync_retry_interval: u32,
    // secrets
    jwt_secret: String,
    identity_secret: String,
}

impl Config {
    /// Valid lifetime of auth token cookies in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Base URL of the ledger node.
    pub fn ledger_url(&self) -> &str {
        &self.ledger_url
    }

    /// Timeout for individual ledger requests in seconds.
    pub fn ledger_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.ledger_timeout.into())
    }

    /// Interval between sweeps for entities that failed to mirror.
    pub fn sync_retry_interval(&self) -> Duration {
        Duration::seconds(self.sync_retry_interval.into())
    }

    /// Secret key used to encrypt JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Secret key under which voter ledger identities are derived.
    pub fn identity_secret(&self) -> &[u8] {
        self.identity_secret.as_bytes()
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // secrets
    db_uri: String,
}

/// A fairing that loads the MongoDB config, connects to the database,
/// performs any setup necessary, and places both a `Client` and a `Database`
/// into managed state.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Loaded database config, connecting...");
        // Construct the connection.
        let client = match MongoClient::with_uri_str(config.db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(DATABASE_NAME);

        // Ensure the required indexes exist.
        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to connect to database: {e}");
            return Err(rocket);
        }

        // Ensure there is at least one admin user.
        let admins = Coll::from_db(&db);
        if let Err(e) = ensure_admin_exists(&admins).await {
            error!("Failed to connect to database: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        // Manage the state.
        rocket = rocket.manage(client).manage(db);
        Ok(rocket)
    }
}

/// The name of the database to use.
const DATABASE_NAME: &str = "evoting";

/// A fairing that builds the ledger bridge and the identity deriver from the
/// loaded config and puts them in managed state. Must be attached after
/// [`ConfigFairing`].
pub struct LedgerFairing;

#[rocket::async_trait]
impl Fairing for LedgerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Ledger",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.state::<Config>() {
            Some(config) => config,
            None => {
                error!("Config was not available when building the ledger bridge");
                return Err(rocket);
            }
        };

        let bridge = LedgerBridge::new(LedgerClient::from_config(config));
        let deriver = IdentityDeriver::new(config.identity_secret());
        if !bridge.client().health_check().await {
            // The bridge retries forever, so a dead ledger at launch is not
            // fatal, but the operator should know.
            warn!("Ledger node at {} is not responding", config.ledger_url());
        }

        rocket = rocket.manage(bridge).manage(deriver);
        Ok(rocket)
    }
}
