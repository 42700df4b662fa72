use std::ops::{Deref, DerefMut};

use mongodb::error::Error as DbError;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::{Coll, Id};

/// Username of the admin account created on first launch.
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
/// Password of the admin account created on first launch. Operators are
/// expected to change it immediately.
const DEFAULT_ADMIN_PASSWORD: &str = "admin";

/// Core admin user data.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminCore {
    pub username: String,
    pub password_hash: String,
}

impl AdminCore {
    /// Check whether the given password is correct.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        // Unwrap safe: the only way to create an AdminCore is with a hash
        // produced by argon2, so it is always well-formed.
        argon2::verify_encoded(&self.password_hash, password.as_ref()).unwrap()
    }
}

/// An admin without an ID.
pub type NewAdmin = AdminCore;

/// An admin user from the database, with its unique ID.
#[derive(Serialize, Deserialize)]
pub struct Admin {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub admin: AdminCore,
}

impl Deref for Admin {
    type Target = AdminCore;

    fn deref(&self) -> &Self::Target {
        &self.admin
    }
}

impl DerefMut for Admin {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.admin
    }
}

/// Ensure there is at least one admin account, creating the default one if
/// the collection is empty. Idempotent.
pub async fn ensure_admin_exists(admins: &Coll<NewAdmin>) -> Result<(), DbError> {
    let count = admins.count_documents(None, None).await?;
    if count > 0 {
        debug!("{count} admin(s) already exist");
        return Ok(());
    }

    let mut salt = [0_u8; 16];
    rand::thread_rng().fill(&mut salt);
    let password_hash = argon2::hash_encoded(
        DEFAULT_ADMIN_PASSWORD.as_bytes(),
        &salt,
        &argon2::Config::default(),
    )
    .unwrap(); // Safe because the default `Config` is valid.
    let admin = NewAdmin {
        username: DEFAULT_ADMIN_USERNAME.to_string(),
        password_hash,
    };
    admins.insert_one(admin, None).await?;
    warn!("Created default admin '{DEFAULT_ADMIN_USERNAME}'; change its password immediately");
    Ok(())
}
