use std::ops::{Deref, DerefMut};

use mongodb::bson::{doc, Document};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core voter user data, as stored in the database.
///
/// The `address` starts empty and is filled in by the identity deriver the
/// first time the voter needs an on-ledger identity. The private key it is
/// derived from is never stored.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterCore {
    pub name: String,
    /// Unique across all voters, enforced by index.
    pub email: String,
    pub contact: String,
    pub password_hash: String,
    pub address: Option<String>,
}

impl VoterCore {
    /// Check whether the given password is correct.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        // Unwrap safe: the only way to create a VoterCore is with a hash
        // produced by argon2, so it is always well-formed.
        argon2::verify_encoded(&self.password_hash, password.as_ref()).unwrap()
    }

    /// A filter document matching the voter with the given email.
    pub fn email_filter(email: &str) -> Document {
        doc! { "email": email }
    }
}

/// A voter without an ID.
pub type NewVoter = VoterCore;

/// A voter user from the database, with its unique ID.
#[derive(Debug, Serialize, Deserialize)]
pub struct Voter {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub voter: VoterCore,
}

impl Deref for Voter {
    type Target = VoterCore;

    fn deref(&self) -> &Self::Target {
        &self.voter
    }
}

impl DerefMut for Voter {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.voter
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl VoterCore {
        pub fn example() -> Self {
            Self {
                name: "Alice Obrien".to_string(),
                email: "alice@example.com".to_string(),
                contact: "+44 7700 900077".to_string(),
                password_hash: argon2::hash_encoded(
                    b"alice-password",
                    b"testingsalt12345",
                    &argon2::Config::default(),
                )
                .unwrap(),
                address: None,
            }
        }

        pub fn example2() -> Self {
            Self {
                name: "Bob Mugabe".to_string(),
                email: "bob@example.com".to_string(),
                contact: "+44 7700 900088".to_string(),
                password_hash: argon2::hash_encoded(
                    b"bob-password",
                    b"testingsalt67890",
                    &argon2::Config::default(),
                )
                .unwrap(),
                address: None,
            }
        }
    }

    #[test]
    fn verifies_correct_password_only() {
        let voter = VoterCore::example();
        assert!(voter.verify_password("alice-password"));
        assert!(!voter.verify_password("bob-password"));
    }
}
