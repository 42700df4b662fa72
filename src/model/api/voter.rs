use argon2::Config;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::{
    api::{admin::MIN_PASSWORD_LENGTH, id::ApiId},
    db::voter::{NewVoter, Voter},
};

/// A registration request, received from a prospective voter. Never stored
/// directly, since the password is in plaintext.
#[derive(Clone, Deserialize, Serialize)]
pub struct VoterRegistration {
    pub name: String,
    pub email: String,
    pub contact: String,
    pub password: String,
}

impl TryFrom<VoterRegistration> for NewVoter {
    type Error = Error;

    /// Convert a [`VoterRegistration`] to a new [`NewVoter`] by hashing the
    /// password. This enforces that the name is non-empty, the email is
    /// plausible, and the password meets minimum length.
    fn try_from(reg: VoterRegistration) -> Result<Self, Self::Error> {
        if reg.name.trim().is_empty() {
            return Err(Error::Validation("name must not be empty".to_string()));
        }
        // Full RFC 5322 validation is a losing game; the mailer is the real
        // arbiter. Catch the obviously malformed.
        if !reg.email.contains('@') || reg.email.trim() != reg.email {
            return Err(Error::Validation(format!(
                "'{}' is not a valid email address",
                reg.email
            )));
        }
        if reg.password.len() < MIN_PASSWORD_LENGTH {
            return Err(Error::Validation(format!(
                "password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }

        let mut salt = [0_u8; 16];
        rand::thread_rng().fill(&mut salt);
        let password_hash =
            argon2::hash_encoded(reg.password.as_bytes(), &salt, &Config::default()).unwrap(); // Safe because the default `Config` is valid.
        Ok(Self {
            name: reg.name,
            email: reg.email,
            contact: reg.contact,
            password_hash,
            address: None,
        })
    }
}

/// Raw voter credentials, received at login.
#[derive(Clone, Deserialize, Serialize)]
pub struct VoterCredentials {
    pub email: String,
    pub password: String,
}

/// A voter as seen by the voter themselves. The password hash never leaves
/// the database layer.
#[derive(Debug, Serialize, Deserialize)]
pub struct VoterView {
    pub id: ApiId,
    pub name: String,
    pub email: String,
    pub contact: String,
    pub address: Option<String>,
}

impl From<Voter> for VoterView {
    fn from(voter: Voter) -> Self {
        Self {
            id: voter.id.into(),
            name: voter.voter.name,
            email: voter.voter.email,
            contact: voter.voter.contact,
            address: voter.voter.address,
        }
    }
}
