use argon2::Config;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::db::admin::NewAdmin;

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Raw admin credentials, received from a user. These are never stored
/// directly, since the password is in plaintext.
#[derive(Clone, Deserialize, Serialize)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

impl TryFrom<AdminCredentials> for NewAdmin {
    type Error = Error;

    /// Convert [`AdminCredentials`] to a new [`NewAdmin`] by hashing the
    /// password. This enforces that the username is non-empty and the
    /// password meets minimum length.
    fn try_from(cred: AdminCredentials) -> Result<Self, Self::Error> {
        if cred.username.is_empty() {
            return Err(Error::Validation("username must not be empty".to_string()));
        }
        if cred.password.len() < MIN_PASSWORD_LENGTH {
            return Err(Error::Validation(format!(
                "password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }

        // 16 bytes of salt is the recommendation for argon2.
        let mut salt = [0_u8; 16];
        rand::thread_rng().fill(&mut salt);
        let password_hash =
            argon2::hash_encoded(cred.password.as_bytes(), &salt, &Config::default()).unwrap(); // Safe because the default `Config` is valid.
        Ok(Self {
            username: cred.username,
            password_hash,
        })
    }
}

#[cfg(test)]
mod examples {
    use super::*;

    impl AdminCredentials {
        pub fn example1() -> Self {
            Self {
                username: "coordinator".into(),
                password: "coordinator123".into(),
            }
        }

        pub fn example2() -> Self {
            Self {
                username: "returning-officer".into(),
                password: "officer456".into(),
            }
        }

        pub fn empty() -> Self {
            Self {
                username: "".into(),
                password: "".into(),
            }
        }
    }

    #[test]
    fn short_passwords_are_rejected() {
        let cred = AdminCredentials {
            username: "coordinator".into(),
            password: "short".into(),
        };
        assert!(NewAdmin::try_from(cred).is_err());
        assert!(NewAdmin::try_from(AdminCredentials::empty()).is_err());
    }

    #[test]
    fn hashing_round_trips() {
        let admin = NewAdmin::try_from(AdminCredentials::example1()).unwrap();
        assert!(admin.verify_password("coordinator123"));
        assert!(!admin.verify_password("coordinator1234"));
    }
}
