//! Ledger identity derivation.
//!
//! Address format: `0x` + hex(SHA-256(private_key)[12..32]), 42 characters.
//!
//! The private key is the HMAC-SHA256 of the voter's email and name under the
//! server's identity secret, so the same voter always derives the same
//! address and no key material needs to be stored.

use std::fmt::{self, Debug, Formatter};

use data_encoding::HEXLOWER;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Prefix for all ledger addresses.
const PREFIX: &str = "0x";
/// Number of hex characters after the prefix (20 bytes).
const ADDRESS_HEX_LEN: usize = 40;

/// A derived on-ledger identity.
///
/// The private key never leaves this struct: it is not serialisable, not
/// readable, and redacted from debug output. Only the address is public.
pub struct LedgerIdentity {
    address: String,
    #[allow(dead_code)]
    private_key: [u8; 32],
}

impl LedgerIdentity {
    /// The public address of this identity.
    pub fn address(&self) -> &str {
        &self.address
    }
}

impl Debug for LedgerIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerIdentity")
            .field("address", &self.address)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Derives ledger identities from voter attributes.
pub struct IdentityDeriver {
    secret: Vec<u8>,
}

impl IdentityDeriver {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            secret: secret.to_vec(),
        }
    }

    /// Derive the identity for the voter with the given email and name.
    ///
    /// Deterministic: the same inputs under the same secret always produce
    /// the same identity.
    pub fn derive(&self, email: &str, name: &str) -> Result<LedgerIdentity> {
        if email.trim().is_empty() || name.trim().is_empty() {
            return Err(Error::Validation(
                "cannot derive an identity from empty attributes".to_string(),
            ));
        }

        // Unwrap safe: HMAC accepts keys of any length.
        let mut mac = HmacSha256::new_from_slice(&self.secret).unwrap();
        mac.update(email.as_bytes());
        // NUL separator, so ("ab", "c") and ("a", "bc") differ.
        mac.update(&[0]);
        mac.update(name.as_bytes());
        let private_key: [u8; 32] = mac.finalize().into_bytes().into();

        let digest = Sha256::digest(private_key);
        let address = format!("{}{}", PREFIX, HEXLOWER.encode(&digest[12..]));

        Ok(LedgerIdentity {
            address,
            private_key,
        })
    }
}

/// Check whether the given string is a well-formed ledger address.
pub fn is_valid_address(address: &str) -> bool {
    match address.strip_prefix(PREFIX) {
        Some(hex) => {
            hex.len() == ADDRESS_HEX_LEN && hex.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase())
        }
        None => false,
    }
}
