//! Salted and hashed passwords.

use std::fmt::Display;

use bcrypt::{BcryptError, hash, verify};
use serde::{Deserialize, Serialize};

use crate::Error;

/// A salted and hashed password.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// An alias for the default encryption cost for hashing passwords.
    pub const DEFAULT_COST: u32 = bcrypt::DEFAULT_COST;

    /// Hash `raw_password` with a random salt and the specified `cost`.
    ///
    /// `cost` increases the rounds of hashing and therefore the time needed to verify a password.
    /// A value of at least 12 is recommended. Pass in [PasswordHash::DEFAULT_COST] to use the recommended cost.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::InvalidInput] if the password is
    /// empty, or an [Error::HashingError] if the password could not be hashed.
    pub fn new(raw_password: &str, cost: u32) -> Result<Self, Error> {
        if raw_password.is_empty() {
            return Err(Error::InvalidInput("password cannot be empty".to_owned()));
        }

        match hash(raw_password, cost) {
            Ok(password_hash) => Ok(Self(password_hash)),
            Err(e) => Err(Error::HashingError(e.to_string())),
        }
    }

    /// Create a new `PasswordHash` without any validation.
    ///
    /// The caller should ensure that `raw_password_hash` is a valid password hash.
    ///
    /// This function has `_unchecked` in the name but is not `unsafe`, because if an invalid hash is provided it will cause incorrect behaviour but not affect memory safety.
    pub fn new_unchecked(raw_password_hash: &str) -> Self {
        Self(raw_password_hash.to_string())
    }

    /// Check that `raw_password` matches the stored password.
    pub fn verify(&self, raw_password: &str) -> Result<bool, BcryptError> {
        verify(raw_password, &self.0)
    }
}

impl AsRef<str> for PasswordHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for PasswordHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
