//! Signing and verifying the JSON Web Tokens that authenticate API requests.

use std::fmt::Debug;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use time::{Duration, OffsetDateTime};

use crate::{
    Error,
    auth::{Role, User, UserID},
};

/// How long a session token stays valid after it is issued.
pub const DEFAULT_TOKEN_DURATION: Duration = Duration::days(1);

/// The keys for signing and verifying session tokens.
#[derive(Clone)]
pub struct JwtKeys {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtKeys {
    /// Derive the HMAC signing key from a `secret` string.
    pub fn from_secret(secret: &str) -> Self {
        let hash = Sha512::digest(secret);

        Self {
            encoding_key: EncodingKey::from_secret(&hash),
            decoding_key: DecodingKey::from_secret(&hash),
        }
    }
}

impl Debug for JwtKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JwtKeys { .. }")
    }
}

/// The contents of a session token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// The ID of the user the token was issued to.
    pub id: UserID,
    /// The name of the user the token was issued to.
    pub name: String,
    /// The role of the user the token was issued to.
    pub role: Role,
    /// The time the token was issued as a unix timestamp.
    pub iat: u64,
    /// The expiry time of the token as a unix timestamp.
    pub exp: u64,
}

/// Sign a token for `user` that expires `duration` from now.
///
/// # Errors
///
/// Returns an [Error::TokenCreation] if the token could not be signed.
pub fn encode_token(user: &User, keys: &JwtKeys, duration: Duration) -> Result<String, Error> {
    encode_token_at(user, keys, OffsetDateTime::now_utc(), duration)
}

/// Sign a token for `user` as if it was issued at `issued_at`.
pub(crate) fn encode_token_at(
    user: &User,
    keys: &JwtKeys,
    issued_at: OffsetDateTime,
    duration: Duration,
) -> Result<String, Error> {
    let claims = Claims {
        id: user.id,
        name: user.name.clone(),
        role: user.role,
        iat: issued_at.unix_timestamp().max(0) as u64,
        exp: (issued_at + duration).unix_timestamp().max(0) as u64,
    };

    encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding_key)
        .map_err(|error| Error::TokenCreation(error.to_string()))
}

/// Verify the signature and expiry of `token` and return its claims.
///
/// # Errors
///
/// Returns [Error::Unauthenticated] if the token is malformed, was not
/// signed with `keys`, or has expired. The cases are not distinguished.
pub fn decode_token(token: &str, keys: &JwtKeys) -> Result<Claims, Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    decode::<Claims>(token, &keys.decoding_key, &validation)
        .map(|token_data| token_data.claims)
        .map_err(|error| {
            tracing::debug!("Rejected session token: {error}");
            Error::Unauthenticated
        })
}
