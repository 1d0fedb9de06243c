//! Extracts and verifies the bearer token of a request.

use axum::{
    RequestPartsExt,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};

use crate::{
    Error,
    auth::{JwtKeys, Role, UserID, decode_token},
};

/// The verified identity of the user making a request.
///
/// Adding a `Caller` argument to a route handler makes the route protected:
/// the handler only runs if the request carries a valid bearer token, and
/// the client gets a 401 response otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct Caller {
    /// The ID of the user.
    pub id: UserID,
    /// The name of the user.
    pub name: String,
    /// The role of the user.
    pub role: Role,
}

impl Caller {
    /// Return [Error::Forbidden] unless the caller is an admin.
    pub fn require_admin(&self) -> Result<(), Error> {
        match self.role {
            Role::Admin => Ok(()),
            Role::Child => {
                tracing::warn!("{} tried to use an admin-only operation", self.name);
                Err(Error::Forbidden)
            }
        }
    }
}

impl<S> FromRequestParts<S> for Caller
where
    JwtKeys: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| Error::Unauthenticated)?;

        let claims = decode_token(bearer.token(), &JwtKeys::from_ref(state))?;

        Ok(Caller {
            id: claims.id,
            name: claims.name,
            role: claims.role,
        })
    }
}
