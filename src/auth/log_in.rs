//! The endpoint that exchanges a name and password for a session token.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::Duration;

use crate::{
    AppState, Error, JsonBody,
    auth::{JwtKeys, encode_token, get_user_by_name},
};

/// The state needed to perform a login.
#[derive(Debug, Clone)]
pub struct LogInState {
    /// The keys for signing session tokens.
    pub jwt_keys: JwtKeys,
    /// How long issued tokens stay valid.
    pub token_duration: Duration,
    /// The database connection for looking up users.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for LogInState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            jwt_keys: state.jwt_keys.clone(),
            token_duration: state.token_duration,
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The credentials entered by the user.
///
/// The password is stored as a plain string. There is no need for validation here since
/// it will be compared against the password hash in the database.
#[derive(Clone, Serialize, Deserialize)]
pub struct LogInData {
    /// Name entered during log-in.
    pub name: String,
    /// Password entered during log-in.
    pub password: String,
}

/// The body of a successful log-in response.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessToken {
    /// The signed session token to send as a bearer token.
    #[serde(rename = "accessToken")]
    pub access_token: String,
}

/// Handler for log-in requests.
///
/// # Errors
///
/// This function will return an error in a few situations.
/// - The name does not belong to a registered user.
/// - The password is not correct.
/// - An internal error occurred when verifying the password or signing the token.
pub async fn log_in_endpoint(
    State(state): State<LogInState>,
    JsonBody(user_data): JsonBody<LogInData>,
) -> Result<Json<AccessToken>, Error> {
    let user = {
        let connection = state.db_connection.lock().map_err(|error| {
            tracing::error!("could not acquire database lock: {error}");
            Error::DatabaseLockError
        })?;

        match get_user_by_name(user_data.name.trim(), &connection) {
            Ok(user) => user,
            Err(Error::NotFound) => return Err(Error::InvalidCredentials),
            Err(error) => {
                tracing::error!("Unhandled error while verifying credentials: {error}");
                return Err(error);
            }
        }
    };

    let is_password_valid = user
        .password_hash
        .verify(&user_data.password)
        .map_err(|error| {
            tracing::error!("Unhandled error while verifying credentials: {error}");
            Error::HashingError(error.to_string())
        })?;

    if !is_password_valid {
        tracing::info!("Failed log-in attempt for {}", user.name);
        return Err(Error::InvalidCredentials);
    }

    let access_token = encode_token(&user, &state.jwt_keys, state.token_duration)?;

    Ok(Json(AccessToken { access_token }))
}
