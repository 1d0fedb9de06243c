//! The endpoint for registering a new family member.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error, JsonBody,
    auth::{PasswordHash, Role, UserID, create_user},
};

/// The state needed for creating a new user.
#[derive(Debug, Clone)]
pub struct RegistrationState {
    /// The bcrypt cost used when hashing new passwords.
    pub password_cost: u32,
    /// The database connection for storing users.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for RegistrationState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            password_cost: state.password_cost,
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The request body for registering a user.
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterData {
    /// The unique name to log in with.
    pub name: String,
    /// The plain text password, only ever kept as a hash.
    pub password: String,
    /// Whether the new user is a parent or a child.
    pub role: Role,
}

/// The registered user as returned to the client.
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisteredUser {
    /// The new user's ID.
    pub id: UserID,
    /// The new user's name.
    pub name: String,
    /// The new user's role.
    pub role: Role,
}

/// A route handler for registering a new user.
///
/// Responds with 201 on success and 409 if the name is already taken.
pub async fn register_endpoint(
    State(state): State<RegistrationState>,
    JsonBody(user_data): JsonBody<RegisterData>,
) -> Response {
    match register_user(&state, user_data) {
        Ok(user) => (StatusCode::CREATED, Json(user)).into_response(),
        Err(error) => error.into_response(),
    }
}

fn register_user(
    state: &RegistrationState,
    user_data: RegisterData,
) -> Result<RegisteredUser, Error> {
    let name = user_data.name.trim();

    if name.is_empty() {
        return Err(Error::InvalidInput("name cannot be empty".to_owned()));
    }

    let password_hash = PasswordHash::new(&user_data.password, state.password_cost)?;

    let connection = state.db_connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError
    })?;

    let user = create_user(name, password_hash, user_data.role, &connection)?;
    tracing::info!("Registered {} with the role {}", user.name, user.role);

    Ok(RegisteredUser {
        id: user.id,
        name: user.name,
        role: user.role,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{Router, http::StatusCode, routing::post};
    use axum_test::TestServer;
    use serde_json::json;

    use crate::{
        auth::{Role, get_user_by_name},
        endpoints,
        test_utils::{assert_json_error, get_test_connection},
    };

    use super::{RegisteredUser, RegistrationState, register_endpoint};

    fn test_server() -> (TestServer, RegistrationState) {
        let state = RegistrationState {
            password_cost: 4,
            db_connection: Arc::new(Mutex::new(get_test_connection())),
        };
        let app = Router::new()
            .route(endpoints::REGISTER, post(register_endpoint))
            .with_state(state.clone());

        (TestServer::new(app), state)
    }

    #[tokio::test]
    async fn register_creates_user_with_hashed_password() {
        let (server, state) = test_server();

        let response = server
            .post(endpoints::REGISTER)
            .json(&json!({ "name": "Ann", "password": "hunter2", "role": "child" }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let registered = response.json::<RegisteredUser>();
        assert_eq!(registered.name, "Ann");
        assert_eq!(registered.role, Role::Child);

        let connection = state.db_connection.lock().unwrap();
        let user = get_user_by_name("Ann", &connection).unwrap();
        assert_ne!(user.password_hash.as_ref(), "hunter2");
        assert!(user.password_hash.verify("hunter2").unwrap());
    }

    #[tokio::test]
    async fn register_duplicate_name_conflicts() {
        let (server, _) = test_server();
        let body = json!({ "name": "Ann", "password": "hunter2", "role": "child" });

        server
            .post(endpoints::REGISTER)
            .json(&body)
            .await
            .assert_status(StatusCode::CREATED);

        server
            .post(endpoints::REGISTER)
            .json(&body)
            .await
            .assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn register_fails_with_blank_name() {
        let (server, _) = test_server();

        server
            .post(endpoints::REGISTER)
            .json(&json!({ "name": "   ", "password": "hunter2", "role": "admin" }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn register_fails_with_unknown_role() {
        let (server, _) = test_server();

        let response = server
            .post(endpoints::REGISTER)
            .json(&json!({ "name": "Ann", "password": "hunter2", "role": "overlord" }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_json_error(&response, "unknown variant `overlord`");
    }

    #[tokio::test]
    async fn register_fails_with_malformed_body() {
        let (server, _) = test_server();

        let response = server
            .post(endpoints::REGISTER)
            .json(&json!({ "name": "Ann" }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_json_error(&response, "missing field `password`");
    }
}
