//! Implements a struct that holds the state of the REST server.

use std::sync::{Arc, Mutex};

use axum::extract::FromRef;
use rusqlite::Connection;
use time::Duration;

use crate::{
    Error,
    auth::{DEFAULT_TOKEN_DURATION, JwtKeys, PasswordHash},
    db::initialize,
    notification::NotificationDispatcher,
};

/// The state of the REST server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The keys used to sign and verify access tokens.
    pub jwt_keys: JwtKeys,

    /// The duration for which access tokens are valid.
    pub token_duration: Duration,

    /// The bcrypt cost used when hashing new passwords.
    pub password_cost: u32,

    /// Sends push notifications to admins about pending transactions.
    pub dispatcher: NotificationDispatcher,

    /// The VAPID public key clients need to subscribe to push notifications.
    ///
    /// `None` when push notifications are disabled.
    pub vapid_public_key: Option<String>,

    /// The database connection
    pub db_connection: Arc<Mutex<Connection>>,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for the domain models.
    /// Push notifications start disabled, see [AppState::with_push].
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized.
    pub fn new(db_connection: Connection, jwt_secret: &str) -> Result<Self, Error> {
        initialize(&db_connection)?;

        Ok(Self {
            jwt_keys: JwtKeys::from_secret(jwt_secret),
            token_duration: DEFAULT_TOKEN_DURATION,
            password_cost: PasswordHash::DEFAULT_COST,
            dispatcher: NotificationDispatcher::disabled(),
            vapid_public_key: None,
            db_connection: Arc::new(Mutex::new(db_connection)),
        })
    }

    /// Enable push notifications using `dispatcher`, advertising `vapid_public_key` to clients.
    pub fn with_push(mut self, dispatcher: NotificationDispatcher, vapid_public_key: &str) -> Self {
        self.dispatcher = dispatcher;
        self.vapid_public_key = Some(vapid_public_key.to_owned());
        self
    }

    /// Use a cheaper bcrypt cost, e.g. to speed up tests.
    pub fn with_password_cost(mut self, password_cost: u32) -> Self {
        self.password_cost = password_cost;
        self
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.jwt_keys.clone()
    }
}
