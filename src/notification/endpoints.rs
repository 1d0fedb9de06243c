//! Route handlers for subscribing to push notifications.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
    http::StatusCode,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error, JsonBody,
    auth::Caller,
    notification::{SubscriptionPayload, upsert_subscription},
};

/// The state needed to store push subscriptions.
#[derive(Debug, Clone)]
pub struct SubscribeState {
    /// The database connection for storing subscriptions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for SubscribeState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The state needed to hand out the VAPID public key.
#[derive(Debug, Clone)]
pub struct VapidKeyState {
    /// The key, or `None` if push notifications are disabled.
    pub vapid_public_key: Option<String>,
}

impl FromRef<AppState> for VapidKeyState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            vapid_public_key: state.vapid_public_key.clone(),
        }
    }
}

/// The response body of the VAPID public key endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VapidPublicKey {
    /// The base64url encoded application server key.
    #[serde(rename = "publicKey")]
    pub public_key: String,
}

/// A route handler that returns the key browsers need to subscribe.
///
/// Responds with 503 if the server was started without VAPID keys.
pub async fn get_vapid_public_key_endpoint(
    State(state): State<VapidKeyState>,
) -> Result<Json<VapidPublicKey>, Error> {
    state
        .vapid_public_key
        .map(|public_key| Json(VapidPublicKey { public_key }))
        .ok_or(Error::PushNotConfigured)
}

/// A route handler that stores the caller's push subscription.
pub async fn subscribe_endpoint(
    State(state): State<SubscribeState>,
    caller: Caller,
    JsonBody(body): JsonBody<serde_json::Value>,
) -> Result<StatusCode, Error> {
    let payload = SubscriptionPayload::from_json(body)?;

    let connection = state.db_connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError
    })?;

    let subscription = upsert_subscription(caller.id, &payload, &connection)?;
    tracing::info!(
        "{} subscribed to push notifications with subscription {}",
        caller.name,
        subscription.id
    );

    Ok(StatusCode::CREATED)
}
