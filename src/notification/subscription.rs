//! Storage for web-push subscriptions.

use rusqlite::{Connection, Row, types::Type};
use serde::{Deserialize, Serialize};

use crate::{Error, auth::UserID, database_id::SubscriptionId};

/// The subscription JSON a browser hands out from `PushManager.subscribe()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionPayload {
    /// The push service URL that messages are posted to.
    pub endpoint: String,
    /// The keys used to encrypt messages for this subscription.
    pub keys: SubscriptionKeys,
}

/// The encryption keys of a [SubscriptionPayload].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    /// The client's P-256 public key, base64url encoded.
    pub p256dh: String,
    /// The client's authentication secret, base64url encoded.
    pub auth: String,
}

impl SubscriptionPayload {
    /// Parse and check a subscription sent by a client.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidSubscription] if `value` is missing the endpoint or
    /// either key, or if any of them are empty.
    pub fn from_json(value: serde_json::Value) -> Result<Self, Error> {
        let payload: SubscriptionPayload = serde_json::from_value(value)
            .map_err(|error| Error::InvalidSubscription(error.to_string()))?;

        if payload.endpoint.trim().is_empty() {
            return Err(Error::InvalidSubscription("endpoint is empty".to_owned()));
        }

        if payload.keys.p256dh.is_empty() || payload.keys.auth.is_empty() {
            return Err(Error::InvalidSubscription("keys are empty".to_owned()));
        }

        Ok(payload)
    }
}

/// A subscription stored for a user.
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    /// The ID of the stored subscription.
    pub id: SubscriptionId,
    /// The user that subscribed.
    pub user_id: UserID,
    /// Where and how to deliver messages.
    pub payload: SubscriptionPayload,
}

/// Create the push subscription table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_subscription_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS push_subscription (
                id INTEGER PRIMARY KEY,
                endpoint TEXT NOT NULL UNIQUE,
                payload TEXT NOT NULL,
                user_id INTEGER NOT NULL,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
            )",
        (),
    )?;

    Ok(())
}

fn map_subscription_row(row: &Row) -> Result<Subscription, rusqlite::Error> {
    let raw_payload: String = row.get(2)?;
    let payload = serde_json::from_str(&raw_payload).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(error))
    })?;

    Ok(Subscription {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        payload,
    })
}

/// Store `payload` for `user_id`.
///
/// A browser keeps its endpoint when it re-subscribes, so a payload with an
/// endpoint that is already stored replaces the old row and its owner.
///
/// # Errors
///
/// Returns an [Error::SqlError] if the SQL query failed.
pub fn upsert_subscription(
    user_id: UserID,
    payload: &SubscriptionPayload,
    connection: &Connection,
) -> Result<Subscription, Error> {
    let raw_payload = serde_json::to_string(payload)
        .map_err(|error| Error::InvalidSubscription(error.to_string()))?;

    let subscription = connection
        .prepare(
            "INSERT INTO push_subscription (endpoint, payload, user_id) VALUES (?1, ?2, ?3)
             ON CONFLICT(endpoint) DO UPDATE SET payload = excluded.payload, user_id = excluded.user_id
             RETURNING id, user_id, payload",
        )?
        .query_row(
            (&payload.endpoint, raw_payload, user_id.as_i64()),
            map_subscription_row,
        )?;

    Ok(subscription)
}

/// Get the subscriptions owned by admin users, oldest first.
///
/// # Errors
///
/// Returns an [Error::SqlError] if the SQL query failed.
pub fn get_admin_subscriptions(connection: &Connection) -> Result<Vec<Subscription>, Error> {
    connection
        .prepare(
            "SELECT push_subscription.id, push_subscription.user_id, push_subscription.payload
             FROM push_subscription
             INNER JOIN user ON user.id = push_subscription.user_id
             WHERE user.role = 'admin'
             ORDER BY push_subscription.id",
        )?
        .query_map([], map_subscription_row)?
        .map(|maybe_subscription| maybe_subscription.map_err(Error::from))
        .collect()
}

/// Delete the subscription with `id`. Deleting a missing subscription is not an error.
///
/// # Errors
///
/// Returns an [Error::SqlError] if the SQL query failed.
pub fn delete_subscription(id: SubscriptionId, connection: &Connection) -> Result<(), Error> {
    connection.execute("DELETE FROM push_subscription WHERE id = ?1", (id,))?;

    Ok(())
}
