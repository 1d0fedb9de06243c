//! Defines the endpoint for creating a new transaction.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;

use crate::{
    AppState, Error, JsonBody,
    auth::Caller,
    notification::NotificationDispatcher,
    transaction::{NewTransaction, TransactionStatus, create_transaction},
};

/// The state needed to create a transaction.
#[derive(Debug, Clone)]
pub struct CreateTransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// Tells admins about new pending transactions.
    pub dispatcher: NotificationDispatcher,
}

impl FromRef<AppState> for CreateTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            dispatcher: state.dispatcher.clone(),
        }
    }
}

/// A route handler for creating a new transaction.
///
/// Responds with 201 and the created transaction. If the transaction needs
/// approval, admins are notified in the background; the response does not
/// wait for, and cannot fail because of, the notifications.
pub async fn create_transaction_endpoint(
    State(state): State<CreateTransactionState>,
    caller: Caller,
    JsonBody(new_transaction): JsonBody<NewTransaction>,
) -> Response {
    let transaction = {
        let connection = match state.db_connection.lock() {
            Ok(connection) => connection,
            Err(error) => {
                tracing::error!("could not acquire database lock: {error}");
                return Error::DatabaseLockError.into_response();
            }
        };

        match create_transaction(&caller, new_transaction, &connection) {
            Ok(transaction) => transaction,
            Err(error) => {
                tracing::error!("could not create transaction: {error}");
                return error.into_response();
            }
        }
    };

    if transaction.status == TransactionStatus::Pending {
        state.dispatcher.notify_pending_transaction(&transaction);
    }

    (StatusCode::CREATED, Json(transaction)).into_response()
}
