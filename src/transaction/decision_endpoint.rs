//! Defines the endpoints for approving and declining transactions.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, State},
};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    auth::Caller,
    database_id::TransactionId,
    transaction::{Decision, Transaction, decide_transaction},
};

/// The state needed to approve or decline a transaction.
#[derive(Debug, Clone)]
pub struct DecisionState {
    /// The database connection for updating transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for DecisionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler for approving a transaction. Admin only.
pub async fn approve_transaction_endpoint(
    State(state): State<DecisionState>,
    caller: Caller,
    Path(transaction_id): Path<TransactionId>,
) -> Result<Json<Transaction>, Error> {
    decide(&state, &caller, transaction_id, Decision::Approve)
}

/// A route handler for declining a transaction. Admin only.
pub async fn decline_transaction_endpoint(
    State(state): State<DecisionState>,
    caller: Caller,
    Path(transaction_id): Path<TransactionId>,
) -> Result<Json<Transaction>, Error> {
    decide(&state, &caller, transaction_id, Decision::Decline)
}

fn decide(
    state: &DecisionState,
    caller: &Caller,
    transaction_id: TransactionId,
    decision: Decision,
) -> Result<Json<Transaction>, Error> {
    let connection = state.db_connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError
    })?;

    decide_transaction(caller, transaction_id, decision, &connection).map(Json)
}
