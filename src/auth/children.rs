//! Lists the children an admin can enter transactions for.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error,
    auth::{Caller, get_child_names},
};

/// The state needed to list children.
#[derive(Debug, Clone)]
pub struct ChildrenState {
    /// The database connection for looking up users.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for ChildrenState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A child as listed for admins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildSummary {
    /// The child's name.
    pub name: String,
}

/// A route handler that lists every child. Admin only.
pub async fn get_children_endpoint(
    State(state): State<ChildrenState>,
    caller: Caller,
) -> Result<Json<Vec<ChildSummary>>, Error> {
    caller.require_admin()?;

    let connection = state.db_connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError
    })?;

    let children = get_child_names(&connection)?
        .into_iter()
        .map(|name| ChildSummary { name })
        .collect();

    Ok(Json(children))
}
