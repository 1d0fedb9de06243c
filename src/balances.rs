//! Works out how much money each child has.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use axum::{
    Json,
    extract::{FromRef, State},
};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error,
    auth::Caller,
    transaction::{Transaction, TransactionStatus, TransactionType, list_transactions},
};

/// The balance of a single child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildBalance {
    /// The name of the child.
    pub child_name: String,
    /// Approved income minus approved expenses.
    ///
    /// May be negative.
    pub balance: Decimal,
}

/// Sum approved income and subtract approved expenses.
///
/// Pending and declined transactions do not count. The sum saturates at
/// [Decimal::MAX] and [Decimal::MIN] instead of overflowing.
pub fn compute_balance<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> Decimal {
    transactions
        .into_iter()
        .filter(|transaction| transaction.status == TransactionStatus::Approved)
        .fold(Decimal::ZERO, |balance, transaction| {
            match transaction.transaction_type {
                TransactionType::Income => balance.saturating_add(transaction.amount.as_decimal()),
                TransactionType::Expense => balance.saturating_sub(transaction.amount.as_decimal()),
            }
        })
}

/// Compute the balance of every child that appears in `transactions`, sorted by name.
pub fn balances_by_child(transactions: &[Transaction]) -> Vec<ChildBalance> {
    let mut by_child: BTreeMap<&str, Vec<&Transaction>> = BTreeMap::new();

    for transaction in transactions {
        by_child
            .entry(transaction.child_name.as_str())
            .or_default()
            .push(transaction);
    }

    by_child
        .into_iter()
        .map(|(child_name, transactions)| ChildBalance {
            child_name: child_name.to_owned(),
            balance: compute_balance(transactions),
        })
        .collect()
}

/// The state needed to compute balances.
#[derive(Debug, Clone)]
pub struct BalancesState {
    /// The database connection for reading transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for BalancesState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler that returns the balances of the transactions the caller can see.
///
/// Admins get every child, children get only themselves.
pub async fn get_balances_endpoint(
    State(state): State<BalancesState>,
    caller: Caller,
) -> Result<Json<Vec<ChildBalance>>, Error> {
    let transactions = {
        let connection = state.db_connection.lock().map_err(|error| {
            tracing::error!("could not acquire database lock: {error}");
            Error::DatabaseLockError
        })?;

        list_transactions(&caller, &connection)?
    };

    Ok(Json(balances_by_child(&transactions)))
}
