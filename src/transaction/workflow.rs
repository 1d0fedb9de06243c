//! The role-scoped operations on transactions.
//!
//! Every function takes the verified [Caller] so that the authorization rules
//! cannot be skipped by a route handler.

use rusqlite::Connection;
use time::OffsetDateTime;

use crate::{
    Error,
    auth::{Caller, Role, get_user_by_name},
    database_id::TransactionId,
    transaction::{
        NewTransaction, Transaction, TransactionStatus,
        core::{
            get_transaction, insert_transaction, select_all_transactions,
            select_transactions_for_child, update_transaction_status,
        },
    },
};

/// An admin's verdict on a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Count the transaction towards the child's balance.
    Approve,
    /// Reject the transaction.
    Decline,
}

impl Decision {
    fn status(&self) -> TransactionStatus {
        match self {
            Decision::Approve => TransactionStatus::Approved,
            Decision::Decline => TransactionStatus::Declined,
        }
    }
}

/// List the transactions `caller` may see, newest first.
///
/// Admins see every transaction, children only their own.
pub fn list_transactions(
    caller: &Caller,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    match caller.role {
        Role::Admin => select_all_transactions(connection),
        Role::Child => select_transactions_for_child(&caller.name, connection),
    }
}

/// Create a transaction on behalf of `caller`.
///
/// A child may only create transactions for themselves, and these start out
/// pending. An admin may create transactions for any child, and these are
/// approved by the admin straight away.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidInput] if the description or child name is blank,
/// - [Error::Forbidden] if a child names another child,
/// - [Error::UnknownChild] if an admin names someone who is not a child,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_transaction(
    caller: &Caller,
    new_transaction: NewTransaction,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let new_transaction = NewTransaction {
        description: new_transaction.description.trim().to_owned(),
        child_name: new_transaction.child_name.trim().to_owned(),
        ..new_transaction
    };

    if new_transaction.description.is_empty() {
        return Err(Error::InvalidInput("description cannot be empty".to_owned()));
    }

    if new_transaction.child_name.is_empty() {
        return Err(Error::InvalidInput("child name cannot be empty".to_owned()));
    }

    let (status, approved_by) = match caller.role {
        Role::Child if new_transaction.child_name != caller.name => {
            tracing::warn!(
                "{} tried to create a transaction for {}",
                caller.name,
                new_transaction.child_name
            );
            return Err(Error::Forbidden);
        }
        Role::Child => (TransactionStatus::Pending, None),
        Role::Admin => {
            match get_user_by_name(&new_transaction.child_name, connection) {
                Ok(user) if user.role == Role::Child => {}
                Ok(_) | Err(Error::NotFound) => {
                    return Err(Error::UnknownChild(new_transaction.child_name));
                }
                Err(error) => return Err(error),
            }

            (TransactionStatus::Approved, Some(caller.name.as_str()))
        }
    };

    insert_transaction(
        &new_transaction,
        status,
        approved_by,
        OffsetDateTime::now_utc(),
        connection,
    )
}

/// Approve or decline the transaction `id`.
///
/// Applying the decision a transaction already has is a no-op that returns
/// the transaction unchanged. Reversing a decision is not allowed.
///
/// # Errors
/// This function will return a:
/// - [Error::Forbidden] if `caller` is not an admin,
/// - [Error::NotFound] if `id` does not refer to a transaction,
/// - [Error::AlreadyDecided] if the transaction has the opposite decision,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn decide_transaction(
    caller: &Caller,
    id: TransactionId,
    decision: Decision,
    connection: &Connection,
) -> Result<Transaction, Error> {
    caller.require_admin()?;

    let transaction = get_transaction(id, connection)?;
    let new_status = decision.status();

    match transaction.status {
        TransactionStatus::Pending => {
            let transaction = update_transaction_status(id, new_status, &caller.name, connection)?;
            tracing::info!("{} marked transaction {id} as {new_status}", caller.name);

            Ok(transaction)
        }
        status if status == new_status => Ok(transaction),
        status => Err(Error::AlreadyDecided(status.to_string())),
    }
}
