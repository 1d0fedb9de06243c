//! Creates the application's database tables.

use rusqlite::{Connection, Transaction as SqlTransaction};

use crate::{
    auth::create_user_table, notification::create_subscription_table,
    transaction::create_transaction_table,
};

/// Create the tables for users, transactions and push subscriptions.
///
/// The tables are created in a single exclusive transaction, so either all
/// of them exist afterwards or none were added. Calling this on an already
/// initialized database is a no-op.
///
/// # Errors
/// Returns an error if a table could not be created.
pub fn initialize(connection: &Connection) -> Result<(), rusqlite::Error> {
    let transaction =
        SqlTransaction::new_unchecked(connection, rusqlite::TransactionBehavior::Exclusive)?;

    create_user_table(&transaction)?;
    create_transaction_table(&transaction)?;
    create_subscription_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}
