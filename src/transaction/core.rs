//! Defines the core data models and database queries for transactions.

use std::{fmt::Display, str::FromStr};

use rusqlite::{
    Connection, Row,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, database_id::TransactionId, transaction::Amount};

// ============================================================================
// MODELS
// ============================================================================

/// Whether money was earned or spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Money received, e.g. pocket money or a birthday gift.
    Income,
    /// Money spent.
    Expense,
}

impl TransactionType {
    /// The lowercase name used in the database and in JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
        }
    }
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(TransactionType::Income),
            "expense" => Ok(TransactionType::Expense),
            other => Err(format!("unknown transaction type \"{other}\"")),
        }
    }
}

/// Where a transaction is in the approval workflow.
///
/// `Approved` and `Declined` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Submitted by a child and waiting for an admin.
    Pending,
    /// Counts towards the child's balance.
    Approved,
    /// Rejected by an admin, never counts towards a balance.
    Declined,
}

impl TransactionStatus {
    /// The lowercase name used in the database and in JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Approved => "approved",
            TransactionStatus::Declined => "declined",
        }
    }
}

impl Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "approved" => Ok(TransactionStatus::Approved),
            "declined" => Ok(TransactionStatus::Declined),
            other => Err(format!("unknown transaction status \"{other}\"")),
        }
    }
}

impl ToSql for TransactionType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: String| FromSqlError::Other(error.into()))
    }
}

impl ToSql for TransactionStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: String| FromSqlError::Other(error.into()))
    }
}

/// An expense or income of a child.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// A text description of what the transaction was for.
    pub description: String,
    /// The amount of money spent or earned in this transaction.
    pub amount: Amount,
    /// Whether the money was earned or spent.
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// The name of the child the transaction belongs to.
    pub child_name: String,
    /// Where the transaction is in the approval workflow.
    pub status: TransactionStatus,
    /// The name of the admin who approved or declined the transaction.
    ///
    /// Set if and only if the status is not pending.
    pub approved_by: Option<String>,
    /// When the transaction was recorded.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// The fields a client provides to create a transaction.
///
/// The status and approver are decided by the server from the caller's role,
/// so any such fields in a request body are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    /// A text description of what the transaction was for.
    pub description: String,
    /// The amount of money spent or earned.
    pub amount: Amount,
    /// Whether the money was earned or spent.
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// The child the transaction belongs to.
    pub child_name: String,
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create the transaction table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY,
                description TEXT NOT NULL,
                amount TEXT NOT NULL,
                type TEXT NOT NULL CHECK (type IN ('income', 'expense')),
                child_name TEXT NOT NULL,
                status TEXT NOT NULL CHECK (status IN ('pending', 'approved', 'declined')),
                approved_by TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY(child_name) REFERENCES user(name) ON UPDATE CASCADE ON DELETE CASCADE,
                CHECK ((status = 'pending') = (approved_by IS NULL))
                )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_child_name ON \"transaction\"(child_name)",
        (),
    )?;

    Ok(())
}

const TRANSACTION_COLUMNS: &str =
    "id, description, amount, type, child_name, status, approved_by, created_at";

/// Map a database row to a [Transaction].
///
/// The row must contain the columns in the order of `TRANSACTION_COLUMNS`.
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        description: row.get(1)?,
        amount: row.get(2)?,
        transaction_type: row.get(3)?,
        child_name: row.get(4)?,
        status: row.get(5)?,
        approved_by: row.get(6)?,
        created_at: row.get(7)?,
    })
}

/// Insert a transaction with an already decided status.
///
/// The caller is responsible for the approval rules, see
/// [create_transaction](crate::transaction::create_transaction).
pub(crate) fn insert_transaction(
    new_transaction: &NewTransaction,
    status: TransactionStatus,
    approved_by: Option<&str>,
    created_at: OffsetDateTime,
    connection: &Connection,
) -> Result<Transaction, Error> {
    connection
        .prepare(&format!(
            "INSERT INTO \"transaction\" (description, amount, type, child_name, status, approved_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             RETURNING {TRANSACTION_COLUMNS}"
        ))?
        .query_row(
            (
                &new_transaction.description,
                new_transaction.amount,
                new_transaction.transaction_type,
                &new_transaction.child_name,
                status,
                approved_by,
                created_at,
            ),
            map_transaction_row,
        )
        .map_err(|error| error.into())
}

/// Retrieve a transaction in the database by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid transaction,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_transaction(id: TransactionId, connection: &Connection) -> Result<Transaction, Error> {
    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" WHERE id = :id"
        ))?
        .query_row(&[(":id", &id)], map_transaction_row)
        .map_err(|error| error.into())
}

/// Every transaction, newest first.
pub(crate) fn select_all_transactions(connection: &Connection) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" ORDER BY created_at DESC, id DESC"
        ))?
        .query_map([], map_transaction_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(Error::from))
        .collect()
}

/// The transactions of the child `child_name`, newest first.
pub(crate) fn select_transactions_for_child(
    child_name: &str,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\"
             WHERE child_name = :child_name
             ORDER BY created_at DESC, id DESC"
        ))?
        .query_map(&[(":child_name", &child_name)], map_transaction_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(Error::from))
        .collect()
}

/// Set the status and approver of the transaction `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid transaction,
/// - or [Error::SqlError] there is some other SQL error.
pub(crate) fn update_transaction_status(
    id: TransactionId,
    status: TransactionStatus,
    approved_by: &str,
    connection: &Connection,
) -> Result<Transaction, Error> {
    connection
        .prepare(&format!(
            "UPDATE \"transaction\" SET status = ?1, approved_by = ?2 WHERE id = ?3
             RETURNING {TRANSACTION_COLUMNS}"
        ))?
        .query_row((status, approved_by, id), map_transaction_row)
        .map_err(|error| error.into())
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use time::{Duration, OffsetDateTime};

    use crate::{
        Error,
        auth::Role,
        test_utils::{get_test_connection, insert_test_user},
        transaction::{
            Amount, NewTransaction, TransactionStatus, TransactionType,
            core::{
                get_transaction, insert_transaction, select_all_transactions,
                select_transactions_for_child, update_transaction_status,
            },
        },
    };

    fn candy_for(child_name: &str) -> NewTransaction {
        NewTransaction {
            description: "Candy".to_owned(),
            amount: Amount::new(dec!(5)).unwrap(),
            transaction_type: TransactionType::Expense,
            child_name: child_name.to_owned(),
        }
    }

    #[test]
    fn insert_and_get_transaction() {
        let connection = get_test_connection();
        insert_test_user("Ann", Role::Child, &connection);
        let created_at = OffsetDateTime::now_utc();

        let inserted = insert_transaction(
            &candy_for("Ann"),
            TransactionStatus::Pending,
            None,
            created_at,
            &connection,
        )
        .unwrap();
        let selected = get_transaction(inserted.id, &connection).unwrap();

        assert_eq!(inserted, selected);
        assert_eq!(selected.amount.as_decimal(), dec!(5));
        assert_eq!(selected.status, TransactionStatus::Pending);
        assert_eq!(selected.approved_by, None);
    }

    #[test]
    fn get_missing_transaction_fails() {
        let connection = get_test_connection();

        assert_eq!(get_transaction(42, &connection), Err(Error::NotFound));
    }

    #[test]
    fn database_rejects_approved_row_without_approver() {
        let connection = get_test_connection();
        insert_test_user("Ann", Role::Child, &connection);

        let result = insert_transaction(
            &candy_for("Ann"),
            TransactionStatus::Approved,
            None,
            OffsetDateTime::now_utc(),
            &connection,
        );

        assert!(matches!(result, Err(Error::SqlError(_))));
    }

    #[test]
    fn selects_newest_first() {
        let connection = get_test_connection();
        insert_test_user("Ann", Role::Child, &connection);
        let now = OffsetDateTime::now_utc();
        let older = insert_transaction(
            &candy_for("Ann"),
            TransactionStatus::Pending,
            None,
            now - Duration::days(1),
            &connection,
        )
        .unwrap();
        let newer = insert_transaction(
            &candy_for("Ann"),
            TransactionStatus::Pending,
            None,
            now,
            &connection,
        )
        .unwrap();

        let transactions = select_all_transactions(&connection).unwrap();

        assert_eq!(transactions, vec![newer, older]);
    }

    #[test]
    fn selects_only_rows_of_child() {
        let connection = get_test_connection();
        insert_test_user("Ann", Role::Child, &connection);
        insert_test_user("Bob", Role::Child, &connection);
        let now = OffsetDateTime::now_utc();
        let anns = insert_transaction(
            &candy_for("Ann"),
            TransactionStatus::Pending,
            None,
            now,
            &connection,
        )
        .unwrap();
        insert_transaction(
            &candy_for("Bob"),
            TransactionStatus::Pending,
            None,
            now,
            &connection,
        )
        .unwrap();

        let transactions = select_transactions_for_child("Ann", &connection).unwrap();

        assert_eq!(transactions, vec![anns]);
    }

    #[test]
    fn update_missing_transaction_fails() {
        let connection = get_test_connection();

        let result = update_transaction_status(7, TransactionStatus::Approved, "Mum", &connection);

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn transaction_json_uses_type_key() {
        let connection = get_test_connection();
        insert_test_user("Ann", Role::Child, &connection);
        let transaction = insert_transaction(
            &candy_for("Ann"),
            TransactionStatus::Pending,
            None,
            OffsetDateTime::now_utc(),
            &connection,
        )
        .unwrap();

        let json = serde_json::to_value(&transaction).unwrap();

        assert_eq!(json["type"], "expense");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["amount"], "5");
        assert!(json["approved_by"].is_null());
    }
}
