//! Code for creating the user table and fetching users from the database.

use std::fmt::Display;

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    auth::{PasswordHash, Role},
};

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A member of the family.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserID,
    /// The unique name the user logs in with.
    pub name: String,
    /// The user's password hash.
    pub password_hash: PasswordHash,
    /// What the user is allowed to do.
    pub role: Role,
}

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                password TEXT NOT NULL,
                role TEXT NOT NULL CHECK (role IN ('admin', 'child'))
                )",
        (),
    )?;

    Ok(())
}

fn map_user_row(row: &Row) -> Result<User, rusqlite::Error> {
    let raw_password_hash: String = row.get(2)?;

    Ok(User {
        id: UserID::new(row.get(0)?),
        name: row.get(1)?,
        password_hash: PasswordHash::new_unchecked(&raw_password_hash),
        role: row.get(3)?,
    })
}

/// Create and insert a new user into the database.
///
/// # Errors
///
/// Returns a:
/// - [Error::DuplicateUserName] if `name` is already registered,
/// - [Error::SqlError] if some other SQL related error occurred.
pub fn create_user(
    name: &str,
    password_hash: PasswordHash,
    role: Role,
    connection: &Connection,
) -> Result<User, Error> {
    connection
        .prepare(
            "INSERT INTO user (name, password, role) VALUES (?1, ?2, ?3)
             RETURNING id, name, password, role",
        )?
        .query_row((name, password_hash.as_ref(), role), map_user_row)
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
                },
                _,
            ) => Error::DuplicateUserName(name.to_owned()),
            error => error.into(),
        })
}

/// Get the user from the database whose name is `name`.
///
/// # Errors
///
/// This function will return an error if:
/// - `name` does not belong to a registered user ([Error::NotFound]),
/// - there was an error trying to access the store.
pub fn get_user_by_name(name: &str, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare("SELECT id, name, password, role FROM user WHERE name = :name")?
        .query_row(&[(":name", &name)], map_user_row)
        .map_err(|error| error.into())
}

/// Get the names of every child, ordered alphabetically.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn get_child_names(connection: &Connection) -> Result<Vec<String>, Error> {
    connection
        .prepare("SELECT name FROM user WHERE role = :role ORDER BY name ASC")?
        .query_map(&[(":role", &Role::Child)], |row| row.get(0))?
        .map(|maybe_name| maybe_name.map_err(Error::from))
        .collect()
}

#[cfg(test)]
mod user_tests {
    use rusqlite::Connection;

    use crate::{
        Error,
        auth::{PasswordHash, Role},
    };

    use super::{create_user, create_user_table, get_child_names, get_user_by_name};

    fn get_db_connection() -> Connection {
        let conn =
            Connection::open_in_memory().expect("Could not create in-memory SQLite database");
        create_user_table(&conn).expect("Could not create user table");

        conn
    }

    #[test]
    fn insert_user_succeeds() {
        let db_connection = get_db_connection();
        let password_hash = PasswordHash::new_unchecked("hunter2");

        let inserted_user =
            create_user("Ann", password_hash.clone(), Role::Child, &db_connection).unwrap();

        assert!(inserted_user.id.as_i64() > 0);
        assert_eq!(inserted_user.name, "Ann");
        assert_eq!(inserted_user.password_hash, password_hash);
        assert_eq!(inserted_user.role, Role::Child);
    }

    #[test]
    fn insert_duplicate_name_fails() {
        let db_connection = get_db_connection();
        create_user(
            "Ann",
            PasswordHash::new_unchecked("hunter2"),
            Role::Child,
            &db_connection,
        )
        .unwrap();

        let result = create_user(
            "Ann",
            PasswordHash::new_unchecked("hunter3"),
            Role::Admin,
            &db_connection,
        );

        assert_eq!(result, Err(Error::DuplicateUserName("Ann".to_owned())));
    }

    #[test]
    fn get_user_fails_with_unknown_name() {
        let db_connection = get_db_connection();

        assert_eq!(
            get_user_by_name("Nobody", &db_connection),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn get_user_succeeds_with_existing_name() {
        let db_connection = get_db_connection();
        let test_user = create_user(
            "Mum",
            PasswordHash::new_unchecked("hunter2"),
            Role::Admin,
            &db_connection,
        )
        .unwrap();

        let retrieved_user = get_user_by_name("Mum", &db_connection).unwrap();

        assert_eq!(retrieved_user, test_user);
    }

    #[test]
    fn child_names_exclude_admins_and_are_sorted() {
        let db_connection = get_db_connection();
        for (name, role) in [
            ("Zoe", Role::Child),
            ("Mum", Role::Admin),
            ("Ann", Role::Child),
        ] {
            create_user(
                name,
                PasswordHash::new_unchecked("hunter2"),
                role,
                &db_connection,
            )
            .unwrap();
        }

        let names = get_child_names(&db_connection).unwrap();

        assert_eq!(names, vec!["Ann".to_owned(), "Zoe".to_owned()]);
    }
}
