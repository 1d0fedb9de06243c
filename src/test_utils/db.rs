use rusqlite::Connection;

use crate::{
    auth::{PasswordHash, Role, User, create_user},
    db::initialize,
};

/// Open an in-memory database with every table created.
#[track_caller]
pub(crate) fn get_test_connection() -> Connection {
    let connection = Connection::open_in_memory().expect("Could not open database in memory.");
    initialize(&connection).expect("Could not initialize database.");
    connection
}

/// Insert a user with a placeholder password hash.
#[track_caller]
pub(crate) fn insert_test_user(name: &str, role: Role, connection: &Connection) -> User {
    create_user(
        name,
        PasswordHash::new_unchecked("hunter2"),
        role,
        connection,
    )
    .expect("Could not create test user.")
}
