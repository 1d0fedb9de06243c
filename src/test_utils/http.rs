use axum_test::TestResponse;
use serde_json::Value;

use crate::auth::{DEFAULT_TOKEN_DURATION, JwtKeys, PasswordHash, Role, User, UserID, encode_token};

pub(crate) const TEST_SECRET: &str = "foobar";

pub(crate) fn test_jwt_keys() -> JwtKeys {
    JwtKeys::from_secret(TEST_SECRET)
}

/// Sign a token for a user that may or may not exist in the database.
///
/// Handlers trust the claims, so the user ID does not matter.
#[track_caller]
pub(crate) fn test_token(name: &str, role: Role) -> String {
    let user = User {
        id: UserID::new(1),
        name: name.to_owned(),
        password_hash: PasswordHash::new_unchecked("hunter2"),
        role,
    };

    encode_token(&user, &test_jwt_keys(), DEFAULT_TOKEN_DURATION)
        .expect("Could not create test token.")
}

/// Assert that the response body is `{"error": ...}` and contains `fragment`.
#[track_caller]
pub(crate) fn assert_json_error(response: &TestResponse, fragment: &str) {
    let body = response.json::<Value>();
    let message = body["error"]
        .as_str()
        .unwrap_or_else(|| panic!("want an error message, got {body}"));
    assert!(
        message.contains(fragment),
        "want error containing \"{fragment}\", got \"{message}\""
    );
}
