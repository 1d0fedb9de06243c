#![allow(missing_docs)]

pub(crate) mod db;
pub(crate) mod http;
pub(crate) mod push;

pub(crate) use db::{get_test_connection, insert_test_user};
pub(crate) use http::{assert_json_error, test_jwt_keys, test_token};
pub(crate) use push::{FakeGateway, test_subscription};
