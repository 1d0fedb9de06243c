//! Registration, log-in and bearer token verification.

mod caller;
mod children;
mod log_in;
mod password;
mod register;
mod role;
mod token;
mod user;

pub use caller::Caller;
pub use children::{ChildSummary, get_children_endpoint};
pub use log_in::{AccessToken, LogInData, log_in_endpoint};
pub use password::PasswordHash;
pub use register::{RegisterData, RegisteredUser, register_endpoint};
pub use role::Role;
pub use token::{Claims, DEFAULT_TOKEN_DURATION, JwtKeys, decode_token, encode_token};
pub use user::{
    User, UserID, create_user, create_user_table, get_child_names, get_user_by_name,
};

#[cfg(test)]
pub(crate) use token::encode_token_at;
