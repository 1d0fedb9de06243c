//! The pieces of the terminal client that talk to the server and remember
//! who is signed in.

mod api;
mod session;

pub use api::{ApiClient, ApiError};
pub use session::{
    ClientError, FileTokenStorage, MemoryTokenStorage, Session, SessionController, SessionState,
    SessionUser, TokenStorage, View,
};
