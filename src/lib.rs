//! Allowance is a household finance tracker.
//!
//! Children submit income and expenses for approval, parents (admins) approve
//! or decline them, and everyone can see the running balances they are
//! allowed to see.
//!
//! This library provides the JSON API served by the `server` binary, and the
//! session controller and API client used by the `allowance` terminal client.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    extract::{FromRequest, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use tokio::signal;

mod app_state;
mod auth;
mod balances;
pub mod client;
mod database_id;
mod db;
pub mod endpoints;
mod logging;
mod notification;
mod routing;
mod transaction;

#[cfg(test)]
mod test_utils;

pub use app_state::AppState;
pub use auth::{
    Caller, Claims, JwtKeys, PasswordHash, RegisteredUser, Role, User, UserID, create_user,
    decode_token, encode_token,
};
pub use balances::{ChildBalance, balances_by_child, compute_balance};
pub use db::initialize as initialize_db;
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use notification::{
    DeliveryError, DeliveryReport, NotificationDispatcher, PushGateway, SubscriptionKeys,
    SubscriptionPayload, VapidConfig, WebPushGateway,
};
pub use routing::build_router;
pub use transaction::{
    Amount, NewTransaction, Transaction, TransactionStatus, TransactionType, create_transaction,
};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// A user with the same name is already registered.
    #[error("the name \"{0}\" is already taken")]
    DuplicateUserName(String),

    /// The name was unknown or the password did not match.
    ///
    /// Both cases share one error so that clients cannot tell which names exist.
    #[error("incorrect name or password")]
    InvalidCredentials,

    /// The bearer token was missing, malformed, forged or expired.
    #[error("not authenticated")]
    Unauthenticated,

    /// The caller's role does not allow the operation.
    #[error("you do not have permission to do that")]
    Forbidden,

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An approved transaction cannot be declined, and vice versa.
    #[error("the transaction has already been {0}")]
    AlreadyDecided(String),

    /// A request field failed validation.
    #[error("{0}")]
    InvalidInput(String),

    /// A transaction amount was zero, negative or larger than [Amount::MAX].
    #[error("amount must be greater than zero and at most 1000000000, got {0}")]
    InvalidAmount(String),

    /// The child named in a transaction is not a registered child.
    #[error("\"{0}\" is not a registered child")]
    UnknownChild(String),

    /// The push subscription body did not contain an endpoint and keys.
    #[error("invalid push subscription: {0}")]
    InvalidSubscription(String),

    /// The server was started without VAPID keys.
    #[error("push notifications are not configured on this server")]
    PushNotConfigured,

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// The session token could not be signed.
    #[error("could not create token: {0}")]
    TokenCreation(String),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::InvalidInput(rejection.body_text())
    }
}

/// A JSON request body extractor that reports malformed bodies as an [Error].
///
/// Unlike [axum::Json], a rejected body gets a 400 response with the usual
/// `{"error": ...}` body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(Error))]
pub struct JsonBody<T>(pub T);

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::DuplicateUserName(_) | Error::AlreadyDecided(_) => StatusCode::CONFLICT,
            Error::InvalidCredentials
            | Error::InvalidInput(_)
            | Error::InvalidAmount(_)
            | Error::UnknownChild(_)
            | Error::InvalidSubscription(_) => StatusCode::BAD_REQUEST,
            Error::Unauthenticated => StatusCode::UNAUTHORIZED,
            Error::Forbidden => StatusCode::FORBIDDEN,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::PushNotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            // Any errors that are not handled above are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);

                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal server error" })),
                )
                    .into_response();
            }
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
