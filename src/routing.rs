//! Application router configuration.

use axum::{
    Router,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};

use crate::{
    AppState, Error,
    auth::{get_children_endpoint, log_in_endpoint, register_endpoint},
    balances::get_balances_endpoint,
    endpoints,
    notification::{get_vapid_public_key_endpoint, subscribe_endpoint},
    transaction::{
        approve_transaction_endpoint, create_transaction_endpoint, decline_transaction_endpoint,
        get_transactions_endpoint,
    },
};

/// Return a router with all the app's routes.
///
/// Routes that need a signed in user take a [Caller](crate::Caller)
/// argument, which rejects requests without a valid bearer token.
pub fn build_router(state: AppState) -> Router {
    let unprotected_routes = Router::new()
        .route(endpoints::REGISTER, post(register_endpoint))
        .route(endpoints::LOG_IN, post(log_in_endpoint))
        .route(
            endpoints::VAPID_PUBLIC_KEY,
            get(get_vapid_public_key_endpoint),
        );

    let protected_routes = Router::new()
        .route(endpoints::SUBSCRIBE, post(subscribe_endpoint))
        .route(endpoints::CHILDREN, get(get_children_endpoint))
        .route(
            endpoints::TRANSACTIONS,
            get(get_transactions_endpoint).post(create_transaction_endpoint),
        )
        .route(
            endpoints::APPROVE_TRANSACTION,
            put(approve_transaction_endpoint),
        )
        .route(
            endpoints::DECLINE_TRANSACTION,
            put(decline_transaction_endpoint),
        )
        .route(endpoints::BALANCES, get(get_balances_endpoint));

    protected_routes
        .merge(unprotected_routes)
        .fallback(get_404_not_found)
        .with_state(state)
}

async fn get_404_not_found() -> Response {
    Error::NotFound.into_response()
}
