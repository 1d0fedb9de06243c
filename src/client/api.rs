//! A typed HTTP client for the allowance API.

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};

use crate::{
    ChildBalance, NewTransaction, Role, SubscriptionPayload, Transaction,
    auth::{AccessToken, ChildSummary, LogInData, RegisterData, RegisteredUser},
    database_id::TransactionId,
    endpoints::{self, format_endpoint},
    notification::VapidPublicKey,
};

/// Errors returned by [ApiClient].
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The server did not accept the access token (401).
    #[error("not logged in or the session has expired")]
    Unauthenticated,

    /// The caller's role does not allow the request (403).
    #[error("you do not have permission to do that")]
    Forbidden,

    /// Any other unsuccessful response.
    #[error("the server rejected the request ({status}): {message}")]
    Rejected {
        /// The HTTP status code.
        status: u16,
        /// The server's error message.
        message: String,
    },

    /// The request could not be sent or the response could not be read.
    #[error("could not talk to the server: {0}")]
    Request(#[from] reqwest::Error),
}

impl ApiError {
    /// Whether the session should be discarded because of this error.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ApiError::Unauthenticated | ApiError::Forbidden)
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Sends requests to an allowance server.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client for the server at `base_url`, e.g. `http://localhost:3000`.
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    /// The URL of the server.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Create an account.
    pub async fn register(
        &self,
        name: &str,
        password: &str,
        role: Role,
    ) -> Result<RegisteredUser, ApiError> {
        let request = self.client.post(self.url(endpoints::REGISTER)).json(&RegisterData {
            name: name.to_owned(),
            password: password.to_owned(),
            role,
        });

        send_json(request).await
    }

    /// Exchange a name and password for an access token.
    pub async fn log_in(&self, name: &str, password: &str) -> Result<String, ApiError> {
        let request = self.client.post(self.url(endpoints::LOG_IN)).json(&LogInData {
            name: name.to_owned(),
            password: password.to_owned(),
        });

        send_json::<AccessToken>(request)
            .await
            .map(|token| token.access_token)
    }

    /// Get the key needed to subscribe to push notifications.
    pub async fn vapid_public_key(&self) -> Result<String, ApiError> {
        let request = self.client.get(self.url(endpoints::VAPID_PUBLIC_KEY));

        send_json::<VapidPublicKey>(request)
            .await
            .map(|key| key.public_key)
    }

    /// Register a push subscription for the signed in user.
    pub async fn subscribe(
        &self,
        token: &str,
        subscription: &SubscriptionPayload,
    ) -> Result<(), ApiError> {
        let request = self
            .client
            .post(self.url(endpoints::SUBSCRIBE))
            .bearer_auth(token)
            .json(subscription);

        send(request).await.map(|_| ())
    }

    /// List the names of all children. Admin only.
    pub async fn children(&self, token: &str) -> Result<Vec<String>, ApiError> {
        let request = self
            .client
            .get(self.url(endpoints::CHILDREN))
            .bearer_auth(token);

        send_json::<Vec<ChildSummary>>(request)
            .await
            .map(|children| children.into_iter().map(|child| child.name).collect())
    }

    /// List the transactions the signed in user can see, newest first.
    pub async fn transactions(&self, token: &str) -> Result<Vec<Transaction>, ApiError> {
        let request = self
            .client
            .get(self.url(endpoints::TRANSACTIONS))
            .bearer_auth(token);

        send_json(request).await
    }

    /// Submit a transaction.
    pub async fn create_transaction(
        &self,
        token: &str,
        new_transaction: &NewTransaction,
    ) -> Result<Transaction, ApiError> {
        let request = self
            .client
            .post(self.url(endpoints::TRANSACTIONS))
            .bearer_auth(token)
            .json(new_transaction);

        send_json(request).await
    }

    /// Approve a pending transaction. Admin only.
    pub async fn approve(&self, token: &str, id: TransactionId) -> Result<Transaction, ApiError> {
        self.decide(token, endpoints::APPROVE_TRANSACTION, id).await
    }

    /// Decline a pending transaction. Admin only.
    pub async fn decline(&self, token: &str, id: TransactionId) -> Result<Transaction, ApiError> {
        self.decide(token, endpoints::DECLINE_TRANSACTION, id).await
    }

    async fn decide(
        &self,
        token: &str,
        endpoint: &str,
        id: TransactionId,
    ) -> Result<Transaction, ApiError> {
        let request = self
            .client
            .put(self.url(&format_endpoint(endpoint, id)))
            .bearer_auth(token);

        send_json(request).await
    }

    /// Get the balances the signed in user can see.
    pub async fn balances(&self, token: &str) -> Result<Vec<ChildBalance>, ApiError> {
        let request = self
            .client
            .get(self.url(endpoints::BALANCES))
            .bearer_auth(token);

        send_json(request).await
    }
}

async fn send(request: RequestBuilder) -> Result<Response, ApiError> {
    let response = request.send().await?;
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    tracing::debug!("request failed with status {status}");

    match status {
        StatusCode::UNAUTHORIZED => Err(ApiError::Unauthenticated),
        StatusCode::FORBIDDEN => Err(ApiError::Forbidden),
        status => {
            let message = match response.json::<ErrorBody>().await {
                Ok(body) => body.error,
                Err(_) => status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_owned(),
            };

            Err(ApiError::Rejected {
                status: status.as_u16(),
                message,
            })
        }
    }
}

async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ApiError> {
    Ok(send(request).await?.json().await?)
}
