//! Delivers a single push message to a single subscription.

use std::path::Path;

use web_push::{
    ContentEncoding, IsahcWebPushClient, PartialVapidSignatureBuilder, SubscriptionInfo,
    VapidSignatureBuilder, WebPushClient, WebPushError, WebPushMessageBuilder,
};

use crate::notification::SubscriptionPayload;

/// Why a message could not be delivered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The push service says the subscription no longer exists.
    ///
    /// The subscription should be deleted.
    #[error("the subscription is no longer valid")]
    Gone,

    /// Any other failure. The subscription may work next time.
    #[error("delivery failed: {0}")]
    Transient(String),
}

/// Sends push messages to browsers.
pub trait PushGateway {
    /// Send `payload` to `subscription`.
    fn deliver(
        &self,
        subscription: &SubscriptionPayload,
        payload: &str,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

/// The VAPID identity the server signs push messages with.
#[derive(Debug, Clone)]
pub struct VapidConfig {
    /// The base64url encoded public key clients subscribe with.
    pub public_key: String,
    /// The PEM encoded private key.
    pub private_key_pem: String,
    /// A `mailto:` or `https:` contact for the push service operator.
    pub subject: String,
}

impl VapidConfig {
    /// Read the private key from the PEM file at `private_key_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn from_key_file(
        public_key: &str,
        private_key_path: &Path,
        subject: &str,
    ) -> Result<Self, std::io::Error> {
        Ok(Self {
            public_key: public_key.to_owned(),
            private_key_pem: std::fs::read_to_string(private_key_path)?,
            subject: subject.to_owned(),
        })
    }
}

/// A [PushGateway] that talks to real push services using the Web Push protocol.
pub struct WebPushGateway {
    client: IsahcWebPushClient,
    signature_builder: PartialVapidSignatureBuilder,
    subject: String,
}

impl WebPushGateway {
    /// Create a gateway that signs messages with `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the private key is not a valid PEM encoded EC key,
    /// or if the HTTP client could not be created.
    pub fn new(config: &VapidConfig) -> Result<Self, WebPushError> {
        let signature_builder =
            VapidSignatureBuilder::from_pem_no_sub(config.private_key_pem.as_bytes())?;

        Ok(Self {
            client: IsahcWebPushClient::new()?,
            signature_builder,
            subject: config.subject.clone(),
        })
    }

    async fn send(
        &self,
        subscription: &SubscriptionPayload,
        payload: &str,
    ) -> Result<(), WebPushError> {
        let subscription_info = SubscriptionInfo::new(
            &subscription.endpoint,
            &subscription.keys.p256dh,
            &subscription.keys.auth,
        );

        let mut signature_builder = self
            .signature_builder
            .clone()
            .add_sub_info(&subscription_info);
        signature_builder.add_claim("sub", self.subject.as_str());
        let signature = signature_builder.build()?;

        let mut builder = WebPushMessageBuilder::new(&subscription_info);
        builder.set_payload(ContentEncoding::Aes128Gcm, payload.as_bytes());
        builder.set_vapid_signature(signature);

        self.client.send(builder.build()?).await
    }
}

impl PushGateway for WebPushGateway {
    async fn deliver(
        &self,
        subscription: &SubscriptionPayload,
        payload: &str,
    ) -> Result<(), DeliveryError> {
        self.send(subscription, payload)
            .await
            .map_err(delivery_error)
    }
}

/// Push services answer 410 (`EndpointNotValid`) or 404 (`EndpointNotFound`)
/// for subscriptions that will never work again.
fn delivery_error(error: WebPushError) -> DeliveryError {
    match error {
        WebPushError::EndpointNotValid | WebPushError::EndpointNotFound => DeliveryError::Gone,
        error => DeliveryError::Transient(error.to_string()),
    }
}
