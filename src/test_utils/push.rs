use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use crate::notification::{DeliveryError, PushGateway, SubscriptionKeys, SubscriptionPayload};

/// A [PushGateway] that records what it was asked to send.
///
/// Endpoints registered with [FakeGateway::failing] fail with the given error
/// instead.
#[derive(Clone, Default)]
pub(crate) struct FakeGateway {
    outcomes: HashMap<String, DeliveryError>,
    sent: Arc<Mutex<Vec<(String, String)>>>,
}

impl FakeGateway {
    pub(crate) fn failing(mut self, endpoint: &str, error: DeliveryError) -> Self {
        self.outcomes.insert(endpoint.to_owned(), error);
        self
    }

    /// The `(endpoint, payload)` pairs delivered so far, in order.
    pub(crate) fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

impl PushGateway for FakeGateway {
    fn deliver(
        &self,
        subscription: &SubscriptionPayload,
        payload: &str,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send {
        let result = match self.outcomes.get(&subscription.endpoint) {
            Some(error) => Err(error.clone()),
            None => {
                self.sent
                    .lock()
                    .unwrap()
                    .push((subscription.endpoint.clone(), payload.to_owned()));
                Ok(())
            }
        };

        async move { result }
    }
}

pub(crate) fn test_subscription(endpoint: &str) -> SubscriptionPayload {
    SubscriptionPayload {
        endpoint: endpoint.to_owned(),
        keys: SubscriptionKeys {
            p256dh: "key".to_owned(),
            auth: "secret".to_owned(),
        },
    }
}
