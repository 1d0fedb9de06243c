//! Tells admins about new pending transactions without holding up the request.

use std::sync::{Arc, Mutex};

use futures::future::join_all;
use rusqlite::Connection;
use tokio::{
    sync::mpsc::{self, UnboundedSender},
    task::JoinHandle,
};

use crate::{
    Error, Transaction,
    notification::{
        DeliveryError, PushGateway, Subscription, delete_subscription, get_admin_subscriptions,
    },
};

/// The outcome of sending one message to every admin subscription.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Subscriptions the message was delivered to.
    pub delivered: usize,
    /// Subscriptions that were gone and have been deleted.
    pub pruned: usize,
    /// Subscriptions that failed for another reason and were kept.
    pub failed: usize,
}

/// Hands pending transactions to a background worker that pushes them to admins.
///
/// Cloning the dispatcher is cheap, all clones feed the same worker.
#[derive(Debug, Clone)]
pub struct NotificationDispatcher {
    sender: Option<UnboundedSender<Transaction>>,
}

impl NotificationDispatcher {
    /// Start a worker that delivers notifications through `gateway`.
    ///
    /// The worker runs until every clone of the returned dispatcher is dropped.
    pub fn spawn<G>(gateway: G, db_connection: Arc<Mutex<Connection>>) -> (Self, JoinHandle<()>)
    where
        G: PushGateway + Send + Sync + 'static,
    {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Transaction>();

        let handle = tokio::spawn(async move {
            while let Some(transaction) = receiver.recv().await {
                let message = notification_message(&transaction);
                let report = deliver_to_all(&gateway, &db_connection, &message).await;

                tracing::info!(
                    "notified admins about transaction {}: {} delivered, {} pruned, {} failed",
                    transaction.id,
                    report.delivered,
                    report.pruned,
                    report.failed
                );
            }

            tracing::debug!("notification worker stopped");
        });

        (
            Self {
                sender: Some(sender),
            },
            handle,
        )
    }

    /// A dispatcher that drops every notification, used when push is not configured.
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    /// Queue a notification about `transaction` and return immediately.
    ///
    /// Failures are logged and never reach the caller.
    pub fn notify_pending_transaction(&self, transaction: &Transaction) {
        let Some(sender) = &self.sender else {
            tracing::debug!(
                "push notifications are disabled, not notifying about transaction {}",
                transaction.id
            );
            return;
        };

        if sender.send(transaction.clone()).is_err() {
            tracing::error!(
                "notification worker has stopped, dropping notification for transaction {}",
                transaction.id
            );
        }
    }
}

/// The text admins see for a new pending transaction.
pub fn notification_message(transaction: &Transaction) -> String {
    format!(
        "{} submitted a new request for ${}.",
        transaction.child_name, transaction.amount
    )
}

/// Send `message` to every admin subscription at the same time.
///
/// Subscriptions the push service reports as gone are deleted. The database
/// lock is released while messages are in flight.
pub async fn deliver_to_all<G>(
    gateway: &G,
    db_connection: &Mutex<Connection>,
    message: &str,
) -> DeliveryReport
where
    G: PushGateway,
{
    let subscriptions = match load_admin_subscriptions(db_connection) {
        Ok(subscriptions) => subscriptions,
        Err(error) => {
            tracing::error!("could not load push subscriptions: {error}");
            return DeliveryReport::default();
        }
    };

    let results = join_all(
        subscriptions
            .iter()
            .map(|subscription| gateway.deliver(&subscription.payload, message)),
    )
    .await;

    let mut report = DeliveryReport::default();
    let mut gone = Vec::new();

    for (subscription, result) in subscriptions.iter().zip(results) {
        match result {
            Ok(()) => report.delivered += 1,
            Err(DeliveryError::Gone) => {
                tracing::info!(
                    "push subscription {} is gone, deleting it",
                    subscription.id
                );
                gone.push(subscription.id);
            }
            Err(error) => {
                tracing::warn!(
                    "could not deliver to push subscription {}: {error}",
                    subscription.id
                );
                report.failed += 1;
            }
        }
    }

    if gone.is_empty() {
        return report;
    }

    let connection = match db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            report.failed += gone.len();
            return report;
        }
    };

    for id in gone {
        match delete_subscription(id, &connection) {
            Ok(()) => report.pruned += 1,
            Err(error) => {
                tracing::error!("could not delete push subscription {id}: {error}");
                report.failed += 1;
            }
        }
    }

    report
}

fn load_admin_subscriptions(db_connection: &Mutex<Connection>) -> Result<Vec<Subscription>, Error> {
    let connection = db_connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError
    })?;

    get_admin_subscriptions(&connection)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use rust_decimal_macros::dec;
    use time::OffsetDateTime;

    use crate::{
        Transaction,
        auth::{Role, UserID},
        notification::{DeliveryError, get_admin_subscriptions, upsert_subscription},
        test_utils::{FakeGateway, get_test_connection, insert_test_user, test_subscription},
        transaction::{Amount, TransactionStatus, TransactionType},
    };

    use super::{DeliveryReport, NotificationDispatcher, deliver_to_all, notification_message};

    fn pending_transaction() -> Transaction {
        Transaction {
            id: 1,
            description: "Candy".to_owned(),
            amount: Amount::new(dec!(5.50)).unwrap(),
            transaction_type: TransactionType::Expense,
            child_name: "Ann".to_owned(),
            status: TransactionStatus::Pending,
            approved_by: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    fn set_up(endpoints: &[(&str, Role)]) -> Arc<Mutex<rusqlite::Connection>> {
        let connection = get_test_connection();
        let mum = insert_test_user("Mum", Role::Admin, &connection);
        let ann = insert_test_user("Ann", Role::Child, &connection);

        for (endpoint, role) in endpoints {
            let user_id: UserID = match role {
                Role::Admin => mum.id,
                Role::Child => ann.id,
            };
            upsert_subscription(user_id, &test_subscription(endpoint), &connection).unwrap();
        }

        Arc::new(Mutex::new(connection))
    }

    #[test]
    fn message_names_child_and_amount() {
        assert_eq!(
            notification_message(&pending_transaction()),
            "Ann submitted a new request for $5.50."
        );
    }

    #[tokio::test]
    async fn delivers_to_admins_only() {
        let db_connection = set_up(&[
            ("https://push/mum", Role::Admin),
            ("https://push/ann", Role::Child),
        ]);
        let gateway = FakeGateway::default();

        let report = deliver_to_all(&gateway, &db_connection, "hello").await;

        assert_eq!(
            report,
            DeliveryReport {
                delivered: 1,
                pruned: 0,
                failed: 0
            }
        );
        assert_eq!(
            gateway.sent(),
            [("https://push/mum".to_owned(), "hello".to_owned())]
        );
    }

    #[tokio::test]
    async fn prunes_gone_and_keeps_failing_subscriptions() {
        let db_connection = set_up(&[
            ("https://push/ok", Role::Admin),
            ("https://push/gone", Role::Admin),
            ("https://push/flaky", Role::Admin),
        ]);
        let gateway = FakeGateway::default()
            .failing("https://push/gone", DeliveryError::Gone)
            .failing(
                "https://push/flaky",
                DeliveryError::Transient("503 Service Unavailable".to_owned()),
            );

        let report = deliver_to_all(&gateway, &db_connection, "hello").await;

        assert_eq!(
            report,
            DeliveryReport {
                delivered: 1,
                pruned: 1,
                failed: 1
            }
        );
        let connection = db_connection.lock().unwrap();
        let remaining: Vec<String> = get_admin_subscriptions(&connection)
            .unwrap()
            .into_iter()
            .map(|subscription| subscription.payload.endpoint)
            .collect();
        assert_eq!(remaining, ["https://push/ok", "https://push/flaky"]);
    }

    #[tokio::test]
    async fn no_subscriptions_is_an_empty_report() {
        let db_connection = set_up(&[]);

        let report = deliver_to_all(&FakeGateway::default(), &db_connection, "hello").await;

        assert_eq!(report, DeliveryReport::default());
    }

    #[tokio::test]
    async fn worker_delivers_queued_notifications() {
        let db_connection = set_up(&[("https://push/mum", Role::Admin)]);
        let gateway = FakeGateway::default();
        let (dispatcher, handle) = NotificationDispatcher::spawn(gateway.clone(), db_connection);

        dispatcher.notify_pending_transaction(&pending_transaction());
        drop(dispatcher);
        handle.await.unwrap();

        assert_eq!(
            gateway.sent(),
            [(
                "https://push/mum".to_owned(),
                "Ann submitted a new request for $5.50.".to_owned()
            )]
        );
    }

    #[test]
    fn disabled_dispatcher_drops_notifications() {
        NotificationDispatcher::disabled().notify_pending_transaction(&pending_transaction());
    }
}
