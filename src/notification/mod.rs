//! Web-push notifications for admins.
//!
//! This module contains:
//! - Storage for the push subscriptions browsers hand out
//! - The [PushGateway] seam and its Web Push implementation
//! - The background dispatcher that fans a message out to every admin
//! - Route handlers for the VAPID key and for subscribing

mod dispatcher;
mod endpoints;
mod gateway;
mod subscription;

pub use dispatcher::{DeliveryReport, NotificationDispatcher};
pub use endpoints::{VapidPublicKey, get_vapid_public_key_endpoint, subscribe_endpoint};
pub use gateway::{DeliveryError, PushGateway, VapidConfig, WebPushGateway};
pub use subscription::{
    Subscription, SubscriptionKeys, SubscriptionPayload, create_subscription_table,
    delete_subscription, get_admin_subscriptions, upsert_subscription,
};
