//! Database ID type definition.

/// Alias for the integer type used for mapping to database IDs.
pub type DatabaseId = i64;
/// Alias for the database ID of a [transaction](crate::Transaction).
pub type TransactionId = DatabaseId;
/// Alias for the database ID of a push subscription.
pub type SubscriptionId = DatabaseId;
