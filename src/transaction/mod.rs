//! Transaction management for the allowance tracker.
//!
//! This module contains everything related to transactions:
//! - The `Transaction` model and the exact decimal `Amount`
//! - Database functions for storing and querying transactions
//! - The role-scoped approval workflow
//! - Route handlers for the transaction endpoints

mod amount;
mod core;
mod create_endpoint;
mod decision_endpoint;
mod list_endpoint;
mod workflow;

pub use amount::Amount;
pub use core::{
    NewTransaction, Transaction, TransactionStatus, TransactionType, create_transaction_table,
};
pub use create_endpoint::create_transaction_endpoint;
pub use decision_endpoint::{approve_transaction_endpoint, decline_transaction_endpoint};
pub use list_endpoint::get_transactions_endpoint;
pub use workflow::{Decision, create_transaction, decide_transaction, list_transactions};
