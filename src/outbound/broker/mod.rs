//! RabbitMQ adapter for the pending-transaction queue.

mod rabbit_transaction_broker;

pub use rabbit_transaction_broker::{RabbitTransactionBroker, TRANSACTION_QUEUE};
