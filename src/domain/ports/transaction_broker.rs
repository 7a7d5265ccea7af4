//! Port for the durable pending-transaction queue.
//!
//! Delivery is at-least-once: the same transaction may arrive more than
//! once, and consumers must settle each delivery with exactly one of the
//! handle operations. Re-entrancy is the consumer's problem; the
//! settlement processor re-reads the log before acting.

use async_trait::async_trait;

use crate::domain::Transaction;

use super::define_port_error;

define_port_error! {
    /// Errors raised by broker adapters.
    pub enum BrokerError {
        /// Broker infrastructure is unavailable.
        Unavailable { message: String } => "message broker unavailable: {message}",
        /// The broker refused or failed to persist a publish.
        Publish { message: String } => "failed to publish transaction: {message}",
        /// The message payload could not be encoded or decoded.
        Serialization { message: String } => "failed to encode transaction payload: {message}",
    }
}

/// Acknowledgment handle carried by every delivery.
///
/// Each operation consumes the handle, so a delivery can be settled exactly
/// once.
#[async_trait]
pub trait DeliveryHandle: Send {
    /// Remove the message from the queue.
    async fn ack(self: Box<Self>) -> Result<(), BrokerError>;

    /// Return the message to the queue for redelivery.
    async fn requeue(self: Box<Self>) -> Result<(), BrokerError>;

    /// Drop the message without redelivery.
    async fn discard(self: Box<Self>) -> Result<(), BrokerError>;
}

/// One pending transaction received from the queue.
pub struct Delivery {
    pub transaction: Transaction,
    pub handle: Box<dyn DeliveryHandle>,
}

/// Pull-based sequence of deliveries owned by a single consumer task.
///
/// `next` returning `None` means the stream has closed (broker shutdown or,
/// for in-memory test brokers, a drained queue).
#[async_trait]
pub trait TransactionStream: Send {
    async fn next(&mut self) -> Option<Result<Delivery, BrokerError>>;
}

/// Port for durable publish/consume of pending transactions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransactionBroker: Send + Sync {
    /// Enqueue durably; returns only once the broker acknowledges
    /// persistence.
    async fn publish(&self, transaction: &Transaction) -> Result<(), BrokerError>;

    /// Open a consumer stream over the pending-transaction queue.
    async fn subscribe(&self) -> Result<Box<dyn TransactionStream>, BrokerError>;
}
