//! Domain ports for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod balance_store;
mod transaction_broker;
mod transaction_log;

#[cfg(test)]
pub use balance_store::MockBalanceStore;
pub use balance_store::{BalanceChange, BalanceStore, BalanceStoreError};
#[cfg(test)]
pub use transaction_broker::MockTransactionBroker;
pub use transaction_broker::{
    BrokerError, Delivery, DeliveryHandle, TransactionBroker, TransactionStream,
};
#[cfg(test)]
pub use transaction_log::MockTransactionLog;
pub use transaction_log::{TransactionLog, TransactionLogError};
