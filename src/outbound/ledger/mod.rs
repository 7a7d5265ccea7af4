//! MongoDB adapter for the transaction log.

mod mongo_transaction_log;

pub use mongo_transaction_log::MongoTransactionLog;
