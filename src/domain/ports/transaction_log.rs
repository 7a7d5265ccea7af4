//! Port for the append-heavy transaction log store.
//!
//! The log owns every transaction field except the account balance. Its
//! unique index on `reference` is the idempotency gate: a duplicate insert
//! is how a concurrent resubmission loses the race.

use async_trait::async_trait;

use crate::domain::{AccountId, Reference, Transaction, TransactionId, TransactionStatus};

use super::{define_port_error, BalanceChange};

define_port_error! {
    /// Errors raised by transaction log adapters.
    pub enum TransactionLogError {
        /// No transaction exists for the given identifier.
        NotFound { transaction_id: String } => "transaction {transaction_id} not found",
        /// A transaction with this reference is already recorded.
        DuplicateReference { reference: String } => "transaction reference {reference} already recorded",
        /// Store connection could not be established or was lost.
        Connection { message: String } => "transaction log connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "transaction log query failed: {message}",
        /// A stored document could not be decoded, or a payload encoded.
        Serialization { message: String } => "transaction log serialization failed: {message}",
    }
}

impl TransactionLogError {
    /// True for failures of the store itself; these are retryable.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::Query { .. } | Self::Serialization { .. }
        )
    }
}

/// Port for transaction-log persistence and status updates.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransactionLog: Send + Sync {
    /// Record a fresh intent document.
    ///
    /// Fails with [`TransactionLogError::DuplicateReference`] when the
    /// reference is already present; the unique index makes this the
    /// authoritative duplicate check.
    async fn insert(&self, transaction: &Transaction) -> Result<(), TransactionLogError>;

    /// Fetch a transaction by id.
    async fn find_by_id(&self, id: TransactionId) -> Result<Transaction, TransactionLogError>;

    /// Fetch a transaction by its reference.
    ///
    /// Absence is `None`, not an error: the intake path distinguishes a
    /// first-time submission from a replay.
    async fn find_by_reference(
        &self,
        reference: &Reference,
    ) -> Result<Option<Transaction>, TransactionLogError>;

    /// Write a terminal status together with the before/after balance pair
    /// (`None` for failed transactions) at document granularity.
    ///
    /// Idempotent with respect to a repeated identical update; a transaction
    /// already in a terminal state is left untouched.
    async fn record_outcome(
        &self,
        id: TransactionId,
        status: TransactionStatus,
        change: Option<BalanceChange>,
    ) -> Result<(), TransactionLogError>;

    /// List an account's transactions, newest first by `created_at`.
    async fn list_by_account(
        &self,
        account_id: AccountId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transaction>, TransactionLogError>;
}
