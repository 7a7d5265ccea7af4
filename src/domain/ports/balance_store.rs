//! Port for the authoritative account balance store.
//!
//! The store owns the `balance` field and is the single source of truth in
//! any conflict with the transaction log. All mutual exclusion for balance
//! mutations is delegated to the store's row lock; no caller may cache a
//! balance between operations.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::{Account, AccountId, Money};

use super::define_port_error;

define_port_error! {
    /// Errors raised by balance store adapters.
    pub enum BalanceStoreError {
        /// No account exists for the given identifier.
        NotFound { account_id: String } => "account {account_id} not found",
        /// Applying the delta would drive the balance below zero.
        InsufficientFunds { account_id: String } => "insufficient funds on account {account_id}",
        /// Store connection could not be established or was lost.
        Connection { message: String } => "balance store connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "balance store query failed: {message}",
    }
}

impl BalanceStoreError {
    /// True for failures of the store itself, as opposed to outcomes of the
    /// requested operation. Infrastructure failures are retryable.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Query { .. })
    }
}

/// The balance observed immediately before and after a committed mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceChange {
    pub before: Money,
    pub after: Money,
}

/// Port for account persistence and the balance-mutation critical section.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BalanceStore: Send + Sync {
    /// Create an account with the given starting balance. Durable on return.
    async fn create_account(&self, initial_balance: Money) -> Result<Account, BalanceStoreError>;

    /// Fetch an account by id.
    async fn get_account(&self, id: AccountId) -> Result<Account, BalanceStoreError>;

    /// Atomically apply a signed delta to an account balance.
    ///
    /// Implementations must hold an exclusive row lock across the whole
    /// read-check-write window: two calls on the same account are strictly
    /// serialised, and a delta that would take the balance negative aborts
    /// with [`BalanceStoreError::InsufficientFunds`] without updating
    /// anything.
    async fn apply_delta(
        &self,
        id: AccountId,
        delta: Decimal,
    ) -> Result<BalanceChange, BalanceStoreError>;
}
