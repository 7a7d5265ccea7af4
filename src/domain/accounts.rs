//! Account creation and lookup.

use std::sync::Arc;

use crate::domain::ports::{BalanceStore, BalanceStoreError};
use crate::domain::{Account, AccountId, Error, Money};

/// Thin service over the balance store for the account endpoints.
#[derive(Clone)]
pub struct AccountService {
    balances: Arc<dyn BalanceStore>,
}

/// Map balance store errors to API errors for the account paths.
fn map_balance_error(error: BalanceStoreError) -> Error {
    match error {
        BalanceStoreError::NotFound { .. } => Error::not_found("account not found"),
        other => Error::internal(other.to_string()),
    }
}

impl AccountService {
    pub fn new(balances: Arc<dyn BalanceStore>) -> Self {
        Self { balances }
    }

    /// Create an account. Negative starting balances are unrepresentable in
    /// [`Money`] and rejected at the HTTP boundary.
    pub async fn create_account(&self, initial_balance: Money) -> Result<Account, Error> {
        self.balances
            .create_account(initial_balance)
            .await
            .map_err(map_balance_error)
    }

    pub async fn get_account(&self, id: AccountId) -> Result<Account, Error> {
        self.balances.get_account(id).await.map_err(map_balance_error)
    }
}
