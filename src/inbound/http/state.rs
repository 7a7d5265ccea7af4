//! Shared HTTP adapter state.
//!
//! Handlers receive this via `actix_web::web::Data` and depend only on the
//! domain services, so they stay testable against in-memory ports.

use crate::domain::{AccountService, TransactionService};

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub accounts: AccountService,
    pub transactions: TransactionService,
}

impl HttpState {
    pub fn new(accounts: AccountService, transactions: TransactionService) -> Self {
        Self {
            accounts,
            transactions,
        }
    }
}
