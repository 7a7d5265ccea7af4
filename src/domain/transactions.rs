//! Transaction intake and read projections.
//!
//! `submit` is the synchronous half of the pipeline: it makes the request
//! durable and idempotent, hands it to the queue, and returns the `pending`
//! record. Settlement happens asynchronously in
//! [`crate::domain::SettlementProcessor`].

use std::sync::Arc;

use tracing::{error, warn};

use crate::domain::ports::{
    BalanceStore, BalanceStoreError, BrokerError, TransactionBroker, TransactionLog,
    TransactionLogError,
};
use crate::domain::{AccountId, Error, Money, Reference, Transaction, TransactionId, TransactionType};

/// A validated transaction submission.
#[derive(Debug, Clone)]
pub struct SubmitTransactionRequest {
    pub account_id: AccountId,
    pub kind: TransactionType,
    pub amount: Money,
    /// Client-supplied idempotency token; generated when absent.
    pub reference: Option<Reference>,
}

/// Intake service: idempotent create-transaction plus the log read paths.
#[derive(Clone)]
pub struct TransactionService {
    balances: Arc<dyn BalanceStore>,
    log: Arc<dyn TransactionLog>,
    broker: Arc<dyn TransactionBroker>,
}

fn map_log_error(error: TransactionLogError) -> Error {
    match error {
        TransactionLogError::NotFound { .. } => Error::not_found("transaction not found"),
        other => Error::internal(other.to_string()),
    }
}

fn map_broker_error(error: BrokerError) -> Error {
    Error::internal(error.to_string())
}

impl TransactionService {
    pub fn new(
        balances: Arc<dyn BalanceStore>,
        log: Arc<dyn TransactionLog>,
        broker: Arc<dyn TransactionBroker>,
    ) -> Self {
        Self {
            balances,
            log,
            broker,
        }
    }

    /// Accept a transaction request, record the intent and enqueue it.
    ///
    /// Returns the recorded transaction: `pending` for a first submission,
    /// or whatever state an earlier submission with the same reference has
    /// reached (idempotent replay).
    pub async fn submit(&self, request: SubmitTransactionRequest) -> Result<Transaction, Error> {
        if request.amount.is_zero() {
            return Err(Error::invalid_request("amount must be positive"));
        }

        let reference = request.reference.unwrap_or_else(Reference::generate);

        // Replay fast path: a known reference short-circuits to the recorded
        // transaction, whatever its current status.
        if let Some(existing) = self
            .log
            .find_by_reference(&reference)
            .await
            .map_err(map_log_error)?
        {
            return Ok(existing);
        }

        match self.balances.get_account(request.account_id).await {
            Ok(_) => {}
            Err(BalanceStoreError::NotFound { .. }) => {
                return Err(Error::not_found("account not found"));
            }
            Err(other) => return Err(Error::internal(other.to_string())),
        }

        let transaction = Transaction::pending(
            request.account_id,
            request.kind,
            request.amount,
            reference.clone(),
        );

        match self.log.insert(&transaction).await {
            Ok(()) => {}
            Err(TransactionLogError::DuplicateReference { .. }) => {
                // A concurrent submission won the insert race; return its
                // record so every caller observes the same transaction.
                warn!(reference = %reference, "duplicate reference insert; replaying winner");
                return self
                    .log
                    .find_by_reference(&reference)
                    .await
                    .map_err(map_log_error)?
                    .ok_or_else(|| {
                        Error::internal("transaction disappeared after duplicate reference")
                    });
            }
            Err(other) => return Err(map_log_error(other)),
        }

        if let Err(publish_error) = self.broker.publish(&transaction).await {
            // The pending intent stays in the log: deleting it would let a
            // retried submission race a late republish of the original. A
            // reconciliation sweep can republish stale pending rows.
            error!(
                transaction_id = %transaction.id,
                error = %publish_error,
                "publish failed; pending intent retained"
            );
            return Err(map_broker_error(publish_error));
        }

        Ok(transaction)
    }

    pub async fn get_transaction(&self, id: TransactionId) -> Result<Transaction, Error> {
        self.log.find_by_id(id).await.map_err(map_log_error)
    }

    /// List an account's transactions, newest first.
    ///
    /// `limit` of zero is an empty page; it must not reach the store, where
    /// some engines treat zero as "no limit".
    pub async fn list_for_account(
        &self,
        account_id: AccountId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transaction>, Error> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.log
            .list_by_account(account_id, limit, offset)
            .await
            .map_err(map_log_error)
    }
}
