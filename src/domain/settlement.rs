//! Settlement processor: drains the queue and drives pending transactions
//! to a terminal state.
//!
//! The processor is re-entrant under at-least-once delivery: it re-reads the
//! log before acting, so a redelivered transaction that already reached a
//! terminal state is acknowledged without touching any balance. The balance
//! store is authoritative: the log outcome is written only after the
//! balance commit, and a failure to write it is absorbed rather than
//! requeued (a requeue would re-apply the committed delta).

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::domain::ports::{
    BalanceChange, BalanceStore, BalanceStoreError, Delivery, TransactionLog, TransactionLogError,
    TransactionStream,
};
use crate::domain::{Transaction, TransactionStatus};

/// How a delivery is settled against the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Done with this message; remove it from the queue.
    Ack,
    /// Transient failure; return the message for redelivery.
    Requeue,
    /// Unprocessable message; drop it without redelivery.
    Discard,
}

/// Consumes pending transactions and finalises them.
#[derive(Clone)]
pub struct SettlementProcessor {
    balances: Arc<dyn BalanceStore>,
    log: Arc<dyn TransactionLog>,
}

impl SettlementProcessor {
    pub fn new(balances: Arc<dyn BalanceStore>, log: Arc<dyn TransactionLog>) -> Self {
        Self { balances, log }
    }

    /// Drain the stream until it closes.
    pub async fn run(&self, mut stream: Box<dyn TransactionStream>) {
        while let Some(next) = stream.next().await {
            match next {
                Ok(delivery) => self.handle(delivery).await,
                Err(err) => warn!(error = %err, "broker delivery error"),
            }
        }
        info!("transaction stream closed; settlement consumer stopping");
    }

    /// Settle a single delivery and apply the resulting acknowledgment.
    pub async fn handle(&self, delivery: Delivery) {
        let Delivery {
            transaction,
            handle,
        } = delivery;
        let id = transaction.id;
        let disposition = self.settle(&transaction).await;
        let outcome = match disposition {
            Disposition::Ack => handle.ack().await,
            Disposition::Requeue => handle.requeue().await,
            Disposition::Discard => handle.discard().await,
        };
        if let Err(err) = outcome {
            error!(
                transaction_id = %id,
                ?disposition,
                error = %err,
                "failed to report delivery disposition to broker"
            );
        }
    }

    /// The per-message decision procedure.
    pub async fn settle(&self, transaction: &Transaction) -> Disposition {
        // Re-read the intent: redeliveries of already-settled transactions
        // must not touch the balance again.
        match self.log.find_by_id(transaction.id).await {
            Ok(current) if current.status.is_terminal() => {
                debug!(
                    transaction_id = %transaction.id,
                    status = ?current.status,
                    "redelivery of settled transaction"
                );
                return Disposition::Ack;
            }
            Ok(_) => {}
            Err(TransactionLogError::NotFound { .. }) => {
                // The intent is written before the publish, so a missing row
                // means the log lost it; there is nothing to finalise.
                error!(
                    transaction_id = %transaction.id,
                    "no intent row for delivered transaction; discarding"
                );
                return Disposition::Discard;
            }
            Err(err) => {
                warn!(
                    transaction_id = %transaction.id,
                    error = %err,
                    "transaction log unavailable; requeueing"
                );
                return Disposition::Requeue;
            }
        }

        match self.balances.get_account(transaction.account_id).await {
            Ok(_) => {}
            Err(BalanceStoreError::NotFound { .. }) => {
                return self
                    .finalize(transaction, TransactionStatus::Failed, None)
                    .await;
            }
            Err(err) => {
                warn!(
                    transaction_id = %transaction.id,
                    error = %err,
                    "balance store unavailable; requeueing"
                );
                return Disposition::Requeue;
            }
        }

        match self
            .balances
            .apply_delta(transaction.account_id, transaction.signed_amount())
            .await
        {
            Ok(change) => {
                self.finalize(transaction, TransactionStatus::Completed, Some(change))
                    .await
            }
            Err(BalanceStoreError::InsufficientFunds { .. })
            | Err(BalanceStoreError::NotFound { .. }) => {
                self.finalize(transaction, TransactionStatus::Failed, None)
                    .await
            }
            Err(err) => {
                warn!(
                    transaction_id = %transaction.id,
                    error = %err,
                    "balance mutation failed on infrastructure; requeueing"
                );
                Disposition::Requeue
            }
        }
    }

    async fn finalize(
        &self,
        transaction: &Transaction,
        status: TransactionStatus,
        change: Option<BalanceChange>,
    ) -> Disposition {
        match self.log.record_outcome(transaction.id, status, change).await {
            Ok(()) => info!(
                transaction_id = %transaction.id,
                status = ?status,
                "transaction settled"
            ),
            Err(err) => {
                // For completed outcomes the balance mutation has already
                // committed; requeueing would re-apply it. The log is left
                // stale for a reconciler to repair.
                error!(
                    transaction_id = %transaction.id,
                    status = ?status,
                    error = %err,
                    "failed to record settlement outcome"
                );
            }
        }
        Disposition::Ack
    }
}
