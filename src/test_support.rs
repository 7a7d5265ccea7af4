//! Functional in-memory port implementations.
//!
//! These back the behaviour tests in `tests/` and the handler tests: the
//! whole submit-and-settle pipeline can run against them without any
//! infrastructure. Mutual exclusion mirrors the real adapters, with the
//! balance map's lock serialising `apply_delta` the way the row lock does.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;

use crate::domain::ports::{
    BalanceChange, BalanceStore, BalanceStoreError, BrokerError, Delivery, DeliveryHandle,
    TransactionBroker, TransactionLog, TransactionLogError, TransactionStream,
};
use crate::domain::{
    Account, AccountId, Money, Reference, Transaction, TransactionId, TransactionStatus,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// In-memory account store with serialised balance mutations.
#[derive(Clone, Default)]
pub struct InMemoryBalanceStore {
    accounts: Arc<Mutex<HashMap<AccountId, Account>>>,
}

impl InMemoryBalanceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BalanceStore for InMemoryBalanceStore {
    async fn create_account(
        &self,
        initial_balance: Money,
    ) -> Result<Account, BalanceStoreError> {
        let now = Utc::now();
        let account = Account {
            id: AccountId::random(),
            balance: initial_balance,
            created_at: now,
            updated_at: now,
        };
        lock(&self.accounts).insert(account.id, account.clone());
        Ok(account)
    }

    async fn get_account(&self, id: AccountId) -> Result<Account, BalanceStoreError> {
        lock(&self.accounts)
            .get(&id)
            .cloned()
            .ok_or_else(|| BalanceStoreError::not_found(id.to_string()))
    }

    async fn apply_delta(
        &self,
        id: AccountId,
        delta: Decimal,
    ) -> Result<BalanceChange, BalanceStoreError> {
        let mut accounts = lock(&self.accounts);
        let account = accounts
            .get_mut(&id)
            .ok_or_else(|| BalanceStoreError::not_found(id.to_string()))?;

        let before = account.balance;
        let after = before.as_decimal() + delta;
        if after < Decimal::ZERO {
            return Err(BalanceStoreError::insufficient_funds(id.to_string()));
        }
        let after = Money::new(after)
            .map_err(|err| BalanceStoreError::query(format!("invalid resulting balance: {err}")))?;

        account.balance = after;
        account.updated_at = Utc::now();
        Ok(BalanceChange { before, after })
    }
}

/// In-memory transaction log with a unique-reference gate.
#[derive(Clone, Default)]
pub struct InMemoryTransactionLog {
    // Insertion order is kept so listings can break created_at ties
    // newest-insert-first.
    transactions: Arc<Mutex<Vec<Transaction>>>,
}

impl InMemoryTransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every recorded transaction, in insertion order.
    pub fn all(&self) -> Vec<Transaction> {
        lock(&self.transactions).clone()
    }
}

#[async_trait]
impl TransactionLog for InMemoryTransactionLog {
    async fn insert(&self, transaction: &Transaction) -> Result<(), TransactionLogError> {
        let mut transactions = lock(&self.transactions);
        if transactions
            .iter()
            .any(|existing| existing.reference == transaction.reference)
        {
            return Err(TransactionLogError::duplicate_reference(
                transaction.reference.as_str(),
            ));
        }
        transactions.push(transaction.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: TransactionId) -> Result<Transaction, TransactionLogError> {
        lock(&self.transactions)
            .iter()
            .find(|tx| tx.id == id)
            .cloned()
            .ok_or_else(|| TransactionLogError::not_found(id.to_string()))
    }

    async fn find_by_reference(
        &self,
        reference: &Reference,
    ) -> Result<Option<Transaction>, TransactionLogError> {
        Ok(lock(&self.transactions)
            .iter()
            .find(|tx| tx.reference == *reference)
            .cloned())
    }

    async fn record_outcome(
        &self,
        id: TransactionId,
        status: TransactionStatus,
        change: Option<BalanceChange>,
    ) -> Result<(), TransactionLogError> {
        let mut transactions = lock(&self.transactions);
        let transaction = transactions
            .iter_mut()
            .find(|tx| tx.id == id)
            .ok_or_else(|| TransactionLogError::not_found(id.to_string()))?;
        if transaction.status.is_terminal() {
            // Terminal states never transition; a repeated finalisation is a
            // no-op.
            return Ok(());
        }
        transaction.status = status;
        transaction.balance_before = change.map(|c| c.before);
        transaction.balance_after = change.map(|c| c.after);
        transaction.updated_at = Utc::now();
        Ok(())
    }

    async fn list_by_account(
        &self,
        account_id: AccountId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transaction>, TransactionLogError> {
        let transactions = lock(&self.transactions);
        let mut matching: Vec<(usize, &Transaction)> = transactions
            .iter()
            .enumerate()
            .filter(|(_, tx)| tx.account_id == account_id)
            .collect();
        // Newest first; insertion order breaks created_at ties.
        matching.sort_by(|(ia, a), (ib, b)| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| ib.cmp(ia))
        });
        Ok(matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|(_, tx)| tx.clone())
            .collect())
    }
}

type SharedQueue = Arc<Mutex<VecDeque<Transaction>>>;

/// In-memory broker backed by a shared queue.
///
/// Unlike the real broker, a consumer stream ends when the queue drains;
/// tests publish their submissions and then run the settlement processor to
/// quiescence. A requeued delivery is pushed back and consumed again.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    queue: SharedQueue,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages currently queued.
    pub fn depth(&self) -> usize {
        lock(&self.queue).len()
    }
}

#[async_trait]
impl TransactionBroker for InMemoryBroker {
    async fn publish(&self, transaction: &Transaction) -> Result<(), BrokerError> {
        lock(&self.queue).push_back(transaction.clone());
        Ok(())
    }

    async fn subscribe(&self) -> Result<Box<dyn TransactionStream>, BrokerError> {
        Ok(Box::new(InMemoryTransactionStream {
            queue: Arc::clone(&self.queue),
        }))
    }
}

struct InMemoryTransactionStream {
    queue: SharedQueue,
}

#[async_trait]
impl TransactionStream for InMemoryTransactionStream {
    async fn next(&mut self) -> Option<Result<Delivery, BrokerError>> {
        let transaction = lock(&self.queue).pop_front()?;
        Some(Ok(Delivery {
            transaction: transaction.clone(),
            handle: Box::new(InMemoryDeliveryHandle {
                transaction,
                queue: Arc::clone(&self.queue),
            }),
        }))
    }
}

struct InMemoryDeliveryHandle {
    transaction: Transaction,
    queue: SharedQueue,
}

#[async_trait]
impl DeliveryHandle for InMemoryDeliveryHandle {
    async fn ack(self: Box<Self>) -> Result<(), BrokerError> {
        Ok(())
    }

    async fn requeue(self: Box<Self>) -> Result<(), BrokerError> {
        let Self { transaction, queue } = *self;
        lock(&queue).push_back(transaction);
        Ok(())
    }

    async fn discard(self: Box<Self>) -> Result<(), BrokerError> {
        Ok(())
    }
}
