//! Behaviour tests for the full submit-and-settle pipeline, run against the
//! in-memory port implementations.

use std::sync::Arc;

use futures_util::future::join_all;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use ledgerd::domain::ports::TransactionBroker;
use ledgerd::domain::{
    AccountId, AccountService, Money, Reference, SettlementProcessor, SubmitTransactionRequest,
    Transaction, TransactionService, TransactionStatus, TransactionType,
};
use ledgerd::test_support::{InMemoryBalanceStore, InMemoryBroker, InMemoryTransactionLog};

struct Pipeline {
    accounts: AccountService,
    transactions: TransactionService,
    processor: SettlementProcessor,
    broker: Arc<InMemoryBroker>,
    log: Arc<InMemoryTransactionLog>,
}

fn pipeline() -> Pipeline {
    let balances = Arc::new(InMemoryBalanceStore::new());
    let log = Arc::new(InMemoryTransactionLog::new());
    let broker = Arc::new(InMemoryBroker::new());

    Pipeline {
        accounts: AccountService::new(balances.clone()),
        transactions: TransactionService::new(balances.clone(), log.clone(), broker.clone()),
        processor: SettlementProcessor::new(balances, log.clone()),
        broker,
        log,
    }
}

fn money(value: Decimal) -> Money {
    Money::new(value).expect("test amount")
}

impl Pipeline {
    async fn create_account(&self, initial_balance: Decimal) -> AccountId {
        self.accounts
            .create_account(money(initial_balance))
            .await
            .expect("account created")
            .id
    }

    async fn submit(
        &self,
        account_id: AccountId,
        kind: TransactionType,
        amount: Decimal,
        reference: Option<&str>,
    ) -> Transaction {
        self.transactions
            .submit(SubmitTransactionRequest {
                account_id,
                kind,
                amount: money(amount),
                reference: reference.map(|r| Reference::new(r).expect("valid reference")),
            })
            .await
            .expect("submission accepted")
    }

    /// Run a settlement consumer until the queue drains.
    async fn settle_all(&self) {
        let stream = self.broker.subscribe().await.expect("subscribe");
        self.processor.run(stream).await;
    }

    async fn balance(&self, account_id: AccountId) -> Decimal {
        self.accounts
            .get_account(account_id)
            .await
            .expect("account exists")
            .balance
            .as_decimal()
    }

    fn statuses(&self) -> (usize, usize, usize) {
        let mut counts = (0, 0, 0);
        for tx in self.log.all() {
            match tx.status {
                TransactionStatus::Pending => counts.0 += 1,
                TransactionStatus::Completed => counts.1 += 1,
                TransactionStatus::Failed => counts.2 += 1,
            }
        }
        counts
    }
}

#[tokio::test]
async fn deposit_then_withdrawal_settles_to_the_expected_balance() {
    let pipeline = pipeline();
    let account_id = pipeline.create_account(dec!(100.00)).await;

    pipeline
        .submit(account_id, TransactionType::Deposit, dec!(50.00), None)
        .await;
    pipeline
        .submit(account_id, TransactionType::Withdrawal, dec!(30.00), None)
        .await;
    pipeline.settle_all().await;

    assert_eq!(pipeline.balance(account_id).await, dec!(120.00));

    let listed = pipeline
        .transactions
        .list_for_account(account_id, 10, 0)
        .await
        .expect("listing succeeds");
    assert_eq!(listed.len(), 2);
    // Newest first: the withdrawal was submitted last.
    assert_eq!(listed[0].kind, TransactionType::Withdrawal);
    assert_eq!(listed[1].kind, TransactionType::Deposit);

    // Every completed transaction's pair differs by exactly its amount.
    for tx in &listed {
        assert_eq!(tx.status, TransactionStatus::Completed);
        let before = tx.balance_before.expect("completed carries before").as_decimal();
        let after = tx.balance_after.expect("completed carries after").as_decimal();
        assert_eq!(after - before, tx.signed_amount());
    }
}

#[tokio::test]
async fn concurrent_withdrawals_never_overdraw() {
    let pipeline = pipeline();
    let account_id = pipeline.create_account(dec!(10.00)).await;

    let submissions = (0..10).map(|_| {
        pipeline.transactions.submit(SubmitTransactionRequest {
            account_id,
            kind: TransactionType::Withdrawal,
            amount: money(dec!(2.00)),
            reference: None,
        })
    });
    for result in join_all(submissions).await {
        result.expect("all submissions accepted");
    }

    pipeline.settle_all().await;

    assert_eq!(pipeline.balance(account_id).await, dec!(0.00));
    let (pending, completed, failed) = pipeline.statuses();
    assert_eq!(pending, 0);
    assert_eq!(completed, 5);
    assert_eq!(failed, 5);
}

#[tokio::test]
async fn concurrent_submissions_with_one_reference_record_one_transaction() {
    let pipeline = pipeline();
    let account_id = pipeline.create_account(dec!(100.00)).await;

    let submissions = (0..3).map(|_| {
        pipeline.transactions.submit(SubmitTransactionRequest {
            account_id,
            kind: TransactionType::Deposit,
            amount: money(dec!(5.00)),
            reference: Some(Reference::new("r-1").expect("valid")),
        })
    });
    let results: Vec<Transaction> = join_all(submissions)
        .await
        .into_iter()
        .map(|result| result.expect("submission accepted"))
        .collect();

    assert!(results.windows(2).all(|pair| pair[0].id == pair[1].id));
    assert_eq!(pipeline.log.all().len(), 1);

    pipeline.settle_all().await;
    assert_eq!(pipeline.balance(account_id).await, dec!(105.00));
    let (_, completed, _) = pipeline.statuses();
    assert_eq!(completed, 1);
}

#[tokio::test]
async fn withdrawal_of_the_whole_balance_completes() {
    let pipeline = pipeline();
    let account_id = pipeline.create_account(dec!(5.00)).await;

    pipeline
        .submit(account_id, TransactionType::Withdrawal, dec!(5.00), None)
        .await;
    pipeline.settle_all().await;

    assert_eq!(pipeline.balance(account_id).await, dec!(0.00));
    let (_, completed, failed) = pipeline.statuses();
    assert_eq!((completed, failed), (1, 0));
}

#[tokio::test]
async fn overdraft_by_one_cent_fails_and_leaves_the_balance() {
    let pipeline = pipeline();
    let account_id = pipeline.create_account(dec!(5.00)).await;

    let tx = pipeline
        .submit(account_id, TransactionType::Withdrawal, dec!(5.01), None)
        .await;
    pipeline.settle_all().await;

    assert_eq!(pipeline.balance(account_id).await, dec!(5.00));
    let settled = pipeline
        .transactions
        .get_transaction(tx.id)
        .await
        .expect("transaction exists");
    assert_eq!(settled.status, TransactionStatus::Failed);
    assert!(settled.balance_before.is_none());
    assert!(settled.balance_after.is_none());
}

#[tokio::test]
async fn transactions_stay_pending_until_a_processor_runs() {
    let pipeline = pipeline();
    let account_id = pipeline.create_account(dec!(0.00)).await;

    let tx = pipeline
        .submit(account_id, TransactionType::Deposit, dec!(10.00), None)
        .await;

    let before_settlement = pipeline
        .transactions
        .get_transaction(tx.id)
        .await
        .expect("transaction exists");
    assert_eq!(before_settlement.status, TransactionStatus::Pending);
    assert_eq!(pipeline.broker.depth(), 1);

    // The queued message survives until a consumer picks it up.
    pipeline.settle_all().await;

    let settled = pipeline
        .transactions
        .get_transaction(tx.id)
        .await
        .expect("transaction exists");
    assert_eq!(settled.status, TransactionStatus::Completed);
    let before = settled.balance_before.expect("pair present").as_decimal();
    let after = settled.balance_after.expect("pair present").as_decimal();
    assert_eq!(after, before + dec!(10.00));
}

#[tokio::test]
async fn large_amounts_settle_exactly() {
    let pipeline = pipeline();
    let account_id = pipeline.create_account(dec!(0.00)).await;

    pipeline
        .submit(account_id, TransactionType::Deposit, dec!(1000000.00), None)
        .await;
    pipeline.settle_all().await;

    let withdrawal = pipeline
        .submit(
            account_id,
            TransactionType::Withdrawal,
            dec!(999999.99),
            None,
        )
        .await;
    pipeline.settle_all().await;

    assert_eq!(pipeline.balance(account_id).await, dec!(0.01));
    let settled = pipeline
        .transactions
        .get_transaction(withdrawal.id)
        .await
        .expect("transaction exists");
    assert_eq!(
        settled.balance_after.expect("pair present").as_decimal(),
        dec!(0.01)
    );
}

#[tokio::test]
async fn redelivered_transactions_are_applied_once() {
    let pipeline = pipeline();
    let account_id = pipeline.create_account(dec!(100.00)).await;

    let tx = pipeline
        .submit(account_id, TransactionType::Deposit, dec!(5.00), None)
        .await;
    pipeline.settle_all().await;
    assert_eq!(pipeline.balance(account_id).await, dec!(105.00));

    // At-least-once delivery: the same message can arrive again.
    pipeline.broker.publish(&tx).await.expect("republish");
    pipeline.settle_all().await;

    assert_eq!(pipeline.balance(account_id).await, dec!(105.00));
    let (_, completed, failed) = pipeline.statuses();
    assert_eq!((completed, failed), (1, 0));
}

#[tokio::test]
async fn listing_pages_from_the_newest_entry() {
    let pipeline = pipeline();
    let account_id = pipeline.create_account(dec!(100.00)).await;

    for reference in ["r-1", "r-2", "r-3"] {
        pipeline
            .submit(
                account_id,
                TransactionType::Deposit,
                dec!(1.00),
                Some(reference),
            )
            .await;
    }
    pipeline.settle_all().await;

    let newest_two = pipeline
        .transactions
        .list_for_account(account_id, 2, 0)
        .await
        .expect("listing succeeds");
    assert_eq!(newest_two.len(), 2);
    assert_eq!(newest_two[0].reference.as_str(), "r-3");
    assert_eq!(newest_two[1].reference.as_str(), "r-2");

    let empty_page = pipeline
        .transactions
        .list_for_account(account_id, 0, 0)
        .await
        .expect("listing succeeds");
    assert!(empty_page.is_empty());

    let past_the_end = pipeline
        .transactions
        .list_for_account(account_id, 10, 50)
        .await
        .expect("listing succeeds");
    assert!(past_the_end.is_empty());
}

#[tokio::test]
async fn balance_always_matches_the_completed_transactions() {
    let pipeline = pipeline();
    let initial = dec!(20.00);
    let account_id = pipeline.create_account(initial).await;

    let mixed = [
        (TransactionType::Deposit, dec!(7.50)),
        (TransactionType::Withdrawal, dec!(12.00)),
        (TransactionType::Withdrawal, dec!(25.00)),
        (TransactionType::Deposit, dec!(0.50)),
        (TransactionType::Withdrawal, dec!(40.00)),
    ];
    for (kind, amount) in mixed {
        pipeline.submit(account_id, kind, amount, None).await;
    }
    pipeline.settle_all().await;

    let expected: Decimal = pipeline
        .log
        .all()
        .iter()
        .filter(|tx| tx.status == TransactionStatus::Completed)
        .map(Transaction::signed_amount)
        .sum::<Decimal>()
        + initial;
    let balance = pipeline.balance(account_id).await;
    assert_eq!(balance, expected);
    assert!(balance >= Decimal::ZERO);
}
