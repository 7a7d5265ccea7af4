//! PostgreSQL-backed `BalanceStore` implementation using Diesel.
//!
//! `apply_delta` runs the read-check-write window inside a single database
//! transaction with a `SELECT ... FOR UPDATE` row lock, so concurrent
//! mutations of the same account serialise at the database and an aborted
//! overdraft leaves the row untouched.

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use rust_decimal::Decimal;
use tracing::debug;
use uuid::Uuid;

use crate::domain::ports::{BalanceChange, BalanceStore, BalanceStoreError};
use crate::domain::{Account, AccountId, Money};

use super::models::{AccountRow, NewAccountRow};
use super::pool::{DbPool, PoolError};
use super::schema::accounts;

/// Bootstrap DDL, applied at startup when the table is absent. Mirrors
/// `schema.rs`.
const CREATE_ACCOUNTS_TABLE: &str = "\
CREATE TABLE IF NOT EXISTS accounts (
    id UUID PRIMARY KEY,
    balance NUMERIC(20, 2) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
)";

/// Diesel-backed implementation of the `BalanceStore` port.
#[derive(Clone)]
pub struct PgBalanceStore {
    pool: DbPool,
}

/// Map pool errors to balance store errors.
fn map_pool_error(error: PoolError) -> BalanceStoreError {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => {
            BalanceStoreError::connection(message)
        }
    }
}

/// Map Diesel errors to balance store errors.
fn map_diesel_error(error: diesel::result::Error) -> BalanceStoreError {
    use diesel::result::{DatabaseErrorKind, Error as DieselError};

    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), "diesel operation failed");
        }
        other => debug!(error = %other, "diesel operation failed"),
    }

    match error {
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            BalanceStoreError::connection("database connection closed")
        }
        other => BalanceStoreError::query(other.to_string()),
    }
}

/// Convert a database row into the domain account.
fn row_to_account(row: AccountRow) -> Result<Account, BalanceStoreError> {
    let balance = Money::new(row.balance)
        .map_err(|err| BalanceStoreError::query(format!("corrupt balance in accounts row: {err}")))?;
    Ok(Account {
        id: AccountId::from_uuid(row.id),
        balance,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

/// Internal failure type for the `apply_delta` transaction closure, so the
/// overdraft abort rolls back through Diesel's transaction machinery.
#[derive(Debug)]
enum DeltaFailure {
    NotFound,
    InsufficientFunds,
    Db(diesel::result::Error),
}

impl From<diesel::result::Error> for DeltaFailure {
    fn from(error: diesel::result::Error) -> Self {
        Self::Db(error)
    }
}

impl PgBalanceStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create the accounts table when it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), BalanceStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::sql_query(CREATE_ACCOUNTS_TABLE)
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }
}

#[async_trait]
impl BalanceStore for PgBalanceStore {
    async fn create_account(
        &self,
        initial_balance: Money,
    ) -> Result<Account, BalanceStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let now = Utc::now();
        let new_row = NewAccountRow {
            id: Uuid::new_v4(),
            balance: initial_balance.as_decimal(),
            created_at: now,
            updated_at: now,
        };

        let row: AccountRow = diesel::insert_into(accounts::table)
            .values(&new_row)
            .returning(AccountRow::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        row_to_account(row)
    }

    async fn get_account(&self, id: AccountId) -> Result<Account, BalanceStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row: Option<AccountRow> = accounts::table
            .find(id.as_uuid())
            .select(AccountRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        match row {
            Some(row) => row_to_account(row),
            None => Err(BalanceStoreError::not_found(id.to_string())),
        }
    }

    async fn apply_delta(
        &self,
        id: AccountId,
        delta: Decimal,
    ) -> Result<BalanceChange, BalanceStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let account_uuid = *id.as_uuid();

        let result = conn
            .transaction::<(Decimal, Decimal), DeltaFailure, _>(|conn| {
                async move {
                    // The FOR UPDATE lock is held until commit: the check and
                    // the write observe the same balance.
                    let row: Option<AccountRow> = accounts::table
                        .find(account_uuid)
                        .for_update()
                        .select(AccountRow::as_select())
                        .first(conn)
                        .await
                        .optional()?;
                    let row = row.ok_or(DeltaFailure::NotFound)?;

                    let before = row.balance;
                    let after = before + delta;
                    if after < Decimal::ZERO {
                        return Err(DeltaFailure::InsufficientFunds);
                    }

                    diesel::update(accounts::table.find(account_uuid))
                        .set((
                            accounts::balance.eq(after),
                            accounts::updated_at.eq(Utc::now()),
                        ))
                        .execute(conn)
                        .await?;

                    Ok((before, after))
                }
                .scope_boxed()
            })
            .await;

        let (before, after) = match result {
            Ok(pair) => pair,
            Err(DeltaFailure::NotFound) => {
                return Err(BalanceStoreError::not_found(id.to_string()))
            }
            Err(DeltaFailure::InsufficientFunds) => {
                return Err(BalanceStoreError::insufficient_funds(id.to_string()))
            }
            Err(DeltaFailure::Db(err)) => return Err(map_diesel_error(err)),
        };

        let to_money = |value: Decimal| {
            Money::new(value).map_err(|err| {
                BalanceStoreError::query(format!("corrupt balance in accounts row: {err}"))
            })
        };
        Ok(BalanceChange {
            before: to_money(before)?,
            after: to_money(after)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn pool_error_maps_to_connection_error() {
        let err = map_pool_error(PoolError::checkout("connection refused"));
        assert!(matches!(err, BalanceStoreError::Connection { .. }));
        assert!(err.to_string().contains("connection refused"));
    }

    #[rstest]
    fn closed_connection_maps_to_connection_error() {
        use diesel::result::{DatabaseErrorKind, Error as DieselError};
        let err = map_diesel_error(DieselError::DatabaseError(
            DatabaseErrorKind::ClosedConnection,
            Box::new("closed".to_string()),
        ));
        assert!(matches!(err, BalanceStoreError::Connection { .. }));
    }

    #[rstest]
    fn other_diesel_errors_map_to_query_error() {
        let err = map_diesel_error(diesel::result::Error::NotFound);
        assert!(matches!(err, BalanceStoreError::Query { .. }));
    }

    #[rstest]
    fn delta_failure_wraps_diesel_errors() {
        let failure = DeltaFailure::from(diesel::result::Error::NotFound);
        assert!(matches!(failure, DeltaFailure::Db(_)));
    }
}
