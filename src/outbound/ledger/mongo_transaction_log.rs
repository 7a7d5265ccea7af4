//! MongoDB-backed `TransactionLog` implementation.
//!
//! The collection holds one document per transaction, keyed by the
//! transaction id, with a unique index on `reference` (the idempotency
//! gate) and a secondary index on `account_id` for listing. Documents are
//! converted to and from the domain type at this boundary; money fields are
//! stored as decimal strings and timestamps as BSON datetimes.

use async_trait::async_trait;
use bson::{doc, Bson, Document};
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, IndexModel};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::ports::{BalanceChange, TransactionLog, TransactionLogError};
use crate::domain::{
    AccountId, Money, Reference, Transaction, TransactionId, TransactionStatus, TransactionType,
};

const TRANSACTIONS_COLLECTION: &str = "transactions";

/// MongoDB implementation of the `TransactionLog` port.
#[derive(Clone)]
pub struct MongoTransactionLog {
    collection: Collection<TransactionDocument>,
}

/// Stored shape of a transaction document.
///
/// Private to the adapter; `_id` is the transaction id in string form so a
/// redelivered message and the API lookups address the same document.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TransactionDocument {
    #[serde(rename = "_id")]
    id: String,
    account_id: String,
    #[serde(rename = "type")]
    kind: TransactionType,
    amount: Money,
    status: TransactionStatus,
    reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    balance_before: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    balance_after: Option<Money>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    created_at: DateTime<Utc>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    updated_at: DateTime<Utc>,
}

impl From<&Transaction> for TransactionDocument {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: tx.id.to_string(),
            account_id: tx.account_id.to_string(),
            kind: tx.kind,
            amount: tx.amount,
            status: tx.status,
            reference: tx.reference.as_str().to_owned(),
            balance_before: tx.balance_before,
            balance_after: tx.balance_after,
            created_at: tx.created_at,
            updated_at: tx.updated_at,
        }
    }
}

impl TryFrom<TransactionDocument> for Transaction {
    type Error = TransactionLogError;

    fn try_from(doc: TransactionDocument) -> Result<Self, Self::Error> {
        let corrupt =
            |what: &str| TransactionLogError::serialization(format!("corrupt {what} in document"));
        Ok(Self {
            id: TransactionId::parse(&doc.id).map_err(|_| corrupt("transaction id"))?,
            account_id: AccountId::parse(&doc.account_id).map_err(|_| corrupt("account id"))?,
            kind: doc.kind,
            amount: doc.amount,
            status: doc.status,
            reference: Reference::new(doc.reference).map_err(|_| corrupt("reference"))?,
            balance_before: doc.balance_before,
            balance_after: doc.balance_after,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        })
    }
}

/// True when the error is a unique-index violation.
fn is_duplicate_key(error: &mongodb::error::Error) -> bool {
    matches!(
        *error.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref write_error)) if write_error.code == 11000
    )
}

/// Map driver errors to transaction log errors.
fn map_mongo_error(error: mongodb::error::Error) -> TransactionLogError {
    debug!(error = %error, "mongodb operation failed");
    match *error.kind {
        ErrorKind::Io(_) | ErrorKind::ServerSelection { .. } => {
            TransactionLogError::connection(error.to_string())
        }
        _ => TransactionLogError::query(error.to_string()),
    }
}

fn status_to_bson(status: TransactionStatus) -> Result<Bson, TransactionLogError> {
    bson::ser::to_bson(&status).map_err(|err| TransactionLogError::serialization(err.to_string()))
}

impl MongoTransactionLog {
    /// Connect, verify the deployment is reachable and ensure the indexes.
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self, TransactionLogError> {
        let client = Client::with_uri_str(uri)
            .await
            .map_err(|err| TransactionLogError::connection(err.to_string()))?;
        let database = client.database(db_name);

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|err| TransactionLogError::connection(err.to_string()))?;

        let collection = database.collection::<TransactionDocument>(TRANSACTIONS_COLLECTION);

        collection
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "account_id": 1 })
                    .build(),
            )
            .await
            .map_err(map_mongo_error)?;
        collection
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "reference": 1 })
                    .options(IndexOptions::builder().unique(true).build())
                    .build(),
            )
            .await
            .map_err(map_mongo_error)?;

        Ok(Self { collection })
    }
}

#[async_trait]
impl TransactionLog for MongoTransactionLog {
    async fn insert(&self, transaction: &Transaction) -> Result<(), TransactionLogError> {
        let document = TransactionDocument::from(transaction);
        match self.collection.insert_one(&document).await {
            Ok(_) => Ok(()),
            Err(err) if is_duplicate_key(&err) => Err(TransactionLogError::duplicate_reference(
                transaction.reference.as_str(),
            )),
            Err(err) => Err(map_mongo_error(err)),
        }
    }

    async fn find_by_id(&self, id: TransactionId) -> Result<Transaction, TransactionLogError> {
        let document = self
            .collection
            .find_one(doc! { "_id": id.to_string() })
            .await
            .map_err(map_mongo_error)?;
        match document {
            Some(document) => document.try_into(),
            None => Err(TransactionLogError::not_found(id.to_string())),
        }
    }

    async fn find_by_reference(
        &self,
        reference: &Reference,
    ) -> Result<Option<Transaction>, TransactionLogError> {
        let document = self
            .collection
            .find_one(doc! { "reference": reference.as_str() })
            .await
            .map_err(map_mongo_error)?;
        document.map(Transaction::try_from).transpose()
    }

    async fn record_outcome(
        &self,
        id: TransactionId,
        status: TransactionStatus,
        change: Option<BalanceChange>,
    ) -> Result<(), TransactionLogError> {
        let mut set = Document::new();
        set.insert("status", status_to_bson(status)?);
        set.insert("updated_at", Bson::DateTime(bson::DateTime::now()));
        if let Some(change) = change {
            set.insert("balance_before", money_to_bson(change.before)?);
            set.insert("balance_after", money_to_bson(change.after)?);
        }

        // Only pending documents transition; a redelivered finalisation of an
        // already-terminal transaction matches nothing and is a no-op.
        self.collection
            .update_one(
                doc! { "_id": id.to_string(), "status": status_to_bson(TransactionStatus::Pending)? },
                doc! { "$set": set },
            )
            .await
            .map(|_| ())
            .map_err(map_mongo_error)
    }

    async fn list_by_account(
        &self,
        account_id: AccountId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transaction>, TransactionLogError> {
        let cursor = self
            .collection
            .find(doc! { "account_id": account_id.to_string() })
            .sort(doc! { "created_at": -1 })
            .limit(limit)
            .skip(offset.max(0) as u64)
            .await
            .map_err(map_mongo_error)?;

        let documents: Vec<TransactionDocument> =
            cursor.try_collect().await.map_err(map_mongo_error)?;
        documents
            .into_iter()
            .map(Transaction::try_from)
            .collect()
    }
}

fn money_to_bson(value: Money) -> Result<Bson, TransactionLogError> {
    bson::ser::to_bson(&value).map_err(|err| TransactionLogError::serialization(err.to_string()))
}
