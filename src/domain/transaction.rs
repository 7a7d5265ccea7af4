//! Transaction entity, identifiers and idempotency reference.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AccountId, Money};

/// Validation error for [`TransactionId`] parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("transaction id must be a UUID")]
pub struct TransactionIdParseError;

/// Opaque transaction identifier, assigned when the intent is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(Uuid);

impl TransactionId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn parse(value: &str) -> Result<Self, TransactionIdParseError> {
        Uuid::parse_str(value.trim())
            .map(Self)
            .map_err(|_| TransactionIdParseError)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Validation error for [`Reference`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("transaction reference must not be empty")]
pub struct ReferenceValidationError;

/// Client-supplied (or server-generated) idempotency token.
///
/// Globally unique across the whole transaction log: the log store enforces
/// uniqueness, and a resubmission carrying a known reference replays the
/// recorded transaction instead of creating a second one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Reference(String);

impl Reference {
    /// Validate and construct a reference from client input.
    pub fn new(value: impl Into<String>) -> Result<Self, ReferenceValidationError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(ReferenceValidationError);
        }
        Ok(Self(value))
    }

    /// Generate a fresh server-side reference for clients that omitted one.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Reference> for String {
    fn from(value: Reference) -> Self {
        value.0
    }
}

impl TryFrom<String> for Reference {
    type Error = ReferenceValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Direction of a transaction; amounts themselves are never signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
}

impl TransactionType {
    /// The signed delta this transaction applies to a balance.
    pub fn signed(&self, amount: Money) -> Decimal {
        match self {
            Self::Deposit => amount.as_decimal(),
            Self::Withdrawal => -amount.as_decimal(),
        }
    }
}

/// Processing state of a transaction.
///
/// `pending` transitions exactly once, to `completed` or `failed`; terminal
/// states never transition again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// A single ledger transaction.
///
/// `balance_before` and `balance_after` are populated only once the
/// transaction completes; failed transactions carry no pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub account_id: AccountId,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: Money,
    pub status: TransactionStatus,
    pub reference: Reference,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance_before: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance_after: Option<Money>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Build a fresh `pending` intent with a new identifier and timestamps.
    pub fn pending(
        account_id: AccountId,
        kind: TransactionType,
        amount: Money,
        reference: Reference,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TransactionId::random(),
            account_id,
            kind,
            amount,
            status: TransactionStatus::Pending,
            reference,
            balance_before: None,
            balance_after: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Signed balance delta: positive for deposits, negative for withdrawals.
    pub fn signed_amount(&self) -> Decimal {
        self.kind.signed(self.amount)
    }
}
