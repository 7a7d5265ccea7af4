//! Account entity and identifier.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Money;

/// Validation error for [`AccountId`] parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("account id must be a UUID")]
pub struct AccountIdParseError;

/// Opaque account identifier (UUID v4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(Uuid);

impl AccountId {
    /// Generate a fresh identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parse an identifier from its string form.
    pub fn parse(value: &str) -> Result<Self, AccountIdParseError> {
        Uuid::parse_str(value.trim())
            .map(Self)
            .map_err(|_| AccountIdParseError)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A customer account holding the authoritative balance.
///
/// The balance is only ever mutated through the settlement critical section;
/// `updated_at` advances with every successful mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub balance: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
