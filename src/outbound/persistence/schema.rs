//! Diesel table definitions for the PostgreSQL schema.
//!
//! Must match the bootstrap DDL in `pg_balance_store` exactly.

diesel::table! {
    /// Authoritative account balances.
    ///
    /// The balance column is the only field mutated after creation, always
    /// under a row lock inside the settlement critical section.
    accounts (id) {
        /// Primary key: UUID v4 identifier.
        id -> Uuid,
        /// Current balance, NUMERIC(20,2), never negative.
        balance -> Numeric,
        /// Record creation timestamp.
        created_at -> Timestamptz,
        /// Advances with every successful balance mutation.
        updated_at -> Timestamptz,
    }
}
