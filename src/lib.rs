//! Banking ledger service library.
//!
//! The crate is organised hexagonally: `domain` holds the entities, the
//! services and the ports they consume; `inbound` adapts HTTP requests onto
//! the services; `outbound` implements the ports against PostgreSQL
//! (authoritative balances), MongoDB (transaction log) and RabbitMQ
//! (pending-transaction queue); `server` wires the actix application.

pub mod domain;
pub mod inbound;
pub mod outbound;
pub mod server;
pub mod test_support;

pub mod doc;

pub use doc::ApiDoc;
