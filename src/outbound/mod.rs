//! Outbound adapters implementing the domain ports.

pub mod broker;
pub mod ledger;
pub mod persistence;
