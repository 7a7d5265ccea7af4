//! Shared fixtures for handler tests.

use std::sync::Arc;

use actix_web::{web, App};

use crate::domain::{AccountService, TransactionService};
use crate::inbound::http::state::HttpState;
use crate::inbound::http::{accounts, transactions};
use crate::test_support::{InMemoryBalanceStore, InMemoryBroker, InMemoryTransactionLog};

/// Handles onto the in-memory ports behind a test application.
pub struct TestPorts {
    pub balances: Arc<InMemoryBalanceStore>,
    pub log: Arc<InMemoryTransactionLog>,
    pub broker: Arc<InMemoryBroker>,
}

/// Build an application over in-memory ports, exposing the ports for
/// assertions.
pub fn test_app() -> (
    App<
        impl actix_web::dev::ServiceFactory<
            actix_web::dev::ServiceRequest,
            Config = (),
            Response = actix_web::dev::ServiceResponse,
            Error = actix_web::Error,
            InitError = (),
        >,
    >,
    TestPorts,
) {
    let balances = Arc::new(InMemoryBalanceStore::new());
    let log = Arc::new(InMemoryTransactionLog::new());
    let broker = Arc::new(InMemoryBroker::new());

    let state = HttpState::new(
        AccountService::new(balances.clone()),
        TransactionService::new(balances.clone(), log.clone(), broker.clone()),
    );

    let app = App::new()
        .app_data(web::Data::new(state))
        .service(accounts::create_account)
        .service(accounts::get_account)
        .service(transactions::create_transaction)
        .service(transactions::get_transaction)
        .service(transactions::list_transactions);

    (
        app,
        TestPorts {
            balances,
            log,
            broker,
        },
    )
}
