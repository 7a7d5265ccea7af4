//! Ledger API entry-point: wires the stores, the broker, the REST surface
//! and an embedded settlement consumer.

use std::sync::Arc;

use actix_web::web;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use ledgerd::domain::ports::TransactionBroker;
use ledgerd::domain::{AccountService, SettlementProcessor, TransactionService};
use ledgerd::inbound::http::health::HealthState;
use ledgerd::inbound::http::state::HttpState;
use ledgerd::outbound::broker::RabbitTransactionBroker;
use ledgerd::outbound::ledger::MongoTransactionLog;
use ledgerd::outbound::persistence::{DbPool, PgBalanceStore, PoolConfig};
use ledgerd::server::{create_server, AppConfig};

fn init_tracing() {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }
}

fn to_io_error(err: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::other(err.to_string())
}

/// Application bootstrap.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    init_tracing();
    let config = AppConfig::from_env();

    info!("connecting to PostgreSQL");
    let pool = DbPool::new(PoolConfig::new(&config.postgres_uri))
        .await
        .map_err(to_io_error)?;
    let balances = PgBalanceStore::new(pool);
    balances.ensure_schema().await.map_err(to_io_error)?;

    info!("connecting to MongoDB");
    let log = MongoTransactionLog::connect(&config.mongo_uri, &config.mongo_db_name)
        .await
        .map_err(to_io_error)?;

    info!("connecting to RabbitMQ");
    let broker = RabbitTransactionBroker::connect(&config.rabbitmq_uri)
        .await
        .map_err(to_io_error)?;

    let balances: Arc<PgBalanceStore> = Arc::new(balances);
    let log: Arc<MongoTransactionLog> = Arc::new(log);
    let broker: Arc<RabbitTransactionBroker> = Arc::new(broker);

    let state = HttpState::new(
        AccountService::new(balances.clone()),
        TransactionService::new(balances.clone(), log.clone(), broker.clone()),
    );

    // The API process also runs one settlement consumer; dedicated
    // `processor` instances can scale consumption independently.
    let processor = SettlementProcessor::new(balances, log);
    let stream = broker.subscribe().await.map_err(to_io_error)?;
    let settlement = tokio::spawn(async move { processor.run(stream).await });

    let health_state = web::Data::new(HealthState::new());
    let server = create_server(state, health_state, config.port)?;
    info!(port = config.port, "ledger API listening");

    let result = server.await;

    settlement.abort();
    if let Err(err) = broker.close().await {
        warn!(error = %err, "broker close failed during shutdown");
    }
    info!("server shut down");
    result
}
