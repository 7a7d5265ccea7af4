//! Standalone settlement worker: consumes pending transactions and drives
//! them to a terminal state. Any number of these can run against the same
//! queue.

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use ledgerd::domain::ports::TransactionBroker;
use ledgerd::domain::SettlementProcessor;
use ledgerd::outbound::broker::RabbitTransactionBroker;
use ledgerd::outbound::ledger::MongoTransactionLog;
use ledgerd::outbound::persistence::{DbPool, PgBalanceStore, PoolConfig};
use ledgerd::server::AppConfig;

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

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_tracing();
    let config = AppConfig::from_env();

    info!("connecting to PostgreSQL");
    let pool = DbPool::new(PoolConfig::new(&config.postgres_uri))
        .await
        .map_err(to_io_error)?;
    let balances = PgBalanceStore::new(pool);

    info!("connecting to MongoDB");
    let log = MongoTransactionLog::connect(&config.mongo_uri, &config.mongo_db_name)
        .await
        .map_err(to_io_error)?;

    info!("connecting to RabbitMQ");
    let broker = RabbitTransactionBroker::connect(&config.rabbitmq_uri)
        .await
        .map_err(to_io_error)?;

    let processor = SettlementProcessor::new(Arc::new(balances), Arc::new(log));
    let stream = broker.subscribe().await.map_err(to_io_error)?;

    info!("settlement processor started");
    tokio::select! {
        () = processor.run(stream) => {
            warn!("transaction stream closed unexpectedly");
        }
        result = tokio::signal::ctrl_c() => {
            if let Err(err) = result {
                warn!(error = %err, "failed to listen for shutdown signal");
            }
            info!("shutdown signal received");
        }
    }

    // Closing the connection returns unacknowledged deliveries to the queue
    // for redelivery after restart.
    if let Err(err) = broker.close().await {
        warn!(error = %err, "broker close failed during shutdown");
    }
    info!("processor shut down");
    Ok(())
}
