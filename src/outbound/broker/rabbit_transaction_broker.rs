//! RabbitMQ-backed `TransactionBroker` implementation using lapin.
//!
//! One durable queue carries the full transaction document as a persistent
//! JSON message. Publishes run under publisher confirms, so `publish`
//! returns only once the broker has persisted the message. Consumption is
//! manual-ack with a bounded prefetch; a payload that fails to decode is
//! rejected without requeue, since redelivering it could never succeed.

use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions, BasicQosOptions,
    BasicRejectOptions, ConfirmSelectOptions, QueueDeclareOptions,
};
use lapin::publisher_confirm::Confirmation;
use lapin::types::{FieldTable, ShortString};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer};
use tracing::{error, warn};

use crate::domain::ports::{
    BrokerError, Delivery, DeliveryHandle, TransactionBroker, TransactionStream,
};
use crate::domain::Transaction;

/// Name of the durable pending-transaction queue.
pub const TRANSACTION_QUEUE: &str = "transactions";

/// AMQP delivery mode for persistent messages.
const PERSISTENT: u8 = 2;

/// Number of unacknowledged deliveries a consumer holds at once.
const PREFETCH_COUNT: u16 = 16;

/// lapin implementation of the `TransactionBroker` port.
pub struct RabbitTransactionBroker {
    connection: Connection,
    channel: Channel,
}

fn map_lapin_error(error: lapin::Error) -> BrokerError {
    BrokerError::unavailable(error.to_string())
}

impl RabbitTransactionBroker {
    /// Connect, open a confirmed channel and declare the durable queue.
    pub async fn connect(uri: &str) -> Result<Self, BrokerError> {
        let connection = Connection::connect(uri, ConnectionProperties::default())
            .await
            .map_err(map_lapin_error)?;
        let channel = connection.create_channel().await.map_err(map_lapin_error)?;

        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(map_lapin_error)?;
        channel
            .basic_qos(PREFETCH_COUNT, BasicQosOptions::default())
            .await
            .map_err(map_lapin_error)?;
        channel
            .queue_declare(
                TRANSACTION_QUEUE,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(map_lapin_error)?;

        Ok(Self {
            connection,
            channel,
        })
    }

    /// Close the AMQP connection; unacknowledged deliveries are returned to
    /// the queue by the broker.
    pub async fn close(&self) -> Result<(), BrokerError> {
        self.connection
            .close(200, "shutdown")
            .await
            .map_err(map_lapin_error)
    }
}

#[async_trait]
impl TransactionBroker for RabbitTransactionBroker {
    async fn publish(&self, transaction: &Transaction) -> Result<(), BrokerError> {
        let body = serde_json::to_vec(transaction)
            .map_err(|err| BrokerError::serialization(err.to_string()))?;

        let confirm = self
            .channel
            .basic_publish(
                "",
                TRANSACTION_QUEUE,
                BasicPublishOptions::default(),
                &body,
                BasicProperties::default()
                    .with_content_type(ShortString::from("application/json"))
                    .with_delivery_mode(PERSISTENT),
            )
            .await
            .map_err(|err| BrokerError::publish(err.to_string()))?
            .await
            .map_err(|err| BrokerError::publish(err.to_string()))?;

        if let Confirmation::Nack(_) = confirm {
            return Err(BrokerError::publish("broker refused the message"));
        }
        Ok(())
    }

    async fn subscribe(&self) -> Result<Box<dyn TransactionStream>, BrokerError> {
        let consumer = self
            .channel
            .basic_consume(
                TRANSACTION_QUEUE,
                "ledgerd-settlement",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(map_lapin_error)?;
        Ok(Box::new(RabbitTransactionStream { consumer }))
    }
}

struct RabbitTransactionStream {
    consumer: Consumer,
}

#[async_trait]
impl TransactionStream for RabbitTransactionStream {
    async fn next(&mut self) -> Option<Result<Delivery, BrokerError>> {
        loop {
            let delivery = match self.consumer.next().await? {
                Ok(delivery) => delivery,
                Err(err) => return Some(Err(map_lapin_error(err))),
            };

            match serde_json::from_slice::<Transaction>(&delivery.data) {
                Ok(transaction) => {
                    return Some(Ok(Delivery {
                        transaction,
                        handle: Box::new(RabbitDeliveryHandle {
                            acker: delivery.acker,
                        }),
                    }));
                }
                Err(decode_error) => {
                    // Unparseable payloads would fail identically on every
                    // redelivery; drop them and keep consuming.
                    error!(error = %decode_error, "discarding malformed transaction payload");
                    if let Err(reject_error) =
                        delivery.acker.reject(BasicRejectOptions { requeue: false }).await
                    {
                        warn!(error = %reject_error, "failed to reject malformed payload");
                    }
                }
            }
        }
    }
}

struct RabbitDeliveryHandle {
    acker: lapin::acker::Acker,
}

#[async_trait]
impl DeliveryHandle for RabbitDeliveryHandle {
    async fn ack(self: Box<Self>) -> Result<(), BrokerError> {
        self.acker
            .ack(BasicAckOptions::default())
            .await
            .map_err(map_lapin_error)
    }

    async fn requeue(self: Box<Self>) -> Result<(), BrokerError> {
        self.acker
            .nack(BasicNackOptions {
                requeue: true,
                ..BasicNackOptions::default()
            })
            .await
            .map_err(map_lapin_error)
    }

    async fn discard(self: Box<Self>) -> Result<(), BrokerError> {
        self.acker
            .reject(BasicRejectOptions { requeue: false })
            .await
            .map_err(map_lapin_error)
    }
}
