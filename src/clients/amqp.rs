use anyhow::{Error, Result, anyhow};
use futures_util::StreamExt;
use lapin::{
    BasicProperties, Channel, Connection, ConnectionProperties, Consumer, ExchangeKind,
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions,
        ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
    },
    types::FieldTable,
};
use serde_json::Value as JsonValue;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::{
    config::Config,
    models::message::{BusSignal, Message},
};

/// Subscribes to the message bus and publishes outbound bus signals.
pub struct AmqpClient {
    channel: Channel,
    queue_name: String,
    signal_exchange: String,
}

impl AmqpClient {
    pub async fn connect(config: &Config) -> Result<Self, Error> {
        info!("Connecting to message bus...");

        let connection = Connection::connect(&config.amqp_url, ConnectionProperties::default())
            .await
            .map_err(|e| anyhow!("Failed to connect to message bus: {}", e))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|_| anyhow!("Message bus channel creation failed"))?;

        channel
            .basic_qos(1, BasicQosOptions::default())
            .await
            .map_err(|_| anyhow!("Failed to set up QoS"))?;

        declare_topic_exchange(&channel, &config.exchange).await?;
        declare_topic_exchange(&channel, &config.signal_exchange).await?;

        let queue = channel
            .queue_declare(
                &config.queue_name,
                QueueDeclareOptions {
                    exclusive: true,
                    auto_delete: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|_| anyhow!("Failed to declare subscription queue"))?;
        let queue_name = queue.name().as_str().to_string();

        channel
            .queue_bind(
                &queue_name,
                &config.exchange,
                &config.topic,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|_| anyhow!("Failed to bind subscription queue"))?;

        info!(
            queue = %queue_name,
            exchange = %config.exchange,
            topic = %config.topic,
            "Subscribed to message bus"
        );

        Ok(Self {
            channel,
            queue_name,
            signal_exchange: config.signal_exchange.clone(),
        })
    }

    pub async fn create_consumer(&self) -> Result<Consumer, Error> {
        let consumer = self
            .channel
            .basic_consume(
                &self.queue_name,
                "fedmsg_notify",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|_| anyhow!("Failed to create consumer"))?;

        Ok(consumer)
    }

    pub async fn acknowledge(&self, delivery_tag: u64) -> Result<(), Error> {
        self.channel
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await
            .map_err(|_| anyhow!("Failed to acknowledge message"))?;

        Ok(())
    }

    /// Decodes deliveries into messages and forwards them one at a time.
    /// Returns when the bus or the receiving side goes away.
    pub async fn forward_messages(&self, mut consumer: Consumer, sender: mpsc::Sender<Message>) {
        while let Some(delivery) = consumer.next().await {
            let delivery = match delivery {
                Ok(delivery) => delivery,
                Err(e) => {
                    error!(error = %e, "Message bus delivery failed");
                    break;
                }
            };

            let topic = delivery.routing_key.as_str().to_string();
            match serde_json::from_slice::<JsonValue>(&delivery.data) {
                Ok(body) => {
                    if sender.send(Message::new(topic, body)).await.is_err() {
                        debug!("Message receiver closed, stopping consumption");
                        break;
                    }
                }
                Err(e) => warn!(topic = %topic, error = %e, "Dropping undecodable message"),
            }

            if let Err(e) = self.acknowledge(delivery.delivery_tag).await {
                warn!(error = %e, "Failed to acknowledge message");
            }
        }
    }

    pub async fn publish_signal(&self, signal: &BusSignal) -> Result<(), Error> {
        self.channel
            .basic_publish(
                &self.signal_exchange,
                &signal.topic,
                BasicPublishOptions::default(),
                signal.body.as_bytes(),
                BasicProperties::default().with_content_type("application/json".into()),
            )
            .await
            .map_err(|_| anyhow!("Failed to publish bus signal"))?;

        Ok(())
    }

    pub async fn forward_signals(&self, mut signals: mpsc::UnboundedReceiver<BusSignal>) {
        while let Some(signal) = signals.recv().await {
            if let Err(e) = self.publish_signal(&signal).await {
                warn!(topic = %signal.topic, error = %e, "Failed to emit bus signal");
            }
        }
    }
}

async fn declare_topic_exchange(channel: &Channel, name: &str) -> Result<(), Error> {
    // Broker-owned `amq.*` exchanges may only be checked, not declared.
    let passive = name.starts_with("amq.");

    channel
        .exchange_declare(
            name,
            ExchangeKind::Topic,
            ExchangeDeclareOptions {
                passive,
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|_| anyhow!("Failed to declare exchange {}", name))?;

    Ok(())
}
