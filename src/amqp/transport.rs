//! The seam between [`Queue`](crate::Queue) and the broker client.
//!
//! [`lapin`] implements these traits out of the box. Anything else that can open a channel,
//! declare a queue, send bytes to it and hand back deliveries can be plugged in via
//! [`Connection::from_transport`](crate::Connection::from_transport).
use amq_protocol_types::{DeliveryTag, FieldTable};
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use lapin::{
    acker::Acker,
    options::{BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, QueueDeclareOptions},
    BasicProperties,
};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// The stream of deliveries pushed by the broker to a consumer.
///
/// The stream ends when the broker cancels the consumer.
pub type Deliveries = BoxStream<'static, Result<Delivery, anyhow::Error>>;

/// `TransportFactory` creates the channels [`Queue`](crate::Queue)s are bound to.
#[async_trait::async_trait]
pub trait TransportFactory: Send + Sync + 'static {
    /// Open a new logical channel with the broker.
    async fn open_channel(&self) -> Result<Arc<dyn QueueChannel>, anyhow::Error>;
}

/// The subset of channel operations a [`Queue`](crate::Queue) relies on.
#[async_trait::async_trait]
pub trait QueueChannel: Send + Sync + 'static {
    /// Make sure `queue_name` exists, creating it if it does not.
    async fn assert_queue(&self, queue_name: &str) -> Result<(), anyhow::Error>;

    /// Send `payload` to `queue_name`.
    ///
    /// It does not wait for the broker to confirm the message.
    async fn send_to_queue(&self, queue_name: &str, payload: &[u8]) -> Result<(), anyhow::Error>;

    /// Register a new consumer on `queue_name`.
    async fn consume(&self, queue_name: &str) -> Result<Deliveries, anyhow::Error>;
}

/// Signal to the broker that a delivery was processed and can be discarded.
#[async_trait::async_trait]
pub trait Acknowledge: Send + Sync + 'static {
    async fn ack(&self) -> Result<(), anyhow::Error>;
}

/// A received AMQP message.
pub struct Delivery {
    /// The delivery tag of the message.
    pub delivery_tag: DeliveryTag,
    /// Whether this message was redelivered.
    pub redelivered: bool,
    /// The payload of the message in binary format.
    pub data: Vec<u8>,
    // Not public: only the consumer loop gets to ack, and only once.
    pub(crate) acker: Box<dyn Acknowledge>,
}

impl Delivery {
    pub fn new(
        delivery_tag: DeliveryTag,
        redelivered: bool,
        data: Vec<u8>,
        acker: impl Acknowledge,
    ) -> Self {
        Self {
            delivery_tag,
            redelivered,
            data,
            acker: Box::new(acker),
        }
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("delivery_tag", &self.delivery_tag)
            .field("redelivered", &self.redelivered)
            .field("data", &String::from_utf8_lossy(&self.data))
            .finish_non_exhaustive()
    }
}

impl From<lapin::message::Delivery> for Delivery {
    fn from(value: lapin::message::Delivery) -> Self {
        Self::new(
            value.delivery_tag,
            value.redelivered,
            value.data,
            value.acker,
        )
    }
}

#[async_trait::async_trait]
impl TransportFactory for lapin::Connection {
    async fn open_channel(&self) -> Result<Arc<dyn QueueChannel>, anyhow::Error> {
        let channel = self.create_channel().await?;
        Ok(Arc::new(channel))
    }
}

#[async_trait::async_trait]
impl QueueChannel for lapin::Channel {
    async fn assert_queue(&self, queue_name: &str) -> Result<(), anyhow::Error> {
        let options = QueueDeclareOptions {
            passive: false,
            durable: true,
            exclusive: false,
            auto_delete: false,
            nowait: false,
        };
        self.queue_declare(queue_name, options, FieldTable::default())
            .await?;
        Ok(())
    }

    async fn send_to_queue(&self, queue_name: &str, payload: &[u8]) -> Result<(), anyhow::Error> {
        // Default exchange: the routing key is the queue name.
        // The publisher confirm is not awaited.
        let _confirm = self
            .basic_publish(
                "",
                queue_name,
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default(),
            )
            .await?;
        Ok(())
    }

    async fn consume(&self, queue_name: &str) -> Result<Deliveries, anyhow::Error> {
        let consumer = self
            .basic_consume(
                queue_name,
                &Uuid::new_v4().to_string(),
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;
        Ok(consumer
            .map(|event| event.map(Delivery::from).map_err(anyhow::Error::from))
            .boxed())
    }
}

#[async_trait::async_trait]
impl Acknowledge for Acker {
    async fn ack(&self) -> Result<(), anyhow::Error> {
        Acker::ack(self, BasicAckOptions::default()).await?;
        Ok(())
    }
}
