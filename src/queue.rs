use crate::amqp::transport::QueueChannel;
use crate::consumers::{Consumer, ErrorHook, Handler};
use crate::{codec, ConnectionError, PublishError};
use anyhow::Context;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// A named queue, ready to publish to and to subscribe on.
///
/// Get one from [`Connection::queue`](crate::Connection::queue): by the time you hold a `Queue`,
/// its channel is open and the queue exists on the broker.
///
/// Every method returns the `Queue` itself on success, so that calls can be chained:
///
/// ```rust,no_run
/// # use carrot_queue::{Connection, consumers::{HandlerResult, Requeue}};
/// # use serde_json::{json, Value};
/// # async fn example(connection: Connection) -> Result<(), anyhow::Error> {
/// connection
///     .queue("jobs")
///     .await?
///     .subscribe(|_payload: Value, _requeue: Requeue| HandlerResult::Immediate(Ok(())))
///     .await?
///     .publish(&json!({ "job": 1 }))
///     .await?
///     .publish(&json!({ "job": 2 }))
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Queue {
    name: Arc<str>,
    channel: Arc<dyn QueueChannel>,
}

impl Queue {
    pub(crate) fn new(name: &str, channel: Arc<dyn QueueChannel>) -> Self {
        Self {
            name: name.into(),
            channel,
        }
    }

    /// The name of the queue.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Encode `payload` as JSON and send it to the queue.
    ///
    /// We do not wait for the broker to confirm the message.
    #[tracing::instrument(level = "debug", skip_all, fields(queue_name = %self.name))]
    pub async fn publish<T: Serialize + ?Sized>(&self, payload: &T) -> Result<&Self, PublishError> {
        let content = codec::encode(payload)?;
        self.publish_raw(&content).await
    }

    /// Send `content` to the queue, as is.
    #[tracing::instrument(level = "debug", skip_all, fields(queue_name = %self.name))]
    pub async fn publish_raw(&self, content: &[u8]) -> Result<&Self, PublishError> {
        self.channel
            .send_to_queue(&self.name, content)
            .await
            .map_err(PublishError::Transport)?;
        Ok(self)
    }

    /// Start processing the messages delivered on this queue with `handler`.
    ///
    /// Deliveries are acked once `handler` completes successfully.
    /// Failed deliveries are neither acked nor nacked: what happens to them is up to the broker.
    /// Use [`Queue::subscribe_with_error_hook`] to be told about failures.
    pub async fn subscribe(&self, handler: impl Handler) -> Result<&Self, ConnectionError> {
        self.start_consumer(Arc::new(handler), None).await
    }

    /// Start processing the messages delivered on this queue with `handler`.
    ///
    /// Deliveries are acked once `handler` completes successfully.
    /// If `handler` fails, `on_error` is invoked with the error and a
    /// [`Requeue`](crate::consumers::Requeue) for the failed delivery, which is not acked.
    pub async fn subscribe_with_error_hook(
        &self,
        handler: impl Handler,
        on_error: impl ErrorHook,
    ) -> Result<&Self, ConnectionError> {
        self.start_consumer(Arc::new(handler), Some(Arc::new(on_error)))
            .await
    }

    async fn start_consumer(
        &self,
        handler: Arc<dyn Handler>,
        on_error: Option<Arc<dyn ErrorHook>>,
    ) -> Result<&Self, ConnectionError> {
        let deliveries = self
            .channel
            .consume(&self.name)
            .await
            .with_context(|| format!("Failed to start consuming from queue {}", self.name))?;
        let consumer = Consumer::new(
            Arc::clone(&self.channel),
            Arc::clone(&self.name),
            handler,
            on_error,
        );
        tokio::spawn(consumer.run(deliveries));
        Ok(self)
    }
}

impl fmt::Debug for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
