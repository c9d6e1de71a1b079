use crate::amqp::transport::QueueChannel;
use crate::{codec, EncodingError};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{warn, Instrument};

/// How long [`Requeue`] waits before sending, unless told otherwise.
pub const DEFAULT_REQUEUE_DELAY: Duration = Duration::from_millis(1000);

/// Push a message back onto the queue it was delivered from, after a cool-down.
///
/// Every delivery gets its own `Requeue`, bound to the queue and to the original content of
/// the message. It is handed to both the [`Handler`](super::Handler) and the
/// [`ErrorHook`](super::ErrorHook).
///
/// Requeueing sends a brand-new message: the original delivery is neither acked nor nacked
/// by it. Each call schedules one independent send.
///
/// # Runtime
///
/// Sends are scheduled as `tokio` tasks, so `Requeue` must be used from within a `tokio` runtime.
#[derive(Clone)]
pub struct Requeue {
    channel: Arc<dyn QueueChannel>,
    queue_name: Arc<str>,
    content: Arc<[u8]>,
}

impl Requeue {
    pub(crate) fn new(
        channel: Arc<dyn QueueChannel>,
        queue_name: Arc<str>,
        content: Arc<[u8]>,
    ) -> Self {
        Self {
            channel,
            queue_name,
            content,
        }
    }

    /// The queue messages are sent back to.
    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// The content of the original delivery, as it was received.
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Send the original content back to the queue once `delay` has elapsed.
    ///
    /// `None` or a zero delay fall back to [`DEFAULT_REQUEUE_DELAY`].
    pub fn schedule(&self, delay: Option<Duration>) -> ScheduledTask {
        self.send_later(delay, Arc::clone(&self.content))
    }

    /// Send `replacement`, instead of the original content, to the queue once `delay` has elapsed.
    ///
    /// `None` or a zero delay fall back to [`DEFAULT_REQUEUE_DELAY`].
    /// A replacement that encodes to `null`, `false`, `0` or `""` is ignored: the original
    /// content is sent instead.
    /// Nothing is scheduled if `replacement` cannot be encoded.
    pub fn schedule_with<T: Serialize + ?Sized>(
        &self,
        delay: Option<Duration>,
        replacement: &T,
    ) -> Result<ScheduledTask, EncodingError> {
        let replacement = serde_json::to_value(replacement)?;
        if is_blank(&replacement) {
            return Ok(self.schedule(delay));
        }
        let content = codec::encode(&replacement)?;
        Ok(self.send_later(delay, content.into()))
    }

    fn send_later(&self, delay: Option<Duration>, content: Arc<[u8]>) -> ScheduledTask {
        let delay = delay
            .filter(|delay| !delay.is_zero())
            .unwrap_or(DEFAULT_REQUEUE_DELAY);
        let channel = Arc::clone(&self.channel);
        let queue_name = Arc::clone(&self.queue_name);
        let span = tracing::debug_span!("requeue", queue_name = %queue_name, delay_ms = delay.as_millis() as u64);

        let handle = tokio::spawn(
            async move {
                tokio::time::sleep(delay).await;
                if let Err(e) = channel.send_to_queue(&queue_name, &content).await {
                    warn!("Failed to requeue message: {:?}", e);
                }
            }
            .instrument(span),
        );
        ScheduledTask { handle }
    }
}

fn is_blank(replacement: &Value) -> bool {
    match replacement {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

impl fmt::Debug for Requeue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Requeue")
            .field("queue_name", &self.queue_name)
            .field("content", &String::from_utf8_lossy(&self.content))
            .finish_non_exhaustive()
    }
}

/// A send scheduled by [`Requeue`].
///
/// Dropping the handle does not cancel the send.
#[derive(Debug)]
pub struct ScheduledTask {
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Cancel the send, if it has not happened yet.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    /// Returns `true` once the send has been attempted or cancelled.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
