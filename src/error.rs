/// Failed to reach the broker or to set up the channel/queue/consumer on top of it.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub struct ConnectionError(#[from] anyhow::Error);

/// A payload could not be represented as JSON text.
#[derive(thiserror::Error, Debug)]
#[error("Failed to encode the payload as JSON")]
pub struct EncodingError(#[from] serde_json::Error);

/// Error returned when trying to publish a message using [`Queue::publish`](crate::Queue::publish).
#[derive(thiserror::Error, Debug)]
pub enum PublishError {
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error("The channel refused to send the message to the RabbitMq broker")]
    Transport(#[source] anyhow::Error),
}

/// What message handlers fail with.
///
/// It is handed, untouched, to the error hook registered with
/// [`Queue::subscribe_with_error_hook`](crate::Queue::subscribe_with_error_hook).
pub type HandlerError = anyhow::Error;
