//! `carrot-queue` binds a single RabbitMq queue to two operations, built on top of [`lapin`]:
//! `publish` a payload and `subscribe` a handler to it.
//!
//! Payloads travel as JSON text. On the way in, anything that is not valid JSON is handed to
//! the handler as `{"text": <raw content>}` instead of failing.
//! A delivery is acknowledged once its handler has completed successfully; failing handlers
//! get a [`Requeue`](crate::consumers::Requeue) to push the message back onto the queue after
//! a cool-down.
//!
//! [`Connection`] and [`Queue`] are the best starting points.
//!
//! ## Examples
//!
//! ```rust,no_run
//! use carrot_queue::amqp::configuration::RabbitMqSettings;
//! use carrot_queue::consumers::{HandlerResult, Requeue};
//! use carrot_queue::Connection;
//! use serde_json::Value;
//!
//! async fn example() -> Result<(), anyhow::Error> {
//!     let connection = Connection::connect(&RabbitMqSettings::default()).await?;
//!     let queue = connection.queue("jobs").await?;
//!
//!     queue
//!         .subscribe(|payload: Value, _requeue: Requeue| {
//!             println!("Received {payload}");
//!             HandlerResult::Immediate(Ok(()))
//!         })
//!         .await?;
//!
//!     queue.publish(&serde_json::json!({ "a": 1 })).await?;
//!     Ok(())
//! }
//! ```
//!
//! Check the `demos` directory as well to see the library in action.

pub mod amqp;
pub mod codec;
pub mod consumers;
mod connection;
mod error;
mod queue;

pub use connection::Connection;
pub use error::{ConnectionError, EncodingError, HandlerError, PublishError};
pub use queue::Queue;
