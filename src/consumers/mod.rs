//! Facilities to consume messages from a queue. Check out [`Handler`] as a starting point.
pub use handler::{AsyncHandler, ErrorHook, Handler, HandlerResult};
pub use processor::process;
pub use requeue::{Requeue, ScheduledTask, DEFAULT_REQUEUE_DELAY};

pub(crate) use consumer::Consumer;

mod consumer;
mod handler;
mod processor;
mod requeue;
