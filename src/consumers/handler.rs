//! The contract between a subscription and the code processing its messages.
use crate::consumers::Requeue;
use crate::HandlerError;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde_json::Value;
use std::future::Future;

/// What a [`Handler`] returns.
///
/// Handlers can complete right away or hand back a future to be awaited: the delivery is
/// acknowledged only after the outcome is known, and only if it is `Ok`.
pub enum HandlerResult {
    /// Processing already completed.
    Immediate(Result<(), HandlerError>),
    /// Processing completes when the future resolves.
    Pending(BoxFuture<'static, Result<(), HandlerError>>),
}

impl HandlerResult {
    /// Wrap a future as a [`HandlerResult::Pending`].
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        Self::Pending(future.boxed())
    }
}

impl From<Result<(), HandlerError>> for HandlerResult {
    fn from(outcome: Result<(), HandlerError>) -> Self {
        Self::Immediate(outcome)
    }
}

/// Implementers of the `Handler` trait can be subscribed to a [`Queue`](crate::Queue)
/// to process the messages delivered on it.
///
/// # Scope
///
/// `handle` gets the decoded payload and a [`Requeue`] bound to the delivery, but never the
/// delivery itself: acknowledging is taken care of by the subscription.
///
/// # Implementers
///
/// Any `Fn(Value, Requeue) -> HandlerResult` is a `Handler`. Wrap closures returning a future
/// in [`AsyncHandler`].
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, payload: Value, requeue: Requeue) -> HandlerResult;
}

impl<F> Handler for F
where
    F: Fn(Value, Requeue) -> HandlerResult + Send + Sync + 'static,
{
    fn handle(&self, payload: Value, requeue: Requeue) -> HandlerResult {
        (self)(payload, requeue)
    }
}

/// Wrapper type to turn an async closure into a [`Handler`].
///
/// ```rust
/// use carrot_queue::consumers::{AsyncHandler, Requeue};
/// use serde_json::Value;
///
/// let handler = AsyncHandler::new(|payload: Value, _requeue: Requeue| async move {
///     println!("{payload}");
///     Ok(())
/// });
/// # drop(handler);
/// ```
pub struct AsyncHandler<F>(F);

impl<F, Fut> AsyncHandler<F>
where
    F: Fn(Value, Requeue) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F, Fut> Handler for AsyncHandler<F>
where
    F: Fn(Value, Requeue) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    fn handle(&self, payload: Value, requeue: Requeue) -> HandlerResult {
        HandlerResult::pending((self.0)(payload, requeue))
    }
}

/// Invoked when a handler fails, with the error and the [`Requeue`] for the failed delivery.
///
/// Any `Fn(HandlerError, Requeue)` is an `ErrorHook`.
pub trait ErrorHook: Send + Sync + 'static {
    fn on_error(&self, error: HandlerError, requeue: Requeue);
}

impl<F> ErrorHook for F
where
    F: Fn(HandlerError, Requeue) + Send + Sync + 'static,
{
    fn on_error(&self, error: HandlerError, requeue: Requeue) {
        (self)(error, requeue)
    }
}

/// assert they are object safe
type _CHECK = (Box<dyn Handler>, Box<dyn ErrorHook>);
