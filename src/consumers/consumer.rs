use crate::amqp::transport::{Deliveries, Delivery, QueueChannel};
use crate::consumers::{process, ErrorHook, Handler, Requeue};
use futures_util::StreamExt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// The loop driving a subscription.
///
/// [`Queue::subscribe`](crate::Queue::subscribe) spawns one `Consumer` per call.
/// Users of the crate are never exposed to `Consumer` directly.
pub(crate) struct Consumer {
    /// The channel the subscription was registered on.
    /// Requeued messages are sent through it.
    channel: Arc<dyn QueueChannel>,
    queue_name: Arc<str>,
    handler: Arc<dyn Handler>,
    /// Without an error hook, failed deliveries are left unacked and nothing else happens.
    on_error: Option<Arc<dyn ErrorHook>>,
}

impl Consumer {
    pub(crate) fn new(
        channel: Arc<dyn QueueChannel>,
        queue_name: Arc<str>,
        handler: Arc<dyn Handler>,
        on_error: Option<Arc<dyn ErrorHook>>,
    ) -> Self {
        Self {
            channel,
            queue_name,
            handler,
            on_error,
        }
    }

    /// Process deliveries until the broker cancels the consumer or the stream fails.
    #[tracing::instrument(skip_all, name = "consumer_run", fields(queue_name = %self.queue_name))]
    pub(crate) async fn run(self, mut deliveries: Deliveries) {
        while let Some(event) = deliveries.next().await {
            match event {
                Ok(delivery) => self.dispatch(delivery),
                Err(e) => {
                    tracing::error!("Consumer error: {:?}", e);
                    return;
                }
            }
        }
        tracing::info!("consumer was cancelled by the broker");
    }

    /// Invoke the handler on `delivery`, then ack it (or call the error hook) on a separate task.
    ///
    /// Handlers are invoked in delivery order, but completions are awaited concurrently:
    /// a later delivery can be acked before an earlier one.
    fn dispatch(&self, delivery: Delivery) {
        let requeue = Requeue::new(
            Arc::clone(&self.channel),
            Arc::clone(&self.queue_name),
            delivery.data.as_slice().into(),
        );
        let handler = self.handler.as_ref();
        let invocation = panic::catch_unwind(AssertUnwindSafe(|| {
            process(&delivery.data, requeue.clone(), handler)
        }));
        let completion = match invocation {
            Ok(completion) => completion,
            Err(_) => {
                tracing::error!(
                    delivery_tag = delivery.delivery_tag,
                    "Message handler panicked, the delivery will not be acked"
                );
                return;
            }
        };

        let on_error = self.on_error.clone();
        tokio::spawn(async move {
            match completion.await {
                Ok(()) => {
                    if let Err(e) = delivery.acker.ack().await {
                        tracing::warn!(
                            delivery_tag = delivery.delivery_tag,
                            "Failed to ack message: {:?}",
                            e
                        );
                    }
                }
                Err(e) => {
                    if let Some(hook) = on_error {
                        hook.on_error(e, requeue);
                    }
                }
            }
        });
    }
}
