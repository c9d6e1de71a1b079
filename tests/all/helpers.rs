use carrot_queue::amqp::transport::{
    Acknowledge, Deliveries, Delivery, QueueChannel, TransportFactory,
};
use carrot_queue::Connection;
use fake::{Fake, Faker};
use futures_util::StreamExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// An in-memory stand-in for a RabbitMq broker.
///
/// It records every message sent to a queue and every ack, and pushes messages to consumers
/// round-robin. Messages sent before anyone consumes are buffered.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

#[derive(Default)]
struct BrokerState {
    queues: HashMap<String, QueueState>,
    next_delivery_tag: u64,
    channels_opened: usize,
    refuse_consumers: bool,
}

#[derive(Default)]
struct QueueState {
    sent: Vec<(Instant, Vec<u8>)>,
    buffered: Vec<Vec<u8>>,
    consumers: Vec<mpsc::UnboundedSender<Result<Delivery, anyhow::Error>>>,
    next_consumer: usize,
    acked: Vec<u64>,
}

impl MemoryBroker {
    pub fn connection(&self) -> Connection {
        Connection::from_transport(self.clone())
    }

    pub fn queue_exists(&self, queue_name: &str) -> bool {
        self.state.lock().unwrap().queues.contains_key(queue_name)
    }

    pub fn channels_opened(&self) -> usize {
        self.state.lock().unwrap().channels_opened
    }

    /// Every message sent to `queue_name`, with the (paused) time it was sent at.
    pub fn sent(&self, queue_name: &str) -> Vec<(Instant, Vec<u8>)> {
        self.state
            .lock()
            .unwrap()
            .queues
            .get(queue_name)
            .map(|q| q.sent.clone())
            .unwrap_or_default()
    }

    /// The delivery tags acked on `queue_name`, in the order they were acked.
    pub fn acked(&self, queue_name: &str) -> Vec<u64> {
        self.state
            .lock()
            .unwrap()
            .queues
            .get(queue_name)
            .map(|q| q.acked.clone())
            .unwrap_or_default()
    }

    /// Reject every consumer registered from now on.
    pub fn refuse_consumers(&self) {
        self.state.lock().unwrap().refuse_consumers = true;
    }

    /// Make the consumers of `queue_name` see a broken channel.
    pub fn break_consumers(&self, queue_name: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(queue) = state.queues.get_mut(queue_name) {
            for consumer in queue.consumers.drain(..) {
                let _ = consumer.send(Err(anyhow::anyhow!("channel closed")));
            }
        }
    }

    fn deliver(&self, queue_name: &str, content: Vec<u8>) {
        let mut state = self.state.lock().unwrap();
        state.next_delivery_tag += 1;
        let delivery_tag = state.next_delivery_tag;
        let queue = state.queues.entry(queue_name.to_owned()).or_default();
        queue.sent.push((Instant::now(), content.clone()));

        queue.consumers.retain(|c| !c.is_closed());
        if queue.consumers.is_empty() {
            queue.buffered.push(content);
            return;
        }
        let index = queue.next_consumer % queue.consumers.len();
        queue.next_consumer += 1;
        let acker = MemoryAcker {
            broker: self.clone(),
            queue_name: queue_name.to_owned(),
            delivery_tag,
        };
        let _ = queue.consumers[index].send(Ok(Delivery::new(
            delivery_tag,
            false,
            content,
            acker,
        )));
    }
}

#[async_trait::async_trait]
impl TransportFactory for MemoryBroker {
    async fn open_channel(&self) -> Result<Arc<dyn QueueChannel>, anyhow::Error> {
        self.state.lock().unwrap().channels_opened += 1;
        Ok(Arc::new(MemoryChannel {
            broker: self.clone(),
        }))
    }
}

struct MemoryChannel {
    broker: MemoryBroker,
}

#[async_trait::async_trait]
impl QueueChannel for MemoryChannel {
    async fn assert_queue(&self, queue_name: &str) -> Result<(), anyhow::Error> {
        let mut state = self.broker.state.lock().unwrap();
        state.queues.entry(queue_name.to_owned()).or_default();
        Ok(())
    }

    async fn send_to_queue(&self, queue_name: &str, payload: &[u8]) -> Result<(), anyhow::Error> {
        self.broker.deliver(queue_name, payload.to_vec());
        Ok(())
    }

    async fn consume(&self, queue_name: &str) -> Result<Deliveries, anyhow::Error> {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let buffered = {
            let mut state = self.broker.state.lock().unwrap();
            if state.refuse_consumers {
                return Err(anyhow::anyhow!("ACCESS_REFUSED - consumers are not allowed"));
            }
            let queue = state
                .queues
                .get_mut(queue_name)
                .ok_or_else(|| anyhow::anyhow!("NOT_FOUND - no queue '{queue_name}'"))?;
            queue.consumers.push(sender);
            std::mem::take(&mut queue.buffered)
        };
        for content in buffered {
            // Buffered messages were already recorded as sent, deliver them directly.
            self.broker.redeliver_buffered(queue_name, content);
        }
        Ok(futures_util::stream::poll_fn(move |cx| receiver.poll_recv(cx)).boxed())
    }
}

impl MemoryBroker {
    fn redeliver_buffered(&self, queue_name: &str, content: Vec<u8>) {
        let mut state = self.state.lock().unwrap();
        state.next_delivery_tag += 1;
        let delivery_tag = state.next_delivery_tag;
        let queue = state.queues.entry(queue_name.to_owned()).or_default();
        let acker = MemoryAcker {
            broker: self.clone(),
            queue_name: queue_name.to_owned(),
            delivery_tag,
        };
        if let Some(consumer) = queue.consumers.last() {
            let _ = consumer.send(Ok(Delivery::new(delivery_tag, false, content, acker)));
        }
    }
}

struct MemoryAcker {
    broker: MemoryBroker,
    queue_name: String,
    delivery_tag: u64,
}

#[async_trait::async_trait]
impl Acknowledge for MemoryAcker {
    async fn ack(&self) -> Result<(), anyhow::Error> {
        let mut state = self.broker.state.lock().unwrap();
        let queue = state.queues.entry(self.queue_name.clone()).or_default();
        queue.acked.push(self.delivery_tag);
        Ok(())
    }
}

/// A transport that cannot reach the broker.
pub struct UnreachableBroker;

#[async_trait::async_trait]
impl TransportFactory for UnreachableBroker {
    async fn open_channel(&self) -> Result<Arc<dyn QueueChannel>, anyhow::Error> {
        Err(anyhow::anyhow!("Connection refused"))
    }
}

pub fn random_queue_name() -> String {
    format!("queue-{}", Faker.fake::<u32>())
}

/// Let every spawned task run until it is blocked on something other than the clock.
///
/// Meant for tests running with a paused clock.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
