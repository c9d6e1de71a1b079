use carrot_queue::amqp::configuration::RabbitMqSettings;
use carrot_queue::consumers::{AsyncHandler, Requeue};
use carrot_queue::{Connection, HandlerError};
use serde_json::{json, Value};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // The out-of-the-box parameters for the default RabbitMq Docker image:
    // guest:guest@localhost:5672.
    let settings = RabbitMqSettings::default();
    let connection = Connection::connect(&settings).await?;

    // The queue is created if it does not exist yet.
    let queue = connection.queue("carrot-queue-demo").await?;

    // Fail on the first attempt of every job, then succeed once it comes back with `retried`.
    let handler = AsyncHandler::new(|payload: Value, _requeue: Requeue| async move {
        println!("Processing {payload}");
        if payload["retried"].as_bool().unwrap_or(false) {
            Ok(())
        } else {
            Err(anyhow::anyhow!("Not this time"))
        }
    });

    // Failed jobs come back after half a second, flagged as retried.
    let on_error = |error: HandlerError, requeue: Requeue| {
        println!("Job failed: {error}");
        let mut job = carrot_queue::codec::decode(requeue.content());
        if let Some(fields) = job.as_object_mut() {
            fields.insert("retried".into(), json!(true));
        }
        if let Err(e) = requeue.schedule_with(Some(Duration::from_millis(500)), &job) {
            eprintln!("Could not requeue the job: {e}");
        }
    };

    queue
        .subscribe_with_error_hook(handler, on_error)
        .await?
        .publish(&json!({ "job": 1 }))
        .await?
        .publish(&json!({ "job": 2 }))
        .await?
        // Not JSON: the handler gets `{"text": "hello"}`.
        .publish_raw(b"hello")
        .await?;

    tokio::time::sleep(Duration::from_secs(2)).await;
    Ok(())
}
