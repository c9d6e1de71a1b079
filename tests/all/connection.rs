use crate::helpers::{random_queue_name, MemoryBroker, UnreachableBroker};
use carrot_queue::Connection;

#[tokio::test]
async fn opening_a_queue_makes_sure_it_exists() {
    // Arrange
    let broker = MemoryBroker::default();
    let queue_name = random_queue_name();

    // Act
    let queue = broker.connection().queue(&queue_name).await.unwrap();

    // Assert
    assert_eq!(queue.name(), queue_name);
    assert!(broker.queue_exists(&queue_name));
}

#[tokio::test]
async fn each_queue_gets_its_own_channel() {
    let broker = MemoryBroker::default();
    let connection = broker.connection();

    connection.queue(&random_queue_name()).await.unwrap();
    connection.queue(&random_queue_name()).await.unwrap();

    assert_eq!(broker.channels_opened(), 2);
}

#[tokio::test]
async fn opening_a_queue_is_idempotent() {
    let broker = MemoryBroker::default();
    let connection = broker.connection();
    let queue_name = random_queue_name();

    connection.queue(&queue_name).await.unwrap();
    connection.queue(&queue_name).await.unwrap();

    assert!(broker.queue_exists(&queue_name));
}

#[tokio::test]
async fn failing_to_reach_the_broker_is_a_connection_error() {
    let connection = Connection::from_transport(UnreachableBroker);

    let error = connection.queue(&random_queue_name()).await.unwrap_err();

    assert_eq!(error.to_string(), "Failed to open a channel");
}
