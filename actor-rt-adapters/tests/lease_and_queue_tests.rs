//! Integration tests exercising the lock and message queue adapters together,
//! the way the worker/runtime actually use them.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use actor_rt_adapters::{InMemoryLockAdapter, InMemoryMessageQueue, LockAdapter, MessageQueue};
use actor_rt_core::{ActorId, Message, MessageType};

#[tokio::test]
async fn lease_contention_blocks_a_second_activation() {
    let lock = InMemoryLockAdapter::new();
    let actor_id = ActorId::new("counter", "a1");

    let first = lock
        .acquire(&actor_id.to_string(), Duration::from_secs(30))
        .await
        .unwrap();
    assert!(first.is_some());

    let second = lock
        .acquire(&actor_id.to_string(), Duration::from_secs(30))
        .await
        .unwrap();
    assert!(second.is_none(), "a live lease must block a second holder");

    lock.release(&first.unwrap()).await.unwrap();
    let third = lock
        .acquire(&actor_id.to_string(), Duration::from_secs(30))
        .await
        .unwrap();
    assert!(third.is_some(), "release must free the key immediately");
}

#[tokio::test]
async fn messages_for_the_same_actor_are_delivered_in_enqueue_order() {
    let queue = InMemoryMessageQueue::new();
    let actor_id = ActorId::new("counter", "a1");
    let queue_name = actor_id.queue_name();

    let first = Message::new(
        actor_id.clone(),
        MessageType::Execute,
        "corr-1",
        serde_json::json!({"op": "increment", "value": 1}),
    );
    let second = Message::new(
        actor_id.clone(),
        MessageType::Execute,
        "corr-1",
        serde_json::json!({"op": "increment", "value": 2}),
    );
    let first_id = first.message_id;
    let second_id = second.message_id;

    queue
        .enqueue(&queue_name, first, 0, None, None)
        .await
        .unwrap();
    queue
        .enqueue(&queue_name, second, 0, None, None)
        .await
        .unwrap();

    let delivered_first = queue
        .dequeue(&queue_name, Duration::from_secs(5))
        .await
        .unwrap()
        .unwrap();
    let delivered_second = queue
        .dequeue(&queue_name, Duration::from_secs(5))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(delivered_first.message_id, first_id);
    assert_eq!(delivered_second.message_id, second_id);
}

#[tokio::test]
async fn retry_exhaustion_dead_letters_exactly_once() {
    let queue = InMemoryMessageQueue::new();
    let actor_id = ActorId::new("counter", "a1");
    let message = Message::new(
        actor_id,
        MessageType::Execute,
        "corr-1",
        serde_json::json!({"op": "increment"}),
    );
    let message_id = message.message_id;

    queue
        .dead_letter(message, "max_retries_exceeded")
        .await
        .unwrap();

    let letters = queue.dead_letters().await;
    assert_eq!(letters.len(), 1);
    assert_eq!(letters[0].message.message_id, message_id);
}
