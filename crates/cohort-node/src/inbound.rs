//! Inbound message buffer.
//!
//! An ordered buffer of delivered messages awaiting consumer retrieval.
//! Consumers dequeue either the head (any source) or the first message from
//! a specific source, in arrival order; by-source dequeue never disturbs
//! other entries. The reader task is the only producer, application tasks
//! are the consumers.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::Notify;

use cohort_wire::Message;

use crate::NodeError;

#[derive(Default)]
pub(crate) struct InboundBuffer {
    queue: Mutex<VecDeque<Message>>,
    notify: Notify,
    closed: AtomicBool,
}

impl InboundBuffer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append a message and wake every waiter.
    pub(crate) fn push(&self, msg: Message) {
        self.queue.lock().push_back(msg);
        self.notify.notify_waiters();
    }

    /// Mark the buffer closed and wake waiters so they can observe it.
    /// Already-buffered messages stay retrievable.
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    /// Dequeue the first message matching `source` (or the head when
    /// `source` is `None`), waiting until one arrives.
    pub(crate) async fn pop(&self, source: Option<i64>) -> Result<Message, NodeError> {
        loop {
            // Register interest before checking: a push between the check
            // and the await would otherwise be missed.
            let notified = self.notify.notified();

            if let Some(msg) = self.try_pop(source) {
                return Ok(msg);
            }
            if self.closed.load(Ordering::Acquire) {
                return Err(NodeError::Closed);
            }

            notified.await;
        }
    }

    fn try_pop(&self, source: Option<i64>) -> Option<Message> {
        let mut queue = self.queue.lock();
        let index = match source {
            None => {
                if queue.is_empty() {
                    return None;
                }
                0
            }
            Some(s) => queue.iter().position(|m| m.source == s)?,
        };
        queue.remove(index)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.queue.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn msg(source: i64, tag: i64) -> Message {
        Message::new(source, 9, tag, Value::Null)
    }

    #[tokio::test]
    async fn pop_any_is_fifo() {
        let buffer = InboundBuffer::new();
        buffer.push(msg(0, 1));
        buffer.push(msg(1, 2));
        buffer.push(msg(0, 3));

        assert_eq!(buffer.pop(None).await.unwrap().tag, 1);
        assert_eq!(buffer.pop(None).await.unwrap().tag, 2);
        assert_eq!(buffer.pop(None).await.unwrap().tag, 3);
    }

    #[tokio::test]
    async fn pop_by_source_skips_other_entries() {
        let buffer = InboundBuffer::new();
        buffer.push(msg(0, 1));
        buffer.push(msg(1, 2));
        buffer.push(msg(1, 3));

        assert_eq!(buffer.pop(Some(1)).await.unwrap().tag, 2);
        assert_eq!(buffer.pop(Some(1)).await.unwrap().tag, 3);
        // The skipped entry is still there, untouched.
        assert_eq!(buffer.pop(None).await.unwrap().tag, 1);
        assert_eq!(buffer.len(), 0);
    }

    #[tokio::test]
    async fn pop_waits_for_matching_push() {
        let buffer = std::sync::Arc::new(InboundBuffer::new());

        let waiter = {
            let buffer = buffer.clone();
            tokio::spawn(async move { buffer.pop(Some(2)).await })
        };

        // Non-matching traffic must not wake the by-source waiter with a
        // wrong message.
        buffer.push(msg(0, 1));
        tokio::task::yield_now().await;
        buffer.push(Message::new(2, 9, 5, json!("for you")));

        let got = waiter.await.unwrap().unwrap();
        assert_eq!(got.source, 2);
        assert_eq!(got.tag, 5);
        assert_eq!(buffer.len(), 1);
    }

    #[tokio::test]
    async fn close_wakes_waiters_with_closed() {
        let buffer = std::sync::Arc::new(InboundBuffer::new());

        let waiter = {
            let buffer = buffer.clone();
            tokio::spawn(async move { buffer.pop(None).await })
        };
        tokio::task::yield_now().await;

        buffer.close();
        assert!(matches!(waiter.await.unwrap(), Err(NodeError::Closed)));
    }

    #[tokio::test]
    async fn buffered_messages_survive_close() {
        let buffer = InboundBuffer::new();
        buffer.push(msg(0, 1));
        buffer.close();

        assert_eq!(buffer.pop(None).await.unwrap().tag, 1);
        assert!(matches!(buffer.pop(None).await, Err(NodeError::Closed)));
    }
}
