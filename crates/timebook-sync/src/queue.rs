//! FIFO queue of pending bookings, UI thread to worker.

use chrono::NaiveDate;
use thiserror::Error;
use timebook_tracker::{IssueRef, WorklogHandle};
use tokio::sync::mpsc;

/// One cell's desired state, to be written to the tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingRequest {
    pub issue: IssueRef,
    pub date: NaiveDate,
    pub hours: f64,
    /// Record the ledger knew about when the edit was made
    pub existing_handle: Option<WorklogHandle>,
}

impl BookingRequest {
    pub fn issue_key(&self) -> &str {
        &self.issue.key
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueueMessage {
    Booking(BookingRequest),
    /// Stop after everything queued before it
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("the edit queue is closed; the worker has stopped")]
pub struct QueueClosed;

/// Producer side. Cheap to clone; all clones feed the same worker.
#[derive(Debug, Clone)]
pub struct EditQueue {
    tx: mpsc::UnboundedSender<QueueMessage>,
}

/// Consumer side, owned by the worker.
#[derive(Debug)]
pub struct EditQueueReceiver {
    rx: mpsc::UnboundedReceiver<QueueMessage>,
}

impl EditQueue {
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (EditQueue, EditQueueReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (EditQueue { tx }, EditQueueReceiver { rx })
    }

    /// Queue a booking. Never blocks.
    pub fn enqueue(&self, request: BookingRequest) -> Result<(), QueueClosed> {
        tracing::debug!(
            "Queueing {}h for {} on {}",
            request.hours,
            request.issue.key,
            request.date
        );
        self.tx
            .send(QueueMessage::Booking(request))
            .map_err(|_| QueueClosed)
    }

    /// Queue the shutdown sentinel behind any pending bookings.
    pub fn shutdown(&self) -> Result<(), QueueClosed> {
        self.tx.send(QueueMessage::Shutdown).map_err(|_| QueueClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl EditQueueReceiver {
    /// Next message, or `None` once every producer is gone.
    pub async fn dequeue(&mut self) -> Option<QueueMessage> {
        self.rx.recv().await
    }

    /// Next message if one is already waiting.
    pub fn try_dequeue(&mut self) -> Option<QueueMessage> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    fn request(key: &str, hours: f64) -> BookingRequest {
        BookingRequest {
            issue: IssueRef {
                id: format!("id-{}", key),
                key: key.to_string(),
            },
            date: NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
            hours,
            existing_handle: None,
        }
    }

    #[tokio::test]
    async fn test_fifo_across_producers() {
        let (queue, mut receiver) = EditQueue::new();
        let other = queue.clone();

        queue.enqueue(request("A-1", 1.0)).unwrap();
        other.enqueue(request("A-2", 2.0)).unwrap();
        queue.enqueue(request("A-3", 3.0)).unwrap();
        other.shutdown().unwrap();

        let mut keys = Vec::new();
        while let Some(message) = receiver.dequeue().await {
            match message {
                QueueMessage::Booking(r) => keys.push(r.issue.key),
                QueueMessage::Shutdown => break,
            }
        }
        assert_eq!(keys, vec!["A-1", "A-2", "A-3"]);
    }

    #[tokio::test]
    async fn test_dequeue_none_when_producers_dropped() {
        let (queue, mut receiver) = EditQueue::new();
        queue.enqueue(request("A-1", 1.0)).unwrap();
        drop(queue);

        assert!(matches!(
            receiver.dequeue().await,
            Some(QueueMessage::Booking(_))
        ));
        assert_eq!(receiver.dequeue().await, None);
    }

    #[test]
    fn test_enqueue_fails_when_consumer_gone() {
        let (queue, receiver) = EditQueue::new();
        drop(receiver);

        assert!(queue.is_closed());
        assert_eq!(queue.enqueue(request("A-1", 1.0)), Err(QueueClosed));
        assert_eq!(queue.shutdown(), Err(QueueClosed));
    }

    #[test]
    fn test_try_dequeue() {
        let (queue, mut receiver) = EditQueue::new();
        assert_eq!(receiver.try_dequeue(), None);
        queue.shutdown().unwrap();
        assert_eq!(receiver.try_dequeue(), Some(QueueMessage::Shutdown));
    }
}
