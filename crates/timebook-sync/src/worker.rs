//! Background consumer of the edit queue.
//!
//! The worker is the only code that writes to the tracker. It runs on its own
//! OS thread with a current-thread tokio runtime, takes one message at a time
//! and reports every outcome as a [`WorkerEvent`] on a std channel that the UI
//! thread drains. It never touches the ledger.

use std::collections::{HashMap, HashSet};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::JoinHandle;

use chrono::NaiveDate;
use parking_lot::Mutex;
use thiserror::Error;
use timebook_tracker::{ErrorKind, IssueTracker, TrackerError, WorklogHandle};

use crate::queue::{BookingRequest, EditQueueReceiver, QueueMessage};

const THREAD_NAME: &str = "timebook-worker";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Processing,
    Stopped,
}

/// What a successful booking did on the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingOutcome {
    Created(WorklogHandle),
    Updated(WorklogHandle),
    /// Zero hours on a cell that had a record
    Deleted(WorklogHandle),
    /// Zero hours on a cell with no record; nothing to do
    Skipped,
}

impl BookingOutcome {
    pub fn handle(&self) -> Option<&WorklogHandle> {
        match self {
            Self::Created(h) | Self::Updated(h) | Self::Deleted(h) => Some(h),
            Self::Skipped => None,
        }
    }
}

/// A failed booking, in a form that can be cloned into events.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BookingFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&TrackerError> for BookingFailure {
    fn from(err: &TrackerError) -> Self {
        Self {
            kind: err.kind(),
            message: err.user_message(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    Booked {
        request: BookingRequest,
        outcome: BookingOutcome,
    },
    Failed {
        request: BookingRequest,
        error: BookingFailure,
    },
    /// Last event the worker sends.
    Stopped { processed: usize, failed: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("the worker thread panicked")]
pub struct WorkerPanicked;

type CellKey = (String, NaiveDate);

pub struct WorklogWorker<T: IssueTracker> {
    tracker: Arc<T>,
    events: Sender<WorkerEvent>,
    state: Arc<Mutex<WorkerState>>,
    /// Record this worker last created or updated per cell
    known: HashMap<CellKey, WorklogHandle>,
    /// Records this worker deleted or found gone
    removed: HashSet<WorklogHandle>,
    processed: usize,
    failed: usize,
}

impl<T: IssueTracker> WorklogWorker<T> {
    pub fn new(tracker: Arc<T>, events: Sender<WorkerEvent>) -> Self {
        Self {
            tracker,
            events,
            state: Arc::new(Mutex::new(WorkerState::Idle)),
            known: HashMap::new(),
            removed: HashSet::new(),
            processed: 0,
            failed: 0,
        }
    }

    /// Start a worker on its own thread.
    pub fn spawn(
        tracker: Arc<T>,
        receiver: EditQueueReceiver,
        events: Sender<WorkerEvent>,
    ) -> std::io::Result<WorkerHandle> {
        let worker = Self::new(tracker, events);
        let state = Arc::clone(&worker.state);

        let thread = std::thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build();
                match runtime {
                    Ok(runtime) => runtime.block_on(worker.run(receiver)),
                    Err(e) => {
                        tracing::error!("Failed to start worker runtime: {}", e);
                        worker.stop();
                    }
                }
            })?;

        Ok(WorkerHandle {
            thread: Some(thread),
            state,
        })
    }

    /// Consume messages until the sentinel arrives or every producer is gone.
    pub async fn run(mut self, mut receiver: EditQueueReceiver) {
        tracing::info!("Worklog worker started");

        loop {
            match receiver.dequeue().await {
                Some(QueueMessage::Booking(request)) => {
                    *self.state.lock() = WorkerState::Processing;
                    let event = self.process(request).await;
                    self.post(event);
                    *self.state.lock() = WorkerState::Idle;
                }
                Some(QueueMessage::Shutdown) => {
                    tracing::info!("Shutdown requested");
                    break;
                }
                None => {
                    tracing::info!("Edit queue closed without shutdown");
                    break;
                }
            }
        }

        self.stop();
    }

    fn stop(self) {
        *self.state.lock() = WorkerState::Stopped;
        tracing::info!(
            "Worklog worker stopped after {} bookings ({} failed)",
            self.processed,
            self.failed
        );
        self.post(WorkerEvent::Stopped {
            processed: self.processed,
            failed: self.failed,
        });
    }

    fn post(&self, event: WorkerEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("Event inbox dropped, outcome discarded");
        }
    }

    async fn process(&mut self, request: BookingRequest) -> WorkerEvent {
        self.processed += 1;
        match self.book(&request).await {
            Ok(outcome) => WorkerEvent::Booked { request, outcome },
            Err(e) => {
                self.failed += 1;
                tracing::error!(
                    "Booking {}h on {} for {} failed: {}",
                    request.hours,
                    request.date,
                    request.issue.key,
                    e
                );
                WorkerEvent::Failed {
                    error: BookingFailure::from(&e),
                    request,
                }
            }
        }
    }

    /// The record a booking should target.
    ///
    /// The request carries whatever the ledger knew when the edit was made,
    /// which can lag behind this worker: a create whose event has not been
    /// applied yet, or a delete the ledger still shows a handle for.
    fn resolve_handle(&self, cell: &CellKey, request: &BookingRequest) -> Option<WorklogHandle> {
        match &request.existing_handle {
            Some(existing) if !self.removed.contains(existing) => Some(existing.clone()),
            _ => self.known.get(cell).cloned(),
        }
    }

    async fn book(&mut self, request: &BookingRequest) -> Result<BookingOutcome, TrackerError> {
        let cell = (request.issue.key.clone(), request.date);
        let handle = self.resolve_handle(&cell, request);

        let outcome = match handle {
            Some(handle) if request.hours > 0.0 => {
                match self.tracker.update_worklog(&handle, request.hours).await {
                    Ok(()) => {
                        self.known.insert(cell, handle.clone());
                        BookingOutcome::Updated(handle)
                    }
                    // Removed on the server since we last looked
                    Err(e) if e.is_not_found() => {
                        tracing::warn!("Work log {} no longer exists, booking a new one", handle);
                        self.forget(&cell, handle);
                        self.create(cell, request).await?
                    }
                    Err(e) => return Err(e),
                }
            }
            Some(handle) => match self.tracker.delete_worklog(&handle).await {
                Ok(()) => {
                    self.forget(&cell, handle.clone());
                    BookingOutcome::Deleted(handle)
                }
                Err(e) if e.is_not_found() => {
                    tracing::info!("Work log {} was already deleted", handle);
                    self.forget(&cell, handle.clone());
                    BookingOutcome::Deleted(handle)
                }
                Err(e) => return Err(e),
            },
            None if request.hours > 0.0 => self.create(cell, request).await?,
            None => BookingOutcome::Skipped,
        };

        tracing::debug!(
            "Booked {} {}: {:?}",
            request.issue.key,
            request.date,
            outcome
        );
        Ok(outcome)
    }

    async fn create(
        &mut self,
        cell: CellKey,
        request: &BookingRequest,
    ) -> Result<BookingOutcome, TrackerError> {
        let handle = self
            .tracker
            .create_worklog(&request.issue.id, request.hours, request.date)
            .await?;
        self.known.insert(cell, handle.clone());
        Ok(BookingOutcome::Created(handle))
    }

    fn forget(&mut self, cell: &CellKey, handle: WorklogHandle) {
        if self.known.get(cell) == Some(&handle) {
            self.known.remove(cell);
        }
        self.removed.insert(handle);
    }
}

/// Owner's view of a spawned worker.
pub struct WorkerHandle {
    thread: Option<JoinHandle<()>>,
    state: Arc<Mutex<WorkerState>>,
}

impl WorkerHandle {
    pub fn state(&self) -> WorkerState {
        *self.state.lock()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Block until the worker has stopped. Queue the sentinel first.
    pub fn join(mut self) -> Result<(), WorkerPanicked> {
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| WorkerPanicked),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::queue::EditQueue;
    use std::sync::mpsc;
    use timebook_tracker::{InMemoryTracker, IssueRef, ScriptedFailure, TrackerCall};

    fn wed() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 3).unwrap()
    }

    fn request(hours: f64, existing_handle: Option<WorklogHandle>) -> BookingRequest {
        BookingRequest {
            issue: IssueRef {
                id: "10001".into(),
                key: "ABC-1".into(),
            },
            date: wed(),
            hours,
            existing_handle,
        }
    }

    fn drain(rx: &mpsc::Receiver<WorkerEvent>) -> Vec<WorkerEvent> {
        rx.try_iter().collect()
    }

    #[tokio::test]
    async fn test_second_edit_updates_before_event_is_applied() {
        let tracker = Arc::new(InMemoryTracker::new("alice"));
        let (events_tx, events_rx) = mpsc::channel();
        let (queue, receiver) = EditQueue::new();

        // Both edits made before the UI saw the create's handle
        queue.enqueue(request(4.0, None)).unwrap();
        queue.enqueue(request(6.0, None)).unwrap();
        queue.shutdown().unwrap();

        WorklogWorker::new(Arc::clone(&tracker), events_tx)
            .run(receiver)
            .await;

        assert_eq!(tracker.create_count(), 1);
        assert!((tracker.hours_on("10001", wed()) - 6.0).abs() < f64::EPSILON);

        let events = drain(&events_rx);
        assert!(matches!(
            &events[0],
            WorkerEvent::Booked { outcome: BookingOutcome::Created(_), .. }
        ));
        assert!(matches!(
            &events[1],
            WorkerEvent::Booked { outcome: BookingOutcome::Updated(_), .. }
        ));
        assert_eq!(
            events[2],
            WorkerEvent::Stopped {
                processed: 2,
                failed: 0
            }
        );
    }

    #[tokio::test]
    async fn test_zero_hours_deletes_then_recreates() {
        let tracker = Arc::new(InMemoryTracker::new("alice"));
        let handle = tracker.add_worklog("10001", wed(), 4.0, "alice");
        let (events_tx, events_rx) = mpsc::channel();
        let (queue, receiver) = EditQueue::new();

        queue.enqueue(request(0.0, Some(handle.clone()))).unwrap();
        // Ledger still shows the deleted record's handle
        queue.enqueue(request(3.0, Some(handle.clone()))).unwrap();
        queue.shutdown().unwrap();

        WorklogWorker::new(Arc::clone(&tracker), events_tx)
            .run(receiver)
            .await;

        let calls = tracker.calls();
        assert_eq!(calls[0], TrackerCall::Delete { handle });
        assert!(matches!(calls[1], TrackerCall::Create { hours, .. } if hours == 3.0));
        assert_eq!(drain(&events_rx).len(), 3);
    }

    #[tokio::test]
    async fn test_zero_hours_without_record_is_skipped() {
        let tracker = Arc::new(InMemoryTracker::new("alice"));
        let (events_tx, events_rx) = mpsc::channel();
        let (queue, receiver) = EditQueue::new();

        queue.enqueue(request(0.0, None)).unwrap();
        drop(queue);

        WorklogWorker::new(Arc::clone(&tracker), events_tx)
            .run(receiver)
            .await;

        assert!(tracker.calls().is_empty());
        assert!(matches!(
            &drain(&events_rx)[0],
            WorkerEvent::Booked { outcome: BookingOutcome::Skipped, .. }
        ));
    }

    #[tokio::test]
    async fn test_failure_is_reported_and_worker_continues() {
        let tracker = Arc::new(InMemoryTracker::new("alice"));
        tracker.fail_next_write(ScriptedFailure::Authentication);
        let (events_tx, events_rx) = mpsc::channel();
        let (queue, receiver) = EditQueue::new();

        queue.enqueue(request(4.0, None)).unwrap();
        queue.enqueue(request(5.0, None)).unwrap();
        queue.shutdown().unwrap();

        WorklogWorker::new(Arc::clone(&tracker), events_tx)
            .run(receiver)
            .await;

        let events = drain(&events_rx);
        match &events[0] {
            WorkerEvent::Failed { error, .. } => assert_eq!(error.kind, ErrorKind::Authentication),
            other => unreachable!("expected a failure, got {:?}", other),
        }
        assert!(matches!(
            &events[1],
            WorkerEvent::Booked { outcome: BookingOutcome::Created(_), .. }
        ));
        assert_eq!(
            events[2],
            WorkerEvent::Stopped {
                processed: 2,
                failed: 1
            }
        );
    }

    #[tokio::test]
    async fn test_vanished_worklog_is_booked_again() {
        let tracker = Arc::new(InMemoryTracker::new("alice"));
        let stale = tracker.add_worklog("10001", wed(), 4.0, "alice");
        // Someone removes it in the tracker's web UI
        tracker.delete_worklog(&stale).await.unwrap();
        let (events_tx, events_rx) = mpsc::channel();
        let (queue, receiver) = EditQueue::new();

        queue.enqueue(request(5.0, Some(stale.clone()))).unwrap();
        // The ledger still holds the stale handle for the next edit
        queue.enqueue(request(6.0, Some(stale.clone()))).unwrap();
        queue.enqueue(request(0.0, Some(stale.clone()))).unwrap();
        queue.shutdown().unwrap();

        WorklogWorker::new(Arc::clone(&tracker), events_tx)
            .run(receiver)
            .await;

        let events = drain(&events_rx);
        let WorkerEvent::Booked {
            outcome: BookingOutcome::Created(fresh),
            ..
        } = &events[0]
        else {
            unreachable!("expected a create, got {:?}", events[0])
        };
        assert_ne!(*fresh, stale);
        assert_eq!(
            events[1],
            WorkerEvent::Booked {
                request: request(6.0, Some(stale.clone())),
                outcome: BookingOutcome::Updated(fresh.clone()),
            }
        );
        assert!(matches!(
            &events[2],
            WorkerEvent::Booked { outcome: BookingOutcome::Deleted(h), .. } if h == fresh
        ));
        assert_eq!(tracker.create_count(), 1);
        assert!(tracker.worklogs("10001").is_empty());
    }

    #[tokio::test]
    async fn test_deleting_a_vanished_worklog_succeeds() {
        let tracker = Arc::new(InMemoryTracker::new("alice"));
        let stale = tracker.add_worklog("10001", wed(), 4.0, "alice");
        tracker.delete_worklog(&stale).await.unwrap();
        let (events_tx, events_rx) = mpsc::channel();
        let (queue, receiver) = EditQueue::new();

        queue.enqueue(request(0.0, Some(stale.clone()))).unwrap();
        queue.shutdown().unwrap();

        WorklogWorker::new(Arc::clone(&tracker), events_tx)
            .run(receiver)
            .await;

        assert_eq!(
            drain(&events_rx)[0],
            WorkerEvent::Booked {
                request: request(0.0, Some(stale.clone())),
                outcome: BookingOutcome::Deleted(stale),
            }
        );
    }

    #[test]
    fn test_spawned_worker_stops_on_sentinel() {
        let tracker = Arc::new(InMemoryTracker::new("alice"));
        let (events_tx, events_rx) = mpsc::channel();
        let (queue, receiver) = EditQueue::new();

        let handle = WorklogWorker::spawn(Arc::clone(&tracker), receiver, events_tx).unwrap();
        queue.enqueue(request(2.0, None)).unwrap();
        queue.shutdown().unwrap();
        handle.join().unwrap();

        let events = drain(&events_rx);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], WorkerEvent::Stopped { processed: 1, .. }));
        assert!(queue.is_closed());
    }
}
