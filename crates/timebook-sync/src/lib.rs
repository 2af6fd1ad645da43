//! Week grid state and the pipeline that books edited hours on the tracker.
//!
//! Edits flow UI thread → [`EditQueue`] → [`WorklogWorker`] → tracker, and the
//! worker's [`WorkerEvent`]s flow back into the [`WorklogLedger`] when the UI
//! thread polls. [`Timesheet`] wires the pieces together.

pub mod coordinator;
pub mod error;
pub mod hours;
pub mod ledger;
pub mod queue;
pub mod timesheet;
pub mod week;
pub mod worker;

pub use coordinator::{IssueSyncCoordinator, SyncSnapshot};
pub use error::SyncError;
pub use hours::{parse_hours, MAX_CELL_HOURS};
pub use ledger::{WorklogEntry, WorklogLedger};
pub use queue::{BookingRequest, EditQueue, EditQueueReceiver, QueueClosed, QueueMessage};
pub use timebook_core::ValidationError;
pub use timesheet::{CellEdit, ShutdownReport, Timesheet, TimesheetSettings};
pub use week::CalendarWeek;
pub use worker::{
    BookingFailure, BookingOutcome, WorkerEvent, WorkerHandle, WorkerPanicked, WorkerState,
    WorklogWorker,
};
