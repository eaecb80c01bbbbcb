//! Worker slots
//!
//! One slot per worker thread: a status byte and a condition lock around
//! the job handed to the worker. The job cell is only touched with the
//! condition lock held.

use rksync_core::atomic::Counter;
use rksync_core::{AtomicWorkerStatus, WorkerStatus};

use super::job::Job;
use crate::condition::ConditionLock;

pub(crate) struct WorkerSlot {
    pub(crate) status: AtomicWorkerStatus,
    pub(crate) cell: ConditionLock<Option<Job>>,
    pub(crate) jobs_run: Counter,
}

impl WorkerSlot {
    pub(crate) fn new() -> Self {
        WorkerSlot {
            status: AtomicWorkerStatus::new(),
            cell: ConditionLock::new(None),
            jobs_run: Counter::new(),
        }
    }

    /// Signal the slot's condition; `false` if no thread is attached
    pub(crate) fn signal(&self) -> bool {
        if !self.status.load().is_running() {
            return false;
        }
        let cell = self.cell.lock();
        cell.notify_all();
        true
    }

    /// Block until the worker has left `Starting`
    pub(crate) fn wait_started(&self) -> WorkerStatus {
        let _cell = self
            .cell
            .lock_when(|_| self.status.load() != WorkerStatus::Starting);
        self.status.load()
    }
}
