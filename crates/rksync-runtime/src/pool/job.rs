//! Jobs and completion handles
//!
//! A job is one boxed closure plus a shared state block the submitter
//! keeps a handle to. Status only ever moves
//! `Available -> Executing -> Finishing -> Completed`.

use rksync_core::atomic::Counter;
use rksync_core::JobStatus;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::condition::ConditionLock;

pub(crate) type Task = Box<dyn FnOnce() + Send + 'static>;

struct JobState {
    status: ConditionLock<JobStatus>,
    /// Threads inside the task right now; never more than 1
    active_threads: AtomicUsize,
    panicked: AtomicBool,
}

impl JobState {
    fn advance(&self, from: JobStatus, to: JobStatus) {
        let mut status = self.status.lock();
        if *status != from || !from.can_transition_to(to) {
            log::error!(target: "rksync::pool", "illegal job transition {} -> {} (was {})", from, to, *status);
            panic!("illegal job transition {} -> {} (was {})", from, to, *status);
        }
        *status = to;
        if to.is_completed() {
            status.notify_all();
        }
    }
}

/// A unit of work installed in a worker slot
pub(crate) struct Job {
    task: Task,
    state: Arc<JobState>,
}

impl Job {
    pub(crate) fn new(task: Task) -> (Job, JobHandle) {
        let state = Arc::new(JobState {
            status: ConditionLock::new(JobStatus::Available),
            active_threads: AtomicUsize::new(0),
            panicked: AtomicBool::new(false),
        });
        let handle = JobHandle { state: Arc::clone(&state) };
        (Job { task, state }, handle)
    }

    /// Run the task on the calling worker. A panic inside the task is
    /// caught and recorded; the job still completes.
    ///
    /// `jobs_run` is bumped before the job is published as completed, so a
    /// waiter returning from `JobHandle::wait` already sees it counted.
    pub(crate) fn run(self, worker: usize, jobs_run: &Counter) {
        let Job { task, state } = self;
        state.advance(JobStatus::Available, JobStatus::Executing);

        let already = state.active_threads.fetch_add(1, Ordering::AcqRel);
        if already != 0 {
            log::error!(target: "rksync::pool", "job entered by {} threads at once", already + 1);
            panic!("job entered by {} threads at once", already + 1);
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(task));

        state.advance(JobStatus::Executing, JobStatus::Finishing);
        state.active_threads.fetch_sub(1, Ordering::AcqRel);
        if let Err(payload) = outcome {
            state.panicked.store(true, Ordering::Release);
            log::error!(
                target: "rksync::pool",
                "job panicked on worker {}: {}",
                worker,
                panic_message(payload.as_ref())
            );
        }
        jobs_run.increment();
        state.advance(JobStatus::Finishing, JobStatus::Completed);
    }
}

/// Submitter's view of a job
#[derive(Clone)]
pub struct JobHandle {
    state: Arc<JobState>,
}

impl JobHandle {
    pub fn status(&self) -> JobStatus {
        *self.state.status.lock()
    }

    pub fn is_completed(&self) -> bool {
        self.status().is_completed()
    }

    /// Block until the job has completed
    pub fn wait(&self) -> JobStatus {
        *self.state.status.lock_when(|s| s.is_completed())
    }

    /// `wait` bounded by `timeout`; `true` if the job completed
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.state
            .status
            .lock_when_timeout(timeout, |s| s.is_completed())
            .is_some()
    }

    /// Whether the task panicked; meaningful once completed
    pub fn panicked(&self) -> bool {
        self.state.panicked.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("status", &self.status())
            .field("panicked", &self.panicked())
            .finish()
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}
