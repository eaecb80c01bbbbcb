//! Worker, job and pool-control state machines
//!
//! The transition tables here are the single source of truth for the
//! pool: every status change goes through `can_transition_to`, so an
//! illegal move is caught at the point it happens.

use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};
use crate::atomic::{bit_mask, AtomicBits};

/// Lifecycle of one worker slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerStatus {
    /// No thread attached (before spawn, after exit)
    NotRunning = 0,

    /// Thread spawned, not yet accepting work
    Starting = 1,

    /// Idle, waiting on its condition variable
    Sleeping = 2,

    /// A job was installed and the worker signalled
    WakeRequested = 3,

    /// Worker observed the wake and took the job
    Awake = 4,

    /// Executing the installed job
    RunningJob = 5,
}

impl WorkerStatus {
    /// Whether moving from `self` to `next` is a legal transition
    pub const fn can_transition_to(self, next: WorkerStatus) -> bool {
        use WorkerStatus::*;
        matches!(
            (self, next),
            (NotRunning, Starting)
                | (Starting, Sleeping)
                | (Starting, NotRunning)
                | (Sleeping, WakeRequested)
                | (Sleeping, NotRunning)
                | (WakeRequested, Awake)
                | (Awake, RunningJob)
                | (RunningJob, Sleeping)
        )
    }

    /// A worker is idle only while sleeping with no job installed
    #[inline]
    pub const fn is_idle(self) -> bool {
        matches!(self, WorkerStatus::Sleeping)
    }

    /// Whether a thread is attached to the slot
    #[inline]
    pub const fn is_running(self) -> bool {
        !matches!(self, WorkerStatus::NotRunning)
    }
}

impl From<u8> for WorkerStatus {
    fn from(v: u8) -> Self {
        match v {
            1 => WorkerStatus::Starting,
            2 => WorkerStatus::Sleeping,
            3 => WorkerStatus::WakeRequested,
            4 => WorkerStatus::Awake,
            5 => WorkerStatus::RunningJob,
            _ => WorkerStatus::NotRunning,
        }
    }
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerStatus::NotRunning => "not-running",
            WorkerStatus::Starting => "starting",
            WorkerStatus::Sleeping => "sleeping",
            WorkerStatus::WakeRequested => "wake-requested",
            WorkerStatus::Awake => "awake",
            WorkerStatus::RunningJob => "running-job",
        };
        f.write_str(name)
    }
}

/// Worker status stored in a single byte
#[derive(Debug)]
pub struct AtomicWorkerStatus(AtomicU8);

impl AtomicWorkerStatus {
    pub const fn new() -> Self {
        AtomicWorkerStatus(AtomicU8::new(WorkerStatus::NotRunning as u8))
    }

    #[inline]
    pub fn load(&self) -> WorkerStatus {
        WorkerStatus::from(self.0.load(Ordering::Acquire))
    }

    /// Move from `from` to `to`.
    ///
    /// Fails with the observed status if the slot was not in `from`, or
    /// with `from` itself if the table forbids the move.
    pub fn transition(&self, from: WorkerStatus, to: WorkerStatus) -> Result<(), WorkerStatus> {
        if !from.can_transition_to(to) {
            return Err(from);
        }
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(WorkerStatus::from)
    }

    /// `transition` for moves the caller's protocol guarantees.
    ///
    /// A failure means the slot's invariants are broken; panics.
    #[track_caller]
    pub fn advance(&self, from: WorkerStatus, to: WorkerStatus) {
        if let Err(actual) = self.transition(from, to) {
            log::error!("illegal worker transition {} -> {} (was {})", from, to, actual);
            panic!("illegal worker transition {} -> {} (was {})", from, to, actual);
        }
    }
}

impl Default for AtomicWorkerStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Lifecycle of one submitted job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum JobStatus {
    /// Installed, not yet picked up
    Available = 1,
    /// A worker is running it
    Executing = 2,
    /// Returned, bookkeeping in progress
    Finishing = 3,
    /// Done; waiters may proceed
    Completed = 4,
}

impl JobStatus {
    pub const fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Available, Executing) | (Executing, Finishing) | (Finishing, Completed)
        )
    }

    #[inline]
    pub const fn is_completed(self) -> bool {
        matches!(self, JobStatus::Completed)
    }
}

impl From<u8> for JobStatus {
    fn from(v: u8) -> Self {
        match v {
            2 => JobStatus::Executing,
            3 => JobStatus::Finishing,
            4 => JobStatus::Completed,
            _ => JobStatus::Available,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStatus::Available => "available",
            JobStatus::Executing => "executing",
            JobStatus::Finishing => "finishing",
            JobStatus::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Pool-wide control bits
pub mod control_bits {
    use super::bit_mask;

    pub const STOP_BIT: u8 = 0;
    pub const REAPING_THREADS_BIT: u8 = 1;
    pub const THREADS_REAPED_BIT: u8 = 2;

    pub const STOP: u8 = bit_mask(STOP_BIT);
    pub const REAPING_THREADS: u8 = bit_mask(REAPING_THREADS_BIT);
    pub const THREADS_REAPED: u8 = bit_mask(THREADS_REAPED_BIT);
}

/// Stop / reaping / reaped flags of a thread pool
///
/// Each flag is flipped with an atomic test-and-set, so any thread may
/// request a stop while workers poll the flag between jobs.
#[derive(Debug, Default)]
pub struct PoolControl {
    bits: AtomicBits,
}

impl PoolControl {
    pub const fn new() -> Self {
        PoolControl { bits: AtomicBits::new() }
    }

    /// Request a stop; returns `true` if this call set the bit
    #[inline]
    pub fn request_stop(&self) -> bool {
        !self.bits.test_and_set(control_bits::STOP)
    }

    #[inline]
    pub fn is_stopping(&self) -> bool {
        self.bits.is_set(control_bits::STOP)
    }

    /// Claim the reaper role; only one caller wins until `finish_reaping`
    #[inline]
    pub fn begin_reaping(&self) -> bool {
        !self.bits.test_and_set(control_bits::REAPING_THREADS)
    }

    /// Publish that every thread has been joined and release the reaper role
    pub fn finish_reaping(&self) {
        self.bits.set_checked(control_bits::THREADS_REAPED, "threads-reaped");
        self.bits.clear_checked(control_bits::REAPING_THREADS, "reaping-threads");
    }

    /// Give up the reaper role without publishing `THREADS_REAPED`
    pub fn cancel_reaping(&self) {
        self.bits.clear_checked(control_bits::REAPING_THREADS, "reaping-threads");
    }

    #[inline]
    pub fn is_reaping(&self) -> bool {
        self.bits.is_set(control_bits::REAPING_THREADS)
    }

    #[inline]
    pub fn is_reaped(&self) -> bool {
        self.bits.is_set(control_bits::THREADS_REAPED)
    }

    /// Raw control byte (for diagnostics)
    #[inline]
    pub fn bits(&self) -> u8 {
        self.bits.load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_cycle() {
        use WorkerStatus::*;
        let cycle = [NotRunning, Starting, Sleeping, WakeRequested, Awake, RunningJob, Sleeping, NotRunning];
        for pair in cycle.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_worker_illegal_moves() {
        use WorkerStatus::*;
        assert!(!NotRunning.can_transition_to(Sleeping));
        assert!(!Sleeping.can_transition_to(RunningJob));
        assert!(!RunningJob.can_transition_to(NotRunning));
        assert!(!WakeRequested.can_transition_to(Sleeping));
        assert!(!Awake.can_transition_to(Sleeping));
    }

    #[test]
    fn test_spawn_rollback_allowed() {
        assert!(WorkerStatus::Starting.can_transition_to(WorkerStatus::NotRunning));
    }

    #[test]
    fn test_atomic_status_transition() {
        let status = AtomicWorkerStatus::new();
        assert_eq!(status.load(), WorkerStatus::NotRunning);

        assert!(status.transition(WorkerStatus::NotRunning, WorkerStatus::Starting).is_ok());
        assert_eq!(
            status.transition(WorkerStatus::NotRunning, WorkerStatus::Starting),
            Err(WorkerStatus::Starting)
        );
        assert_eq!(
            status.transition(WorkerStatus::Starting, WorkerStatus::RunningJob),
            Err(WorkerStatus::Starting)
        );
        status.advance(WorkerStatus::Starting, WorkerStatus::Sleeping);
        assert!(status.load().is_idle());
    }

    #[test]
    #[should_panic(expected = "illegal worker transition")]
    fn test_advance_panics_on_mismatch() {
        let status = AtomicWorkerStatus::new();
        status.advance(WorkerStatus::Sleeping, WorkerStatus::WakeRequested);
    }

    #[test]
    fn test_status_byte_values() {
        assert_eq!(WorkerStatus::RunningJob as u8, 5);
        assert_eq!(WorkerStatus::from(3), WorkerStatus::WakeRequested);
        assert_eq!(WorkerStatus::from(200), WorkerStatus::NotRunning);
        assert_eq!(JobStatus::Available as u8, 1);
        assert_eq!(JobStatus::from(4), JobStatus::Completed);
    }

    #[test]
    fn test_job_transitions() {
        use JobStatus::*;
        assert!(Available.can_transition_to(Executing));
        assert!(Executing.can_transition_to(Finishing));
        assert!(Finishing.can_transition_to(Completed));
        assert!(!Available.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Available));
        assert!(Completed.is_completed());
    }

    #[test]
    fn test_pool_control() {
        let control = PoolControl::new();
        assert!(!control.is_stopping());

        assert!(control.request_stop());
        assert!(!control.request_stop());
        assert!(control.is_stopping());

        assert!(control.begin_reaping());
        assert!(!control.begin_reaping());
        assert!(control.is_reaping());
        assert!(!control.is_reaped());

        control.cancel_reaping();
        assert!(!control.is_reaping());
        assert!(control.begin_reaping());

        control.finish_reaping();
        assert!(control.is_reaped());
        assert!(!control.is_reaping());
        assert_eq!(control.bits(), control_bits::STOP | control_bits::THREADS_REAPED);
    }
}
