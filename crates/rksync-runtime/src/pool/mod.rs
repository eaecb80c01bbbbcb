//! Fixed-size worker thread pool
//!
//! One OS thread per slot, created at initialization and reused until the
//! pool is reaped. `submit` hands a job to an idle worker and returns as
//! soon as it is installed; when every worker is busy the submitter parks
//! until one frees up, so jobs are never queued beyond the worker count.
//!
//! Dispatch takes no pool-wide lock. Idle workers sit in a lock-free
//! queue, each slot is guarded by its own condition lock, and the
//! stop/reaping/reaped flags are atomic bits.
//!
//! # Example
//!
//! ```ignore
//! let pool = ThreadPool::with_config(PoolConfig::new().num_workers(4))?;
//! let handle = pool.submit(|| compile_pattern())?;
//! handle.wait();
//! pool.reap_threads();
//! ```

mod job;
mod slot;
mod worker;

pub use job::JobHandle;

use crossbeam_queue::ArrayQueue;
use parking_lot::Mutex;
use rksync_core::atomic::Counter;
use rksync_core::{PoolControl, PoolError, PoolResult, WorkerStatus};
use std::fmt;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::condition::ConditionLock;
use crate::config::{detected_cpu_cores, PoolConfig};
use crate::parking::{new_parking, Parking};
use job::{panic_message, Job, Task};
use slot::WorkerSlot;

/// Thread-creation hook; the default is `Builder::spawn`
pub(crate) type Spawner<'a> =
    dyn FnMut(usize, thread::Builder, Task) -> io::Result<JoinHandle<()>> + 'a;

/// State shared by the pool handle and every worker
pub(crate) struct PoolShared {
    slots: Box<[WorkerSlot]>,
    idle: ArrayQueue<usize>,
    control: PoolControl,
    parking: Box<dyn Parking>,
    live_threads: Counter,
    park_timeout: Duration,
    debug_logging: bool,
    backpressure: Counter,
}

impl PoolShared {
    fn advance(&self, index: usize, from: WorkerStatus, to: WorkerStatus) {
        self.slots[index].status.advance(from, to);
        if self.debug_logging {
            log::debug!(target: "rksync::pool", "worker {}: {} -> {}", index, from, to);
        }
    }

    fn push_idle(&self, index: usize) {
        if self.idle.push(index).is_err() {
            log::error!(target: "rksync::pool", "idle queue full, worker {} dropped", index);
        }
    }
}

/// Fixed-size pool of worker threads
pub struct ThreadPool {
    shared: Arc<PoolShared>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    reaped: ConditionLock<bool>,
    cpu_cores: usize,
    config: PoolConfig,
}

impl ThreadPool {
    /// Create a pool configured from the environment
    /// (`PoolConfig::from_env`)
    pub fn initialize() -> PoolResult<Self> {
        Self::with_config(PoolConfig::from_env())
    }

    /// Create a pool and wait until every worker is sleeping.
    ///
    /// If a worker thread cannot be created, the threads already started
    /// are stopped and joined before the error is returned.
    pub fn with_config(config: PoolConfig) -> PoolResult<Self> {
        Self::with_spawner(config, &mut |_, builder, main| builder.spawn(main))
    }

    pub(crate) fn with_spawner(config: PoolConfig, spawn: &mut Spawner<'_>) -> PoolResult<Self> {
        config.validate()?;
        let n = config.num_workers;

        let shared = Arc::new(PoolShared {
            slots: (0..n).map(|_| WorkerSlot::new()).collect(),
            idle: ArrayQueue::new(n),
            control: PoolControl::new(),
            parking: new_parking(),
            live_threads: Counter::new(),
            park_timeout: config.park_timeout,
            debug_logging: config.debug_logging,
            backpressure: Counter::new(),
        });
        let pool = ThreadPool {
            shared,
            handles: Mutex::new(Vec::with_capacity(n)),
            reaped: ConditionLock::new(false),
            cpu_cores: detected_cpu_cores(),
            config,
        };

        for index in 0..n {
            pool.shared.advance(index, WorkerStatus::NotRunning, WorkerStatus::Starting);

            let mut builder = thread::Builder::new().name(format!("rksync-worker-{}", index));
            if pool.config.stack_size != 0 {
                builder = builder.stack_size(pool.config.stack_size);
            }
            let shared = Arc::clone(&pool.shared);
            match spawn(index, builder, Box::new(move || worker::run(shared, index))) {
                Ok(handle) => pool.handles.lock().push(handle),
                Err(source) => {
                    pool.shared.advance(index, WorkerStatus::Starting, WorkerStatus::NotRunning);
                    log::error!(
                        target: "rksync::pool",
                        "spawning worker {} failed: {}; rolling back {} started",
                        index,
                        source,
                        index
                    );
                    pool.reap_threads();
                    return Err(PoolError::Spawn { index, source });
                }
            }
        }

        for slot in pool.shared.slots.iter() {
            slot.wait_started();
        }
        log::debug!(target: "rksync::pool", "pool ready with {} workers", n);
        Ok(pool)
    }

    /// Hand `f` to an idle worker.
    ///
    /// Blocks while every worker is busy. Returns once the job is
    /// installed; use the handle to wait for completion. Fails with
    /// `PoolError::Stopped` once the pool is stopping or reaped.
    pub fn submit<F>(&self, f: F) -> PoolResult<JobHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        let (job, handle) = Job::new(Box::new(f));
        let index = self.acquire_idle()?;
        let slot = &self.shared.slots[index];

        {
            let mut cell = slot.cell.lock();
            if self.shared.control.is_stopping() {
                self.shared.push_idle(index);
                return Err(PoolError::Stopped);
            }
            self.shared.advance(index, WorkerStatus::Sleeping, WorkerStatus::WakeRequested);
            *cell = Some(job);
        }
        self.wake_thread(index);
        Ok(handle)
    }

    /// `submit` for a plain function and its argument
    pub fn submit_fn<A>(&self, function: fn(A), argument: A) -> PoolResult<JobHandle>
    where
        A: Send + 'static,
    {
        self.submit(move || function(argument))
    }

    /// Signal worker `index`'s condition.
    ///
    /// `false` if `index` is out of range or no thread is attached.
    pub fn wake_thread(&self, index: usize) -> bool {
        self.shared.slots.get(index).is_some_and(|slot| slot.signal())
    }

    /// Stop every worker and join them.
    ///
    /// Jobs already installed run to completion first. Safe to call from
    /// several threads at once: one caller joins the workers and the rest
    /// wait until it is done. Must not be called from a job.
    pub fn reap_threads(&self) {
        let control = &self.shared.control;
        if control.is_reaped() {
            return;
        }
        control.request_stop();

        if !control.begin_reaping() {
            drop(self.reaped.lock_when(|done| *done));
            return;
        }
        if control.is_reaped() {
            control.cancel_reaping();
            return;
        }

        self.shared.parking.wake_all();
        for index in 0..self.shared.slots.len() {
            self.wake_thread(index);
        }

        let handles = std::mem::take(&mut *self.handles.lock());
        let joined = handles.len();
        for handle in handles {
            if let Err(payload) = handle.join() {
                log::error!(
                    target: "rksync::pool",
                    "worker thread panicked: {}",
                    panic_message(payload.as_ref())
                );
            }
        }

        // Exited workers leave their last idle entry behind
        while self.shared.idle.pop().is_some() {}

        control.finish_reaping();
        self.reaped.lock().unlock_with(true);
        log::debug!(target: "rksync::pool", "reaped {} worker threads", joined);
    }

    /// Worker slots in the pool
    pub fn thread_count(&self) -> usize {
        self.shared.slots.len()
    }

    /// Workers currently attached to their slot
    pub fn live_threads(&self) -> usize {
        self.shared.live_threads.get()
    }

    /// Workers waiting in the idle queue
    pub fn idle_threads(&self) -> usize {
        self.shared.idle.len()
    }

    pub fn cpu_cores(&self) -> usize {
        self.cpu_cores
    }

    pub fn worker_status(&self, index: usize) -> Option<WorkerStatus> {
        self.shared.slots.get(index).map(|slot| slot.status.load())
    }

    /// Jobs completed by worker `index`
    pub fn jobs_run(&self, index: usize) -> Option<usize> {
        self.shared.slots.get(index).map(|slot| slot.jobs_run.get())
    }

    pub fn is_stopping(&self) -> bool {
        self.shared.control.is_stopping()
    }

    pub fn is_reaped(&self) -> bool {
        self.shared.control.is_reaped()
    }

    /// Submissions that found no idle worker and had to wait
    pub fn backpressure_count(&self) -> usize {
        self.shared.backpressure.get()
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    fn acquire_idle(&self) -> PoolResult<usize> {
        let mut waited = false;
        loop {
            if self.shared.control.is_stopping() {
                return Err(PoolError::Stopped);
            }
            if let Some(index) = self.shared.idle.pop() {
                return Ok(index);
            }
            if !waited {
                waited = true;
                self.shared.backpressure.increment();
            }
            self.shared.parking.park(Some(self.shared.park_timeout));
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.reap_threads();
    }
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPool")
            .field("threads", &self.thread_count())
            .field("live", &self.live_threads())
            .field("idle", &self.idle_threads())
            .field("control", &self.shared.control.bits())
            .finish()
    }
}
