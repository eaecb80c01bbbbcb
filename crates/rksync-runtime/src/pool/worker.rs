//! Worker thread body
//!
//! Each worker sleeps on its slot's condition until a job is installed or
//! the pool stops. Between jobs it puts itself back on the idle queue and
//! wakes one parked submitter.

use rksync_core::WorkerStatus::*;
use std::sync::Arc;

use super::PoolShared;

pub(crate) fn run(shared: Arc<PoolShared>, index: usize) {
    let slot = &shared.slots[index];

    {
        let cell = slot.cell.lock();
        shared.advance(index, Starting, Sleeping);
        shared.live_threads.increment();
        shared.push_idle(index);
        cell.notify_all();
    }
    shared.parking.wake_one();

    loop {
        let job = {
            let mut cell = slot.cell.lock();
            cell.wait_while(|job| job.is_none() && !shared.control.is_stopping());
            match cell.take() {
                Some(job) => {
                    shared.advance(index, WakeRequested, Awake);
                    job
                }
                None => break,
            }
        };

        shared.advance(index, Awake, RunningJob);
        job.run(index, &slot.jobs_run);

        {
            let _cell = slot.cell.lock();
            shared.advance(index, RunningJob, Sleeping);
            shared.push_idle(index);
        }
        shared.parking.wake_one();
    }

    let cell = slot.cell.lock();
    shared.advance(index, Sleeping, NotRunning);
    shared.live_threads.decrement();
    cell.notify_all();
    drop(cell);

    if shared.debug_logging {
        log::debug!(
            target: "rksync::pool",
            "worker {} exiting after {} jobs",
            index,
            slot.jobs_run.get()
        );
    }
}
