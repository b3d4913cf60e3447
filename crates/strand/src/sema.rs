//! Counting semaphores with FIFO wakeup.
//!
//! Handles are monotonically assigned and never recycled; the directory
//! holds at most [`MAX_SEMAPHORES`] live records. A `post` with waiters
//! parked hands the slot straight to the head of the queue without
//! touching the counter — the oldest waiter is always released first, and
//! it runs when the scheduler next reaches it; `post` itself never yields.

use std::collections::VecDeque;

use crate::context::{self, Context};
use crate::error::{Error, Result};
use crate::rt_trace;
use crate::sched::Pick;
use crate::signal;
use crate::table::{with_rt, Runtime, Status};
use crate::thread::deadlock_exit;

/// Upper bound on a semaphore's counter.
pub const SEM_MAX_VALUE: u32 = 65_535;

/// Upper bound on simultaneously live semaphores.
pub const MAX_SEMAPHORES: usize = 128;

/// Handle naming one live semaphore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SemId(u64);

impl SemId {
    pub fn as_raw(self) -> u64 {
        self.0
    }
}

pub(crate) struct Semaphore {
    pub(crate) value: u32,
    /// Thread indices parked in `wait`, oldest first.
    pub(crate) waiters: VecDeque<usize>,
}

pub(crate) enum WaitStep {
    Fault(Error),
    Done,
    Park(*mut Context, *const Context),
    Stuck,
}

/// Create a semaphore with the given initial value.
///
/// Rejects `initial >= SEM_MAX_VALUE` with [`Error::InvalidArgument`] and
/// a full directory with [`Error::OutOfResources`].
pub fn create(initial: u32) -> Result<SemId> {
    let prev = signal::block_preempt();
    let out = with_rt(|rt| rt.sem_create(initial));
    signal::restore_mask(prev);
    out
}

/// Drop a semaphore's record.
///
/// Threads still parked in `wait` on it stay blocked; nothing will ever
/// release them, and the all-blocked policy applies if nothing else can
/// run. A trace line records how many were abandoned.
pub fn destroy(id: SemId) -> Result<()> {
    let prev = signal::block_preempt();
    let out = with_rt(|rt| rt.sem_destroy(id.0));
    signal::restore_mask(prev);
    out
}

/// Decrement the counter, parking the calling thread at the back of the
/// waiter queue until a `post` releases it when the counter is zero.
pub fn wait(id: SemId) -> Result<()> {
    let prev = signal::block_preempt();
    let step = with_rt(|rt| rt.sem_wait_prepare(id.0));
    let out = match step {
        WaitStep::Fault(e) => Err(e),
        WaitStep::Done => Ok(()),
        WaitStep::Stuck => deadlock_exit(),
        WaitStep::Park(save, load) => {
            unsafe { context::switch(save, load) };
            // A post handed this thread the slot; the counter was never
            // incremented on its behalf.
            Ok(())
        }
    };
    signal::restore_mask(prev);
    out
}

/// Release one waiter, or increment the counter when nobody is parked.
///
/// Fails with [`Error::ValueOverflow`] when the counter already sits at
/// [`SEM_MAX_VALUE`] and there is no waiter to hand the slot to.
pub fn post(id: SemId) -> Result<()> {
    let prev = signal::block_preempt();
    let out = with_rt(|rt| rt.sem_post(id.0));
    signal::restore_mask(prev);
    out
}

impl Runtime {
    pub(crate) fn sem_create(&mut self, initial: u32) -> Result<SemId> {
        if initial >= SEM_MAX_VALUE {
            return Err(Error::InvalidArgument);
        }
        if self.sems_map().len() >= MAX_SEMAPHORES {
            return Err(Error::OutOfResources);
        }
        let id = self.next_sem_id;
        self.next_sem_id += 1;
        self.sems_map().insert(
            id,
            Semaphore { value: initial, waiters: VecDeque::new() },
        );
        rt_trace!("sem {} created (initial {})", id, initial);
        Ok(SemId(id))
    }

    pub(crate) fn sem_destroy(&mut self, id: u64) -> Result<()> {
        match self.sems_map().remove(&id) {
            Some(sem) => {
                if !sem.waiters.is_empty() {
                    rt_trace!(
                        "sem {} destroyed with {} waiter(s) still parked",
                        id,
                        sem.waiters.len()
                    );
                }
                Ok(())
            }
            None => Err(Error::NoSuchSemaphore),
        }
    }

    pub(crate) fn sem_wait_prepare(&mut self, id: u64) -> WaitStep {
        let cur = self.current;
        {
            let Some(sem) = self.sems_map().get_mut(&id) else {
                return WaitStep::Fault(Error::NoSuchSemaphore);
            };
            if sem.value > 0 {
                sem.value -= 1;
                return WaitStep::Done;
            }
            sem.waiters.push_back(cur);
        }
        self.table[cur].status = Status::Blocked;
        match self.schedule() {
            Pick::Run(next) => {
                let save: *mut Context = &mut self.table[cur].ctx;
                let load: *const Context = &self.table[next].ctx;
                WaitStep::Park(save, load)
            }
            Pick::AllExited | Pick::AllBlocked => WaitStep::Stuck,
        }
    }

    pub(crate) fn sem_post(&mut self, id: u64) -> Result<()> {
        let released = {
            let Some(sem) = self.sems_map().get_mut(&id) else {
                return Err(Error::NoSuchSemaphore);
            };
            match sem.waiters.pop_front() {
                Some(head) => Some(head),
                None => {
                    if sem.value >= SEM_MAX_VALUE {
                        return Err(Error::ValueOverflow);
                    }
                    sem.value += 1;
                    None
                }
            }
        };
        if let Some(head) = released {
            self.table[head].status = Status::Ready;
            rt_trace!("sem {} hands off to tid={}", id, head);
        }
        Ok(())
    }
}
