//! Thread lifecycle: spawn, identity, exit, join, the trampoline every
//! spawned thread starts in, lazy runtime bring-up, and teardown.
//!
//! Blocking paths all follow the same phasing: block SIGALRM, mutate the
//! table and pick a successor inside one runtime borrow, then perform the
//! context switch with the borrow already released. A parked thread wakes
//! up still masked and re-opens preemption on its own way out.

use std::collections::HashMap;

use crate::context::{self, Context};
use crate::error::{Error, Result};
use crate::rt_trace;
use crate::sched::Pick;
use crate::signal;
use crate::table::{with_rt, Runtime, Status, ThreadId, MAX_THREADS, STACK_SIZE};

/// Start a new thread running `f`, scheduled alongside its siblings.
///
/// The first call also brings the runtime up: the calling thread claims
/// table slot 0, the SIGALRM handler is installed, the interval timer is
/// armed, and teardown is registered as a process-exit hook.
///
/// The closure's return value is what a later [`join`] delivers, exactly
/// as if the thread had called [`exit`] with it.
///
/// Fails with [`Error::OutOfResources`] once `MAX_THREADS` identifiers
/// have been handed out; identifiers are never recycled.
pub fn spawn<F>(f: F) -> Result<ThreadId>
where
    F: FnOnce() -> usize + 'static,
{
    let prev = signal::block_preempt();
    let out = with_rt(|rt| {
        rt.ensure_init(prev);
        rt.claim_slot(Box::new(f))
    });
    signal::restore_mask(prev);
    out.map(ThreadId::from_raw)
}

/// Handle of the calling thread. The initial thread is 0.
pub fn current() -> ThreadId {
    let prev = signal::block_preempt();
    let id = with_rt(|rt| if rt.initialized { rt.table[rt.current].id } else { 0 });
    signal::restore_mask(prev);
    ThreadId::from_raw(id)
}

enum ExitPath {
    Resume(*const Context),
    LastOut,
    Stuck,
}

/// Terminate the calling thread, recording `code` for its joiner.
///
/// If a joiner is parked on this thread it becomes runnable again. When
/// the last thread exits, teardown runs and the process terminates with
/// status 0 — also the behavior when the initial thread is the only one
/// and calls `exit`. Never returns.
pub fn exit(code: usize) -> ! {
    signal::block_preempt();
    let path = with_rt(|rt| {
        let cur = rt.current;
        rt.table[cur].retval = code;
        rt.table[cur].status = Status::Exited;
        if let Some(joiner) = rt.table[cur].joined_by.take() {
            rt.table[joiner].status = Status::Ready;
            rt_trace!("tid={} exit wakes joiner tid={}", cur, joiner);
        }
        if rt.all_exited() {
            return ExitPath::LastOut;
        }
        match rt.schedule() {
            Pick::Run(next) => ExitPath::Resume(&rt.table[next].ctx as *const Context),
            Pick::AllExited => ExitPath::LastOut,
            Pick::AllBlocked => ExitPath::Stuck,
        }
    });
    match path {
        // The dying stack has nothing left to save.
        ExitPath::Resume(load) => unsafe { context::resume(load) },
        ExitPath::LastOut => {
            run_teardown();
            std::process::exit(0);
        }
        ExitPath::Stuck => deadlock_exit(),
    }
}

pub(crate) enum JoinStep {
    Fault(Error),
    Done(usize),
    Park(*mut Context, *const Context),
    Stuck,
}

/// Wait for `target` to exit and collect its return value.
///
/// Returns immediately — no context switch — when the target has already
/// exited. Either way the target's stack is freed and the handle is
/// finished: a second join reports [`Error::AlreadyJoined`].
pub fn join(target: ThreadId) -> Result<usize> {
    let prev = signal::block_preempt();
    let step = with_rt(|rt| rt.join_prepare(target.as_raw()));
    let out = match step {
        JoinStep::Fault(e) => Err(e),
        JoinStep::Done(v) => Ok(v),
        JoinStep::Stuck => deadlock_exit(),
        JoinStep::Park(save, load) => {
            unsafe { context::switch(save, load) };
            // Back here means the target's exit path woke us.
            Ok(with_rt(|rt| rt.reap(target.as_raw())))
        }
    };
    signal::restore_mask(prev);
    out
}

/// First frame of every spawned thread. Entered through the bootstrap
/// context with SIGALRM still blocked by whichever thread switched here.
extern "C" fn trampoline() -> ! {
    let entry = with_rt(|rt| {
        let cur = rt.current;
        rt.table[cur].entry.take().expect("spawned thread has no entry")
    });
    signal::clear_mask();
    let code = entry();
    exit(code)
}

/// All live threads are blocked; nothing can ever run again. Diagnose and
/// leave — teardown runs from the exit hook.
pub(crate) fn deadlock_exit() -> ! {
    eprintln!("[strand] no runnable thread: every live thread is blocked");
    std::process::exit(1);
}

extern "C" fn teardown_hook() {
    run_teardown();
}

fn run_teardown() {
    signal::block_preempt();
    let probe = 0u8;
    let probe_addr = &probe as *const u8 as usize;
    with_rt(|rt| rt.teardown(probe_addr));
}

impl Runtime {
    /// One-shot bring-up, run under the mask on the first spawn.
    /// `pre_mask` is the process mask from before that spawn blocked
    /// SIGALRM; teardown restores it.
    pub(crate) fn ensure_init(&mut self, pre_mask: libc::sigset_t) {
        if self.initialized {
            return;
        }
        self.initialized = true;

        // The calling thread becomes thread 0 on the host process stack.
        let main = &mut self.table[0];
        main.id = 0;
        main.status = Status::Running;
        main.stack = None;
        main.entry = None;
        main.retval = 0;
        main.joined_by = None;
        main.reaped = false;
        self.total = 1;
        self.current = 0;

        self.sems.get_or_insert_with(HashMap::new);
        self.saved_mask = Some(pre_mask);
        self.saved_action = Some(signal::install_handler());
        unsafe {
            libc::atexit(teardown_hook);
        }
        signal::arm_timer();
        rt_trace!(
            "runtime up: {} ms tick, {} table slots",
            signal::TICK_INTERVAL_MS,
            MAX_THREADS
        );
    }

    /// Claim the next slot for a new thread. The stack is allocated before
    /// the slot is consumed, so a failed allocation leaves the table
    /// untouched.
    pub(crate) fn claim_slot(&mut self, entry: Box<dyn FnOnce() -> usize>) -> Result<usize> {
        if self.total >= MAX_THREADS {
            return Err(Error::OutOfResources);
        }
        let id = self.total;
        let mut stack = vec![0u8; STACK_SIZE].into_boxed_slice();
        let ctx = Context::for_entry(&mut stack, trampoline);

        let tcb = &mut self.table[id];
        tcb.id = id;
        tcb.stack = Some(stack);
        tcb.ctx = ctx;
        tcb.status = Status::Ready;
        tcb.entry = Some(entry);
        tcb.retval = 0;
        tcb.joined_by = None;
        tcb.reaped = false;
        self.total = id + 1;
        rt_trace!("spawn tid={}", id);
        Ok(id)
    }

    pub(crate) fn join_prepare(&mut self, target: usize) -> JoinStep {
        if target >= self.total {
            return JoinStep::Fault(Error::NoSuchThread);
        }
        if self.table[target].reaped {
            return JoinStep::Fault(Error::AlreadyJoined);
        }
        if target == self.current {
            return JoinStep::Fault(Error::JoinSelf);
        }
        if self.table[target].joined_by.is_some() {
            // joined_by holds exactly one waiter; first joiner wins.
            return JoinStep::Fault(Error::AlreadyJoined);
        }
        if self.table[target].status == Status::Exited {
            return JoinStep::Done(self.reap(target));
        }

        let cur = self.current;
        self.table[target].joined_by = Some(cur);
        self.table[cur].status = Status::Blocked;
        match self.schedule() {
            Pick::Run(next) => {
                let save: *mut Context = &mut self.table[cur].ctx;
                let load: *const Context = &self.table[next].ctx;
                JoinStep::Park(save, load)
            }
            Pick::AllExited | Pick::AllBlocked => JoinStep::Stuck,
        }
    }

    /// Deliver the return value and release the target's resources.
    pub(crate) fn reap(&mut self, target: usize) -> usize {
        let tcb = &mut self.table[target];
        tcb.stack = None;
        tcb.entry = None;
        tcb.joined_by = None;
        tcb.reaped = true;
        rt_trace!("tid={} reaped", target);
        tcb.retval
    }

    /// Idempotent shutdown: disarm the timer, restore the pre-init signal
    /// state, release every stack and semaphore record, and reset the
    /// table. Registered through `atexit`, so it also runs on abnormal
    /// process exits and when no thread beyond the initial one was ever
    /// created.
    pub(crate) fn teardown(&mut self, probe_addr: usize) {
        if !self.initialized {
            return;
        }
        signal::disarm_timer();
        if let Some(old) = self.saved_action.take() {
            signal::restore_handler(&old);
        }

        let mut leaked = 0usize;
        for tcb in self.table[..self.total].iter_mut() {
            if let Some(stack) = tcb.stack.take() {
                let base = stack.as_ptr() as usize;
                if (base..base + stack.len()).contains(&probe_addr) {
                    // Teardown itself is running on this stack; leave it to
                    // the OS rather than free the frames underneath us.
                    Box::leak(stack);
                    leaked += 1;
                }
            }
            tcb.entry = None;
            tcb.joined_by = None;
            tcb.status = Status::Exited;
        }
        self.sems = None;
        self.total = 0;
        self.current = 0;
        self.initialized = false;
        rt_trace!("teardown done ({} stack(s) left to the OS)", leaked);

        if let Some(mask) = self.saved_mask.take() {
            signal::restore_mask(mask);
        }
    }
}
