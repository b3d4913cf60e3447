//! Thread control blocks, the fixed-capacity thread table, and the global
//! runtime cell.

use std::cell::UnsafeCell;
use std::collections::HashMap;
use std::fmt;

use crate::context::Context;
use crate::sema::Semaphore;

/// Capacity of the thread table. Identifiers are table indices and are
/// never recycled, so this also bounds the number of threads a process can
/// ever create.
pub const MAX_THREADS: usize = 150;

/// Size of each spawned thread's stack. The initial thread keeps the host
/// process stack and owns none.
pub const STACK_SIZE: usize = 32 * 1024;

/// Where a thread is in its lifecycle. Exactly one entry is `Running`
/// whenever user code executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Status {
    Ready,
    Running,
    Blocked,
    Exited,
}

/// Handle naming one thread for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(usize);

impl ThreadId {
    /// Rebuild a handle from its raw value. Useful for passing handles
    /// through pointer-sized channels; a raw value that no `spawn` ever
    /// returned simply fails the next operation with `NoSuchThread`.
    pub fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    pub fn as_raw(self) -> usize {
        self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One thread's bookkeeping record.
pub(crate) struct Tcb {
    pub(crate) id: usize,
    /// Owned stack region; `None` for the initial thread and for unclaimed
    /// or reaped slots.
    pub(crate) stack: Option<Box<[u8]>>,
    pub(crate) ctx: Context,
    pub(crate) status: Status,
    /// The start closure, taken exactly once by the trampoline.
    pub(crate) entry: Option<Box<dyn FnOnce() -> usize>>,
    pub(crate) retval: usize,
    /// Thread parked in `join` on this one, if any.
    pub(crate) joined_by: Option<usize>,
    /// Set once a join has delivered the return value; a second join on
    /// the same handle is rejected.
    pub(crate) reaped: bool,
}

impl Tcb {
    // Unclaimed slots sit inert as Exited; the scheduler never walks past
    // `total`, and claiming a slot rewrites every field.
    pub(crate) const fn new() -> Self {
        Self {
            id: 0,
            stack: None,
            ctx: Context::new(),
            status: Status::Exited,
            entry: None,
            retval: 0,
            joined_by: None,
            reaped: false,
        }
    }
}

/// The whole runtime: thread table, scheduler scalars, semaphore
/// directory, and the signal state saved for teardown.
pub(crate) struct Runtime {
    pub(crate) table: [Tcb; MAX_THREADS],
    /// Claimed slots; also the next identifier to hand out.
    pub(crate) total: usize,
    /// Index of the `Running` entry (transiently stale inside the
    /// scheduler itself).
    pub(crate) current: usize,
    pub(crate) initialized: bool,
    /// Live semaphores by handle. Created on first use so semaphores work
    /// before the first spawn.
    pub(crate) sems: Option<HashMap<u64, Semaphore>>,
    pub(crate) next_sem_id: u64,
    /// SIGALRM disposition and process mask from before init, restored by
    /// teardown.
    pub(crate) saved_action: Option<libc::sigaction>,
    pub(crate) saved_mask: Option<libc::sigset_t>,
}

impl Runtime {
    pub(crate) const fn new() -> Self {
        Self {
            table: [const { Tcb::new() }; MAX_THREADS],
            total: 0,
            current: 0,
            initialized: false,
            sems: None,
            next_sem_id: 1,
            saved_action: None,
            saved_mask: None,
        }
    }

    pub(crate) fn all_exited(&self) -> bool {
        self.table[..self.total].iter().all(|t| t.status == Status::Exited)
    }

    pub(crate) fn sems_map(&mut self) -> &mut HashMap<u64, Semaphore> {
        self.sems.get_or_insert_with(HashMap::new)
    }
}

struct RtCell(UnsafeCell<Runtime>);

// One OS thread by contract; the signal mask is what serializes access
// against the tick handler.
unsafe impl Sync for RtCell {}

static RT: RtCell = RtCell(UnsafeCell::new(Runtime::new()));

/// Access the global runtime.
///
/// The caller must hold SIGALRM blocked for the whole closure, and borrows
/// must never nest: the tick handler takes this same borrow, and the mask
/// is the only thing keeping it out. Never hold the borrow across a
/// context switch — extract raw pointers inside, switch outside.
pub(crate) fn with_rt<R>(f: impl FnOnce(&mut Runtime) -> R) -> R {
    unsafe { f(&mut *RT.0.get()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_runtime_is_empty() {
        let rt = Runtime::new();
        assert_eq!(rt.total, 0);
        assert!(!rt.initialized);
        assert!(rt.all_exited());
    }

    #[test]
    fn unclaimed_slots_are_inert() {
        let rt = Runtime::new();
        let slot = &rt.table[MAX_THREADS - 1];
        assert_eq!(slot.status, Status::Exited);
        assert!(slot.stack.is_none());
        assert!(slot.entry.is_none());
        assert!(!slot.reaped);
    }

    #[test]
    fn thread_id_round_trips() {
        let id = ThreadId::from_raw(17);
        assert_eq!(id.as_raw(), 17);
        assert_eq!(format!("{id}"), "17");
    }
}
