//! Round-robin scheduler over the thread table.

use crate::table::{Runtime, Status};

/// Outcome of a scheduling pass. Callers act on it *outside* the runtime
/// borrow — process exit and context switches never happen while the
/// table is borrowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pick {
    /// This entry is now `Running` and `current` points at it. It may be
    /// the same thread that entered the scheduler, in which case no switch
    /// is needed.
    Run(usize),
    /// Every claimed entry is `Exited`: tear down and end the process.
    AllExited,
    /// No entry is `Ready`, at least one live entry exists, and the entry
    /// that entered the scheduler cannot be resumed. Nothing will ever run
    /// again.
    AllBlocked,
}

impl Runtime {
    /// Pick the next thread to run.
    ///
    /// Preconditions: preemption is masked and, if the current thread's
    /// execution is to survive, its context is already captured (or will
    /// be captured by the switch the caller performs with the result).
    ///
    /// Walks at most `total` entries starting after `current`; the first
    /// `Ready` one wins. With nothing ready, the prior current thread is
    /// resumed if it still can be — a preempted thread that is the only
    /// runnable one just keeps going.
    pub(crate) fn schedule(&mut self) -> Pick {
        let origin = self.current;
        let mut checked = 0;
        while checked < self.total {
            self.current = (self.current + 1) % self.total;
            checked += 1;
            if self.table[self.current].status == Status::Ready {
                self.table[self.current].status = Status::Running;
                return Pick::Run(self.current);
            }
        }

        if self.all_exited() {
            return Pick::AllExited;
        }

        self.current = origin;
        let status = self.table[origin].status;
        if status != Status::Exited && status != Status::Blocked {
            self.table[origin].status = Status::Running;
            return Pick::Run(origin);
        }
        Pick::AllBlocked
    }
}
