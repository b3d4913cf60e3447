//! Preemptive user-space threads on a single OS thread.
//!
//! `strand` multiplexes many threads of execution over the one OS thread
//! that first calls [`spawn`]. A SIGALRM interval timer slices time every
//! 50 ms; its handler saves the interrupted thread's registers and
//! round-robins to the next runnable one. A thread finishes with a
//! pointer-sized value that [`join`] later delivers, and counting
//! semaphores with FIFO wakeup cover mutual exclusion and signalling.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  user code                                                  │
//! │     spawn / current / exit / join          sema::*          │
//! └─────────────────────────────────────────────────────────────┘
//!                │                                │
//!                ▼                                ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  runtime table: [Tcb; 150]                                  │
//! │    status machine READY / RUNNING / BLOCKED / EXITED        │
//! │    round-robin scheduler over READY entries                 │◀── SIGALRM
//! └─────────────────────────────────────────────────────────────┘     tick
//!                │
//!                ▼
//!        context::switch / context::resume
//!        (callee-saved registers + rsp, naked asm)
//! ```
//!
//! # Discipline
//!
//! - All runtime state lives in one global cell. Every access blocks
//!   SIGALRM first; the tick handler is the only other entrant, and the
//!   mask is the only thing keeping it out. Borrows of the cell are never
//!   nested and never held across a context switch.
//! - Every context switch happens with SIGALRM blocked. Whoever wakes up —
//!   the tick handler, a resumed `join`/`wait`, a fresh thread in its
//!   trampoline — re-opens preemption itself.
//! - The whole API must be driven from the OS thread that first called
//!   [`spawn`]. The runtime never creates OS threads and must not be
//!   entered from a second one.
//!
//! A thread that exits unjoined keeps its stack until a later [`join`] or
//! process teardown reclaims it. When the last thread exits the process
//! terminates with status 0. If every live thread is blocked (a semaphore
//! deadlock or a join cycle), the runtime prints a diagnostic and exits
//! with status 1; see DESIGN.md for the policy notes.
//!
//! # Example
//!
//! ```no_run
//! let worker = strand::spawn(|| {
//!     // runs interleaved with the spawning thread
//!     7
//! })
//! .unwrap();
//! assert_eq!(strand::join(worker).unwrap(), 7);
//! ```

#[cfg(not(all(target_os = "linux", target_arch = "x86_64")))]
compile_error!("strand only supports x86_64 Linux");

mod context;
mod error;
mod sched;
mod signal;
mod table;
mod thread;

pub mod sema;

pub use error::{Error, Result};
pub use signal::TICK_INTERVAL_MS;
pub use table::{ThreadId, MAX_THREADS, STACK_SIZE};
pub use thread::{current, exit, join, spawn};

/// True when `STRAND_DEBUG=1` is set; gates all trace output.
pub(crate) fn debug_enabled() -> bool {
    use std::sync::OnceLock;
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| std::env::var("STRAND_DEBUG").map_or(false, |v| v == "1"))
}

macro_rules! rt_trace {
    ($($arg:tt)*) => {
        if $crate::debug_enabled() {
            eprintln!("[strand] {}", format!($($arg)*));
        }
    };
}
pub(crate) use rt_trace;
