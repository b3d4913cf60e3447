//! Execution-context primitive: snapshot the running thread's registers
//! and resume another snapshot, possibly on a different stack.
//!
//! A [`Context`] holds the System V x86-64 callee-saved register file plus
//! the stack pointer. The program counter is not stored explicitly: it is
//! the return address sitting on the saved stack, so the `ret` at the end
//! of [`switch`] / [`resume`] is what transfers control. A freshly
//! bootstrapped context ([`Context::for_entry`]) parks `rsp` on a
//! 16-byte-aligned slot that holds the entry routine's address, so the
//! first activation "returns" straight into it with the stack aligned the
//! way the ABI expects at function entry.
//!
//! Caller-saved registers need no saving here: voluntary switches happen at
//! ordinary call boundaries where they are already dead, and preemptive
//! switches happen inside the signal handler, whose kernel-built signal
//! frame restores the full interrupted register file on the way back out.
//!
//! The buffer format is owned by this crate, so none of the glibc jmp_buf
//! pointer-mangling applies.

use std::arch::naked_asm;

/// Saved register state of a suspended thread.
///
/// Field order is load-bearing: the naked routines below address the
/// fields by fixed byte offsets.
#[repr(C)]
#[derive(Debug, Clone)]
pub(crate) struct Context {
    rsp: u64, // 0x00
    rbp: u64, // 0x08
    rbx: u64, // 0x10
    r12: u64, // 0x18
    r13: u64, // 0x20
    r14: u64, // 0x28
    r15: u64, // 0x30
}

impl Context {
    pub(crate) const fn new() -> Self {
        Self { rsp: 0, rbp: 0, rbx: 0, r12: 0, r13: 0, r14: 0, r15: 0 }
    }

    /// Build a context whose first activation enters `entry` on `stack`.
    ///
    /// The top of the stack is laid out as
    ///
    /// ```text
    ///   top-16 → address of `entry`      ← rsp parks here
    ///   top-8  → address of the backstop
    /// ```
    ///
    /// with `top` aligned down to 16. The `ret` in `switch`/`resume` pops
    /// the entry address, leaving `rsp ≡ 8 (mod 16)` — the ABI state at
    /// any function entry. The backstop traps if `entry` ever returns;
    /// there is no caller frame above it.
    pub(crate) fn for_entry(stack: &mut [u8], entry: extern "C" fn() -> !) -> Self {
        let mut ctx = Context::new();
        unsafe {
            let top = stack.as_mut_ptr().add(stack.len());
            let top = ((top as usize) & !15) as *mut u8;
            std::ptr::write(top.sub(8) as *mut u64, stack_backstop as usize as u64);
            std::ptr::write(top.sub(16) as *mut u64, entry as usize as u64);
            ctx.rsp = top.sub(16) as u64;
            ctx.rbp = top as u64;
        }
        ctx
    }
}

/// Save the current register state into `save` and load `load`.
///
/// Control comes back out of this call when some other thread later
/// switches to (or resumes) `save`.
///
/// # Safety
///
/// Both pointers must be valid for the respective access, `load` must hold
/// either a previously saved context or one built by [`Context::for_entry`]
/// over a live stack, and preemption must be masked around the call.
#[unsafe(naked)]
pub(crate) unsafe extern "C" fn switch(_save: *mut Context, _load: *const Context) {
    naked_asm!(
        "mov [rdi + 0x00], rsp",
        "mov [rdi + 0x08], rbp",
        "mov [rdi + 0x10], rbx",
        "mov [rdi + 0x18], r12",
        "mov [rdi + 0x20], r13",
        "mov [rdi + 0x28], r14",
        "mov [rdi + 0x30], r15",
        "mov rsp, [rsi + 0x00]",
        "mov rbp, [rsi + 0x08]",
        "mov rbx, [rsi + 0x10]",
        "mov r12, [rsi + 0x18]",
        "mov r13, [rsi + 0x20]",
        "mov r14, [rsi + 0x28]",
        "mov r15, [rsi + 0x30]",
        "ret",
    );
}

/// Load `load` without saving anything. For paths with no execution left
/// to preserve — thread exit, and nothing else.
///
/// # Safety
///
/// Same requirements on `load` as [`switch`].
#[unsafe(naked)]
pub(crate) unsafe extern "C" fn resume(_load: *const Context) -> ! {
    naked_asm!(
        "mov rsp, [rdi + 0x00]",
        "mov rbp, [rdi + 0x08]",
        "mov rbx, [rdi + 0x10]",
        "mov r12, [rdi + 0x18]",
        "mov r13, [rdi + 0x20]",
        "mov r14, [rdi + 0x28]",
        "mov r15, [rdi + 0x30]",
        "ret",
    );
}

/// Sits above the entry slot on every bootstrapped stack. Entry routines
/// never return, so reaching this is a runtime bug; trap rather than walk
/// off the stack.
#[unsafe(naked)]
extern "C" fn stack_backstop() -> ! {
    naked_asm!("ud2");
}
