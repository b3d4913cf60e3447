//! Join delivers the exit value exactly once, and every join error case
//! returns without blocking.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

static SIDE_DONE: AtomicBool = AtomicBool::new(false);

fn pause(d: Duration) {
    let until = Instant::now() + d;
    while Instant::now() < until {
        std::hint::spin_loop();
    }
}

fn main() {
    // An opaque pointer travels from exit to join intact.
    let carrier = strand::spawn(|| Box::into_raw(Box::new(0x5eed_u64)) as usize).unwrap();
    let raw = strand::join(carrier).unwrap();
    let value = unsafe { *Box::from_raw(raw as *mut u64) };
    assert_eq!(value, 0x5eed);

    // A second join on the same handle is rejected.
    assert_eq!(strand::join(carrier), Err(strand::Error::AlreadyJoined));

    // Self-join is rejected.
    assert_eq!(strand::join(strand::current()), Err(strand::Error::JoinSelf));

    // Handles that no spawn ever returned are rejected.
    assert_eq!(
        strand::join(strand::ThreadId::from_raw(9_999)),
        Err(strand::Error::NoSuchThread)
    );

    // Joining a thread that already exited completes without a switch.
    let side = strand::spawn(|| {
        SIDE_DONE.store(true, Ordering::Relaxed);
        7
    })
    .unwrap();
    let deadline = Instant::now() + Duration::from_secs(10);
    while !SIDE_DONE.load(Ordering::Relaxed) {
        if Instant::now() > deadline {
            eprintln!("join_return: side thread never ran");
            std::process::exit(1);
        }
        std::hint::spin_loop();
    }
    pause(Duration::from_millis(120)); // let it reach its exit
    assert_eq!(strand::join(side).unwrap(), 7);

    // Joining a still-running thread parks the caller until its exit.
    let slow = strand::spawn(|| {
        pause(Duration::from_millis(120));
        42
    })
    .unwrap();
    assert_eq!(strand::join(slow).unwrap(), 42);

    println!("join_return: ok");
}
