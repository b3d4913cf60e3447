//! Posting releases waiters strictly first-in-first-out: four threads park
//! in a known order and must resume in that same order.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use strand::sema;

const WAITERS: usize = 4;

static ARRIVED: AtomicUsize = AtomicUsize::new(0);
static RESUMED: AtomicUsize = AtomicUsize::new(0);
static ORDER: [AtomicUsize; WAITERS] = [const { AtomicUsize::new(usize::MAX) }; WAITERS];

fn pause(d: Duration) {
    let until = Instant::now() + d;
    while Instant::now() < until {
        std::hint::spin_loop();
    }
}

fn main() {
    let gate = sema::create(0).unwrap();

    let mut ids = Vec::with_capacity(WAITERS);
    for k in 0..WAITERS {
        let id = strand::spawn(move || {
            ARRIVED.fetch_add(1, Ordering::Relaxed);
            sema::wait(gate).unwrap();
            let slot = RESUMED.fetch_add(1, Ordering::Relaxed);
            ORDER[slot].store(k, Ordering::Relaxed);
            0
        })
        .unwrap();
        ids.push(id);
        // Three full ticks: thread k is parked before k+1 even exists.
        pause(Duration::from_millis(150));
    }
    assert_eq!(ARRIVED.load(Ordering::Relaxed), WAITERS);

    for _ in 0..WAITERS {
        sema::post(gate).unwrap();
    }

    for id in ids {
        strand::join(id).unwrap();
    }

    for (slot, tag) in ORDER.iter().enumerate() {
        assert_eq!(tag.load(Ordering::Relaxed), slot, "resume order broken");
    }
    sema::destroy(gate).unwrap();
    println!("sema_fifo: ok");
}
