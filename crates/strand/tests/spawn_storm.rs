//! 128 threads created in one burst, each bumping a shared counter. Main
//! leaves through `exit`, so the process terminates on the all-exited path
//! once the last worker is done.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

const THREADS: u32 = 128;

static COMPLETED: AtomicU32 = AtomicU32::new(0);

fn main() {
    for i in 0..THREADS {
        let spawned = strand::spawn(move || {
            let mut sum = 0u64;
            for k in 0..1_000u64 {
                sum = sum.wrapping_add(k);
            }
            std::hint::black_box(sum);
            COMPLETED.fetch_add(1, Ordering::Relaxed);
            i as usize
        });
        assert!(spawned.is_ok(), "spawn {} failed", i);
    }

    // A sentinel checks the tally before the process is allowed to die.
    strand::spawn(|| {
        let deadline = Instant::now() + Duration::from_secs(10);
        while COMPLETED.load(Ordering::Relaxed) < THREADS {
            if Instant::now() > deadline {
                eprintln!(
                    "spawn_storm: only {}/{} workers completed",
                    COMPLETED.load(Ordering::Relaxed),
                    THREADS
                );
                std::process::exit(1);
            }
            std::hint::spin_loop();
        }
        println!("spawn_storm: ok");
        0
    })
    .unwrap();

    strand::exit(0);
}
