//! 8 batches of 16 threads with a 10 ms gap between batches; per-batch and
//! global tallies must both come out exact.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

const BATCHES: usize = 8;
const BATCH_SIZE: usize = 16;

static TOTAL: AtomicU32 = AtomicU32::new(0);
static PER_BATCH: [AtomicU32; BATCHES] = [const { AtomicU32::new(0) }; BATCHES];

fn pause(d: Duration) {
    let until = Instant::now() + d;
    while Instant::now() < until {
        std::hint::spin_loop();
    }
}

fn main() {
    let mut ids = Vec::with_capacity(BATCHES * BATCH_SIZE);
    for batch in 0..BATCHES {
        for _ in 0..BATCH_SIZE {
            let id = strand::spawn(move || {
                let mut sum = 0u64;
                for k in 0..10_000u64 {
                    sum = sum.wrapping_add(k);
                }
                std::hint::black_box(sum);
                PER_BATCH[batch].fetch_add(1, Ordering::Relaxed);
                TOTAL.fetch_add(1, Ordering::Relaxed);
                batch
            })
            .expect("spawn failed");
            ids.push(id);
        }
        pause(Duration::from_millis(10));
    }

    for id in ids {
        strand::join(id).unwrap();
    }

    for (batch, counter) in PER_BATCH.iter().enumerate() {
        assert_eq!(
            counter.load(Ordering::Relaxed),
            BATCH_SIZE as u32,
            "batch {} incomplete",
            batch
        );
    }
    assert_eq!(TOTAL.load(Ordering::Relaxed), (BATCHES * BATCH_SIZE) as u32);
    println!("spawn_batches: ok");
}
