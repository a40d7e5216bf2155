//! Barrier rendezvous benchmark
//!
//! Measures rendezvous cost at shrinking party counts: each phase halves
//! the thread count, exercising the per-call expected-party contract.
//! Rank 0 of each phase times the run.
//!
//! Usage: `barrier_bench [max_parties] [rounds]`

use std::sync::Arc;
use std::thread;

use cluster_display::foundation::logging;
use cluster_display::foundation::time::Stopwatch;
use cluster_display::sync::Barrier;

/// Explicit per-phase configuration handed to every worker
#[derive(Debug, Clone, Copy)]
struct BenchConfig {
    parties: usize,
    rounds: u64,
}

fn run_phase(barrier: &Arc<Barrier>, config: BenchConfig) {
    let handles: Vec<_> = (0..config.parties)
        .map(|_| {
            let barrier = barrier.clone();
            thread::spawn(move || {
                let master = barrier.enter(config.parties).expect("rendezvous") == 0;
                let mut stopwatch = Stopwatch::start_new();

                for _ in 0..config.rounds {
                    barrier.enter(config.parties).expect("rendezvous");
                }

                stopwatch.stop();
                if master {
                    let per_round =
                        stopwatch.elapsed_millis() * 1000.0 / config.rounds as f64;
                    log::info!(
                        "{:3} threads, {:6} rounds, {:8.2} us/rendezvous",
                        config.parties,
                        config.rounds,
                        per_round
                    );
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("bench thread panicked");
    }
}

fn main() {
    logging::init_with_default("info");

    let mut args = std::env::args().skip(1);
    let max_parties: usize = args
        .next()
        .and_then(|a| a.parse().ok())
        .filter(|&p| p > 1)
        .unwrap_or(64);
    let rounds: u64 = args.next().and_then(|a| a.parse().ok()).unwrap_or(10_000);

    let barrier = Arc::new(Barrier::new());

    let mut parties = max_parties;
    while parties > 1 {
        run_phase(&barrier, BenchConfig { parties, rounds });
        parties >>= 1;
    }

    log::info!("benchmark finished");
}
