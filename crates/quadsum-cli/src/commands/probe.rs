//! Probe command implementation.
//!
//! Measures the two costs that dominate the engines on small inputs: how long
//! an empty dispatch takes to reach a worker and come back, and how fast
//! workers can apply float atomic adds.

use std::hint::black_box;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Args;
use quadsum_core::{AtomicF32, Phase, Timeline, WorkerPool};
use rayon::prelude::*;

use crate::config::Config;

/// Atomic adds per worker in the throughput measurement. Small enough that a
/// running sum of ones stays exact in `f32`.
const ADDS_PER_WORKER: usize = 1 << 22;

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Worker threads, 0 for one per core.
    #[arg(long)]
    pub threads: Option<usize>,

    /// Empty dispatches to average the latency over.
    #[arg(long, default_value_t = 1000)]
    pub samples: usize,
}

/// Latency and throughput figures of one pool.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeReport {
    pub threads: usize,
    /// Mean time from queueing a dispatch to a worker starting it.
    pub latency: Duration,
    /// Mean time of a complete empty dispatch.
    pub round_trip: Duration,
    /// Adds per second, each worker on its own value.
    pub private_add_rate: f64,
    /// Adds per second, all workers on one shared value.
    pub shared_add_rate: f64,
}

pub fn execute(mut config: Config, args: &ProbeArgs) -> Result<()> {
    let samples = match u32::try_from(args.samples) {
        Ok(samples) if samples > 0 => samples,
        _ => bail!("--samples must be between 1 and {}", u32::MAX),
    };
    if let Some(threads) = args.threads {
        config.engine.threads = threads;
    }

    let pool = WorkerPool::from_config(&config.engine).context("Failed to start worker pool")?;
    let report = probe(&pool, samples);

    println!("Worker threads:   {}", report.threads);
    println!("Dispatch latency: {:.3} us", micros(report.latency));
    println!("Empty dispatch:   {:.3} us", micros(report.round_trip));
    println!("~~~");
    println!("f32 atomic add (private): {:.3} GOps/s", report.private_add_rate / 1e9);
    println!("f32 atomic add (shared):  {:.3} GOps/s", report.shared_add_rate / 1e9);

    Ok(())
}

pub fn probe(pool: &WorkerPool, samples: u32) -> ProbeReport {
    let mut timeline = Timeline::new();
    for _ in 0..samples {
        pool.run_phase(&mut timeline, Phase::Clear, || ());
    }
    let events = timeline.events();
    let latency = events.iter().map(|e| e.latency()).sum::<Duration>() / samples;
    let round_trip =
        events.iter().map(|e| e.end.saturating_sub(e.queued)).sum::<Duration>() / samples;

    let threads = pool.threads();
    let total_adds = (ADDS_PER_WORKER * threads) as f64;

    let start = Instant::now();
    pool.install(|| {
        (0..threads).into_par_iter().for_each(|_| {
            let value = AtomicF32::zero();
            for _ in 0..ADDS_PER_WORKER {
                value.fetch_add(1.0, Ordering::Relaxed);
            }
            black_box(value.load(Ordering::Relaxed));
        });
    });
    let private_add_rate = total_adds / start.elapsed().as_secs_f64();

    let shared = AtomicF32::zero();
    let start = Instant::now();
    pool.install(|| {
        (0..threads).into_par_iter().for_each(|_| {
            for _ in 0..ADDS_PER_WORKER / threads.max(1) {
                shared.fetch_add(1.0, Ordering::Relaxed);
            }
        });
    });
    let shared_adds = (ADDS_PER_WORKER / threads.max(1) * threads) as f64;
    let shared_add_rate = shared_adds / start.elapsed().as_secs_f64();
    black_box(shared.load(Ordering::Relaxed));

    ProbeReport {
        threads,
        latency,
        round_trip,
        private_add_rate,
        shared_add_rate,
    }
}

fn micros(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1e6
}
