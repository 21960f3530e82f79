//! Build both summaries of a random point cloud and print their timings.
//!
//! Run with: cargo run --example summarize

use quadsum_core::{
    BoundingBox, Engine, EngineConfig, Point, PyramidReducer, QuadtreeBuilder, Repetition,
    WorkerPool,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn main() -> quadsum_core::Result<()> {
    tracing_subscriber::fmt::init();

    let point_count = 100_000;
    let depth = 8;
    let bbox = BoundingBox::new(-500.0, -500.0, 500.0, 500.0);

    println!("Generating {point_count} points...");
    let mut rng = StdRng::seed_from_u64(42);
    let points: Vec<Point> = (0..point_count)
        .map(|_| {
            Point::new(
                rng.random_range(bbox.min_x..bbox.max_x),
                rng.random_range(bbox.min_y..bbox.max_y),
                rng.random::<f32>(),
            )
        })
        .collect();

    let config = EngineConfig::from_env()?;
    let pool = WorkerPool::from_config(&config)?;
    println!("Worker pool: {} threads", pool.threads());

    let pyramid = PyramidReducer::with_pool(pool.clone());
    let quadtree = QuadtreeBuilder::with_pool(pool, config);
    let repetition = Repetition::new(10, 3)?;

    let levels = pyramid.run_repeated(depth, bbox, &points, repetition)?;
    let summary = levels.summary();
    println!(
        "Pyramid:  net {:>8.3} ms  total {:>8.3} ms  root {:?}",
        summary.net.as_secs_f64() * 1e3,
        summary.total.as_secs_f64() * 1e3,
        levels.output.root().centroid(),
    );

    let tree = quadtree.run_repeated(depth, bbox, &points, repetition)?;
    let summary = tree.summary();
    println!(
        "Quadtree: net {:>8.3} ms  total {:>8.3} ms  nodes {} / {}",
        summary.net.as_secs_f64() * 1e3,
        summary.total.as_secs_f64() * 1e3,
        tree.output.used_count(),
        tree.output.capacity(),
    );

    Ok(())
}
