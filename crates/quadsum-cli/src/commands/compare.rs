//! Compare command implementation.
//!
//! Times the selected engines over uniformly random points in the unit square
//! and prints per-run averages of the measured builds.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use quadsum_core::{
    BoundingBox, Engine, Point, PyramidCell, PyramidReducer, QuadtreeBuilder, Repetition,
    RunOutput, TimingEvent, TimingSummary, WorkerPool,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::info;

use crate::config::Config;
use crate::span::Span;

/// Output format for comparison results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Sections for a single configuration, tab-separated rows for a sweep.
    Table,
    /// One JSON object per configuration.
    Json,
}

#[derive(Args, Debug)]
pub struct CompareArgs {
    /// Tree depth: N or START:END[:STEP].
    #[arg(short, long)]
    pub depth: Span,

    /// Number of points: N or START:END[:STEP].
    #[arg(short = 'n', long)]
    pub points: Span,

    /// Run the pyramid reducer.
    #[arg(short, long)]
    pub pyramid: bool,

    /// Run the quadtree builder.
    #[arg(short, long)]
    pub quadtree: bool,

    /// Builds per configuration, warm-up included [default: 10].
    #[arg(short, long)]
    pub iterations: Option<usize>,

    /// Leading builds left out of the timings [default: 3].
    #[arg(short, long)]
    pub warmup: Option<usize>,

    /// Worker threads, 0 for one per core.
    #[arg(long)]
    pub threads: Option<usize>,

    /// Seed for the random points.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

impl CompareArgs {
    fn validate(&self) -> Result<()> {
        if !self.pyramid && !self.quadtree {
            bail!("Select at least one engine with -p/--pyramid or -q/--quadtree");
        }
        if self.depth.is_range() && self.points.is_range() {
            bail!("Only one of --depth and --points can be a range");
        }
        Ok(())
    }

    /// Flags take precedence over the file and environment.
    fn apply(&self, mut config: Config) -> Config {
        if let Some(iterations) = self.iterations {
            config.iterations = iterations;
        }
        if let Some(warmup) = self.warmup {
            config.warmup = warmup;
        }
        if let Some(threads) = self.threads {
            config.engine.threads = threads;
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        config
    }

    fn is_sweep(&self) -> bool {
        self.depth.is_range() || self.points.is_range()
    }
}

/// Run the comparison and print the results.
pub fn execute(config: Config, args: &CompareArgs, verbose: bool) -> Result<()> {
    args.validate()?;
    let config = args.apply(config);
    let repetition = config.repetition()?;
    let pool = WorkerPool::from_config(&config.engine).context("Failed to start worker pool")?;

    info!(
        threads = pool.threads(),
        iterations = repetition.iterations,
        warmup = repetition.warmup,
        "Comparing engines"
    );

    let mut runner = Runner {
        pyramid: args
            .pyramid
            .then(|| PyramidReducer::with_pool(Arc::clone(&pool))),
        quadtree: args
            .quadtree
            .then(|| QuadtreeBuilder::with_pool(Arc::clone(&pool), config.engine.clone())),
        repetition,
        rng: match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        },
    };

    let sweep = args.is_sweep();
    if sweep && args.format == OutputFormat::Table {
        println!("{}", sweep_header(args.pyramid, args.quadtree));
    }

    for depth in args.depth.values() {
        for count in args.points.values() {
            let record = runner.run(depth, count)?;
            match args.format {
                OutputFormat::Json => println!("{}", serde_json::to_string(&record)?),
                OutputFormat::Table if sweep => println!("{}", record.row()),
                OutputFormat::Table => record.print_sample(verbose),
            }
        }
    }

    Ok(())
}

struct Runner {
    pyramid: Option<PyramidReducer>,
    quadtree: Option<QuadtreeBuilder>,
    repetition: Repetition,
    rng: StdRng,
}

impl Runner {
    /// Build every selected engine over one fresh point set.
    fn run(&mut self, depth: usize, count: usize) -> Result<Record> {
        let depth = u32::try_from(depth).with_context(|| format!("Depth {depth} is too large"))?;
        let points = random_points(&mut self.rng, count);
        let bbox = BoundingBox::unit();
        let repetition = self.repetition;

        let pyramid = match &self.pyramid {
            Some(engine) => {
                let run = engine
                    .run_repeated(depth, bbox, &points, repetition)
                    .with_context(|| format!("Pyramid failed at depth {depth} with {count} points"))?;
                let root = *run.output.root();
                Some(EngineReport::new(&run, root, None))
            }
            None => None,
        };

        let quadtree = match &self.quadtree {
            Some(engine) => {
                let run = engine
                    .run_repeated(depth, bbox, &points, repetition)
                    .with_context(|| format!("Quadtree failed at depth {depth} with {count} points"))?;
                let root = run.output.root().value();
                let nodes = (run.output.used_count(), run.output.capacity());
                Some(EngineReport::new(&run, root, Some(nodes)))
            }
            None => None,
        };

        Ok(Record {
            depth,
            points: count,
            pyramid,
            quadtree,
        })
    }
}

/// `count` points with every component uniform in `[0, 1)`.
fn random_points(rng: &mut StdRng, count: usize) -> Vec<Point> {
    (0..count)
        .map(|_| Point::new(rng.random(), rng.random(), rng.random()))
        .collect()
}

/// Results of one configuration.
#[derive(Debug, Serialize)]
struct Record {
    depth: u32,
    points: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pyramid: Option<EngineReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    quadtree: Option<EngineReport>,
}

impl Record {
    fn row(&self) -> String {
        let mut row = format!("{}\t{}", self.depth, self.points);
        for report in [&self.pyramid, &self.quadtree].into_iter().flatten() {
            row.push_str(&format!(
                "\t{}\t{}",
                format_millis(report.summary.net),
                format_millis(report.summary.total)
            ));
        }
        row
    }

    fn print_sample(&self, verbose: bool) {
        if let Some(report) = &self.pyramid {
            report.print_section("Pyramid", "P", verbose);
        }
        if self.pyramid.is_some() && self.quadtree.is_some() {
            println!();
        }
        if let Some(report) = &self.quadtree {
            report.print_section("Quadtree", "Q", verbose);
        }
    }
}

/// Per-run timings of one engine and the root of its last build.
#[derive(Debug, Serialize)]
struct EngineReport {
    net_ms: f64,
    total_ms: f64,
    root: PyramidCell,
    #[serde(skip_serializing_if = "Option::is_none")]
    nodes_used: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    node_capacity: Option<usize>,
    #[serde(skip)]
    summary: TimingSummary,
    #[serde(skip)]
    events: Vec<TimingEvent>,
}

impl EngineReport {
    fn new<T>(run: &RunOutput<T>, root: PyramidCell, nodes: Option<(usize, usize)>) -> Self {
        let summary = run.summary();
        Self {
            net_ms: summary.net.as_secs_f64() * 1e3,
            total_ms: summary.total.as_secs_f64() * 1e3,
            root,
            nodes_used: nodes.map(|(used, _)| used),
            node_capacity: nodes.map(|(_, capacity)| capacity),
            summary,
            events: run.events.clone(),
        }
    }

    fn print_section(&self, title: &str, tag: &str, verbose: bool) {
        println!("## {title}");
        if verbose {
            print_events(&self.events);
        }
        println!("{tag} spent net:   {} ms", format_millis(self.summary.net));
        println!("{tag} spent total: {} ms", format_millis(self.summary.total));
        if let (Some(used), Some(capacity)) = (self.nodes_used, self.node_capacity) {
            println!("{tag} nodes used:  {used} / {capacity}");
        }
    }
}

/// Event table with offsets relative to the first event's queue time.
fn print_events(events: &[TimingEvent]) {
    let Some(first) = events.first() else {
        return;
    };
    let base = first.queued;

    println!("~~~~~~~~~~~~   Phases   ~~~~~~~~~~~~");
    println!("Queued\tStart\tEnd\tDelta\tPhase");
    for event in events {
        println!(
            "{}\t{}\t{}\t{}\t{}",
            format_millis(event.queued.saturating_sub(base)),
            format_millis(event.start.saturating_sub(base)),
            format_millis(event.end.saturating_sub(base)),
            format_millis(event.duration()),
            event.phase
        );
    }
    println!("~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~");
}

fn sweep_header(pyramid: bool, quadtree: bool) -> String {
    let mut header = String::from("Depth\tPoints");
    if pyramid {
        header.push_str("\tP net\tP total");
    }
    if quadtree {
        header.push_str("\tQ net\tQ total");
    }
    header
}

/// Milliseconds with fewer decimals as the value grows.
pub fn format_millis(duration: Duration) -> String {
    let millis = duration.as_secs_f64() * 1e3;
    let precision = if millis < 1.0 {
        3
    } else if millis < 10.0 {
        2
    } else if millis < 100.0 {
        1
    } else {
        0
    };
    format!("{millis:.precision$}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_millis_precision() {
        assert_eq!(format_millis(Duration::from_micros(500)), "0.500");
        assert_eq!(format_millis(Duration::from_micros(5_250)), "5.25");
        assert_eq!(format_millis(Duration::from_micros(42_500)), "42.5");
        assert_eq!(format_millis(Duration::from_millis(1234)), "1234");
        assert_eq!(format_millis(Duration::ZERO), "0.000");
    }

    #[test]
    fn test_sweep_header() {
        assert_eq!(sweep_header(true, false), "Depth\tPoints\tP net\tP total");
        assert_eq!(
            sweep_header(true, true),
            "Depth\tPoints\tP net\tP total\tQ net\tQ total"
        );
    }

    #[test]
    fn test_random_points_in_unit_cube() {
        let mut rng = StdRng::seed_from_u64(1);
        let points = random_points(&mut rng, 1000);
        assert_eq!(points.len(), 1000);
        assert!(points
            .iter()
            .all(|p| [p.x, p.y, p.w].iter().all(|v| (0.0..1.0).contains(v))));
    }

    #[test]
    fn test_runner_reports_both_engines() {
        let pool = Arc::new(WorkerPool::new(2).unwrap());
        let mut runner = Runner {
            pyramid: Some(PyramidReducer::with_pool(Arc::clone(&pool))),
            quadtree: Some(QuadtreeBuilder::with_pool(pool, Default::default())),
            repetition: Repetition::new(3, 1).unwrap(),
            rng: StdRng::seed_from_u64(3),
        };

        let record = runner.run(4, 200).unwrap();
        let pyramid = record.pyramid.as_ref().unwrap();
        let quadtree = record.quadtree.as_ref().unwrap();
        assert_eq!(pyramid.root.count, 200);
        assert_eq!(quadtree.root.count, 200);
        assert_eq!(quadtree.node_capacity, Some(85));
        assert!(pyramid.nodes_used.is_none());
        assert_eq!(record.row().split('\t').count(), 6);
    }
}
