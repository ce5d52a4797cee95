use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand, ValueEnum};
use contig_partition::algorithms::{solve_with, PlacementRecord, SolverConfig};
use contig_partition::catalog::Catalog;
use contig_partition::dataset::{Dataset, DatasetSelector, MetricSelector};
use contig_partition::io::write_partition_data_to_file;
use contig_partition::report::Summary;
use contig_partition::sweep::sweep_with;
use contig_partition::synthetic::{gen_random_metrics, gen_uniform_metrics, grid_dataset};
use contig_partition::Error;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Split an adjacency graph into contiguous groups of balanced size")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct Source {
    /// Directory holding one sub-directory per scale
    #[arg(short, long, default_value = "assets")]
    root: PathBuf,

    /// Scale, by name or by position in sorted order
    #[arg(short, long, default_value = "0")]
    scale: DatasetSelector,
}

impl Source {
    fn dataset(&self) -> Result<Arc<Dataset>, Error> {
        let mut catalog = Catalog::open(&self.root)?;
        let dataset = catalog.dataset(&self.scale)?;
        info!(root = %catalog.root().display(), scale = dataset.name(), "dataset selected");
        Ok(dataset)
    }
}

#[derive(clap::Args, Debug)]
struct Tuning {
    /// Number of recent moves the stall guard remembers
    #[arg(long, default_value_t = 5)]
    history_len: usize,

    /// Fraction of units placed before enclosures are absorbed
    #[arg(long, default_value_t = 0.5)]
    enclosure_threshold: f64,

    /// Smallest acceptable deviation, as a fraction of the average group metric
    #[arg(long, default_value_t = 0.05)]
    min_deviation_ratio: f64,

    /// Cap on committed steps [default: 16 × units × groups]
    #[arg(long)]
    max_steps: Option<usize>,
}

impl Tuning {
    fn config(&self) -> SolverConfig {
        let config = SolverConfig::new()
            .with_history_len(self.history_len)
            .with_enclosure_threshold(self.enclosure_threshold)
            .with_min_deviation_ratio(self.min_deviation_ratio);
        match self.max_steps {
            Some(max_steps) => config.with_max_steps(max_steps),
            None => config,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Partition one scale on one metric
    Solve {
        #[command(flatten)]
        source: Source,

        /// Metric, by name or by column position
        #[arg(short, long, default_value = "0")]
        metric: MetricSelector,

        /// Number of groups
        #[arg(short, long)]
        groups: usize,

        #[command(flatten)]
        tuning: Tuning,

        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,

        /// File where the placement of every unit is written
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Log the number of placed units after every move
        #[arg(long)]
        progress: bool,
    },

    /// Partition one scale for every combination of group count and metric
    Sweep {
        #[command(flatten)]
        source: Source,

        /// Group counts to try
        #[arg(short, long, value_delimiter = ',', required = true)]
        groups: Vec<usize>,

        /// Metrics to try [default: all]
        #[arg(short, long, value_delimiter = ',')]
        metrics: Vec<MetricSelector>,

        #[command(flatten)]
        tuning: Tuning,

        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Print hop distances from one unit
    Distances {
        #[command(flatten)]
        source: Source,

        /// Unit code
        unit: String,
    },

    /// Partition a synthetic grid
    Grid {
        rows: usize,

        cols: usize,

        /// Number of groups
        #[arg(short, long)]
        groups: usize,

        /// Smallest random metric; uniform metrics when absent
        #[arg(long, requires = "max_metric")]
        min_metric: Option<f64>,

        /// Largest random metric
        #[arg(long, requires = "min_metric")]
        max_metric: Option<f64>,

        /// Seed for the random metrics
        #[arg(long)]
        seed: Option<u64>,

        #[command(flatten)]
        tuning: Tuning,

        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Solve { source, metric, groups, tuning, format, output, progress } => {
            let dataset = source.dataset()?;
            run_solve(&dataset, &metric, groups, &tuning.config(), format, output, progress)
        }
        Command::Sweep { source, groups, metrics, tuning, format } => {
            let dataset = source.dataset()?;
            let metrics = if metrics.is_empty() {
                (0..dataset.metric_names().len()).map(MetricSelector::Index).collect()
            } else {
                metrics
            };

            let start = Instant::now();
            let records = sweep_with(&dataset, &groups, &metrics, &tuning.config())?;
            info!(elapsed = ?start.elapsed(), "sweep done");

            match format {
                Format::Json => println!("{}", serde_json::to_string_pretty(&records)?),
                Format::Text => {
                    for record in records {
                        println!(
                            "{} groups of {} on {}: {:?} after {} steps, imbalance {:.4}, contiguous {}",
                            record.num_groups,
                            dataset.name(),
                            record.metric,
                            record.termination,
                            record.steps,
                            record.imbalance,
                            record.contiguous
                        );
                    }
                }
            }
            Ok(())
        }
        Command::Distances { source, unit } => {
            let dataset = source.dataset()?;
            let from = dataset
                .lookup(&unit)
                .ok_or_else(|| Error::Configuration(format!("unknown unit '{unit}'")))?;

            let mut distances: Vec<(u32, &str)> = dataset
                .distances_from(from)
                .map(|(to, hops)| (hops, dataset.unit(to).code.as_str()))
                .collect();
            distances.sort();
            for (hops, code) in distances {
                println!("{code}: {hops}");
            }
            Ok(())
        }
        Command::Grid { rows, cols, groups, min_metric, max_metric, seed, tuning, format } => {
            let metrics = match (min_metric, max_metric) {
                (Some(min), Some(max)) => gen_random_metrics(rows * cols, min, max, seed)?,
                _ => gen_uniform_metrics(rows * cols),
            };
            let dataset = grid_dataset(rows, cols, metrics)?;
            run_solve(&dataset, &MetricSelector::Index(0), groups, &tuning.config(), format, None, false)
        }
    }
}

fn run_solve(
    dataset: &Dataset,
    metric: &MetricSelector,
    groups: usize,
    config: &SolverConfig,
    format: Format,
    output: Option<PathBuf>,
    progress: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let observer = progress.then(|| {
        Box::new(|records: &[PlacementRecord<'_>]| {
            let placed = records.iter().filter(|record| record.group != 0).count();
            info!(placed, total = records.len(), "progress");
        }) as Box<dyn contig_partition::algorithms::Observer>
    });

    let start = Instant::now();
    let solution = solve_with(groups, metric, dataset, observer, config)?;
    let elapsed_time = start.elapsed();
    debug!(?elapsed_time, steps = solution.outcome.steps, "solve finished");

    if let Some(path) = output {
        write_partition_data_to_file(&solution.state, &path)?;
    }

    let summary = Summary::from_state(&solution.state, &solution.outcome);
    match format {
        Format::Text => print!("{}", summary.render_text()),
        Format::Json => println!("{}", summary.to_json()?),
    }
    Ok(())
}
