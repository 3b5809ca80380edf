use std::path::{Path, PathBuf};

use carrier_window_core::{
    Carrier, Category, CategoryConfig, ChartFile, LayerConfig, LayerView, LoadSummary,
    PlaybackClock, PoolConfig, PoolSetup, RealizationWindow, TickReport, VisualBinding,
    VisualFactory, WindowDiagnostics, WindowError,
};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

fn main() -> carrier_window_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate(args) => run_simulate(&args),
        Commands::Validate { chart, config } => run_validate(&chart, config.as_deref()),
    }
}

fn run_simulate(args: &SimulateArgs) -> carrier_window_core::Result<()> {
    args.validate()?;

    let chart = ChartFile::from_json_path(&args.chart)?;
    let config = load_layer_config(args.config.as_deref(), &chart)?;
    let duration = args.duration.unwrap_or_else(|| chart.end_time() + 1.0);
    if !duration.is_finite() {
        return Err(WindowError::msg(
            "chart never ends; pass a finite --duration",
        ));
    }
    tracing::info!(
        chart = ?args.chart,
        carriers = chart.carriers.len(),
        duration,
        fps = args.fps,
        "starting simulation"
    );

    let pools = config
        .categories
        .iter()
        .map(|entry| {
            PoolSetup::new(
                entry.category,
                Box::new(TracingFactory::new(entry.category)),
                entry.pool,
            )
        })
        .collect();

    let mut window = RealizationWindow::from_layer_config(&config)?;
    let load = window.load(chart.into_arena(), pools)?;

    let mut clock = PlaybackClock::new(args.roll_per_second);
    let step = 1.0 / f64::from(args.fps);
    let mut totals = SimulationTotals::default();
    let mut rewind_at = args.rewind_at;

    while clock.time_seconds <= duration {
        let report = window.tick(clock.position());
        totals.absorb(&report, window.realized_count());

        if rewind_at.is_some_and(|at| clock.time_seconds >= at) {
            tracing::info!(time = clock.time_seconds, "rewinding to start");
            rewind_at = None;
            clock.reset();
            continue;
        }
        clock.advance(step);
    }

    let virtualized_on_unload = window.unload();
    let output = SimulationOutput {
        load,
        totals,
        virtualized_on_unload,
        diagnostics: window.diagnostics(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run_validate(chart: &Path, config: Option<&Path>) -> carrier_window_core::Result<()> {
    let chart = ChartFile::from_json_path(chart)?;
    let config = load_layer_config(config, &chart)?;

    let mut categories: Vec<CategoryReport> = chart
        .categories()
        .into_iter()
        .map(|category| CategoryReport {
            category,
            carriers: chart
                .carriers
                .iter()
                .filter(|carrier| carrier.category == category)
                .count(),
            pool: config.pool_config(category),
        })
        .collect();
    categories.sort_by_key(|report| report.category);

    let excluded: usize = categories
        .iter()
        .filter(|report| report.pool.is_none())
        .map(|report| report.carriers)
        .sum();
    if excluded > 0 {
        tracing::warn!(excluded, "carriers without a configured pool would be excluded");
    }

    let output = ValidateOutput {
        carriers: chart.carriers.len(),
        excluded,
        end_time: chart.end_time(),
        categories,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Reads the layer config, or builds one giving every chart category a default pool.
fn load_layer_config(
    path: Option<&Path>,
    chart: &ChartFile,
) -> carrier_window_core::Result<LayerConfig> {
    match path {
        Some(path) => LayerConfig::from_json_path(path),
        None => Ok(LayerConfig {
            categories: chart
                .categories()
                .into_iter()
                .map(|category| CategoryConfig {
                    category,
                    pool: PoolConfig::default(),
                })
                .collect(),
            ..LayerConfig::default()
        }),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

/// Visual that only logs its lifecycle.
struct TracingVisual {
    category: Category,
    instance: usize,
    updates: u64,
}

impl VisualBinding for TracingVisual {
    fn init_visual(&mut self, carrier: &Carrier, layer: &LayerView) {
        self.updates = 0;
        tracing::trace!(
            category = %self.category,
            instance = self.instance,
            start_time = carrier.start_time(),
            ratio = layer.ratio(carrier, true, true),
            "init visual"
        );
    }

    fn update_visual(&mut self, _carrier: &Carrier, _layer: &LayerView) {
        self.updates += 1;
    }

    fn finish_visual(&mut self) {
        tracing::trace!(
            category = %self.category,
            instance = self.instance,
            updates = self.updates,
            "finish visual"
        );
    }

    fn is_visual_finished(&self) -> bool {
        false
    }

    fn ignore_display_window(&self) -> bool {
        false
    }
}

struct TracingFactory {
    category: Category,
    created: usize,
}

impl TracingFactory {
    fn new(category: Category) -> Self {
        Self {
            category,
            created: 0,
        }
    }
}

impl VisualFactory for TracingFactory {
    fn instantiate(&mut self) -> Box<dyn VisualBinding> {
        self.created += 1;
        Box::new(TracingVisual {
            category: self.category,
            instance: self.created,
            updates: 0,
        })
    }
}

#[derive(Debug, Default, Serialize)]
struct SimulationTotals {
    ticks: u64,
    realized: usize,
    virtualized: usize,
    deferred: usize,
    peak_realized: usize,
}

impl SimulationTotals {
    fn absorb(&mut self, report: &TickReport, realized_now: usize) {
        self.ticks += 1;
        self.realized += report.realized;
        self.virtualized += report.virtualized;
        self.deferred += report.deferred;
        self.peak_realized = self.peak_realized.max(realized_now);
    }
}

#[derive(Debug, Serialize)]
struct SimulationOutput {
    load: LoadSummary,
    totals: SimulationTotals,
    virtualized_on_unload: usize,
    diagnostics: WindowDiagnostics,
}

#[derive(Debug, Serialize)]
struct CategoryReport {
    category: Category,
    carriers: usize,
    pool: Option<PoolConfig>,
}

#[derive(Debug, Serialize)]
struct ValidateOutput {
    carriers: usize,
    excluded: usize,
    end_time: f64,
    categories: Vec<CategoryReport>,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Drive a carrier realization window from the command line", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play a chart through the realization window and print a summary.
    Simulate(SimulateArgs),
    /// Check a chart and layer config without playing it.
    Validate {
        /// Chart JSON with a `carriers` array.
        #[arg(long)]
        chart: PathBuf,
        /// Layer config JSON; every chart category gets a default pool when omitted.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct SimulateArgs {
    /// Chart JSON with a `carriers` array.
    #[arg(long)]
    chart: PathBuf,
    /// Layer config JSON; every chart category gets a default pool when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Ticks per simulated second.
    #[arg(long, default_value_t = 60)]
    fps: u32,
    /// Seconds to simulate; defaults to one second past the last carrier.
    #[arg(long)]
    duration: Option<f64>,
    /// Jump back to zero once this many seconds have played.
    #[arg(long)]
    rewind_at: Option<f64>,
    /// Scroll speed of the simulated clock.
    #[arg(long, default_value_t = 1.0)]
    roll_per_second: f64,
}

impl SimulateArgs {
    fn validate(&self) -> carrier_window_core::Result<()> {
        if self.fps == 0 {
            return Err(WindowError::msg("--fps must be at least 1"));
        }
        if !(self.roll_per_second.is_finite() && self.roll_per_second > 0.0) {
            return Err(WindowError::msg(
                "--roll-per-second must be finite and positive",
            ));
        }
        if self.duration.is_some_and(|duration| !duration.is_finite()) {
            return Err(WindowError::msg("--duration must be finite"));
        }
        if self.rewind_at.is_some_and(|at| !at.is_finite()) {
            return Err(WindowError::msg("--rewind-at must be finite"));
        }
        Ok(())
    }
}
