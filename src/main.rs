use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use framemachine_core::metrics::init_logging;
use framemachine_core::random::rng_from_seed;
use framemachine_core::{AppConfig, Machine, Pool, PoolState, SelectionStrategy};
use framemachine_io::{
    code_frame_to_hex, export_ranked, read_records, write_records, MachineRecord,
};
use framemachine_lib::liveness::{self, LivenessReport, GRID_LIMIT};
use framemachine_lib::signal::{trend_fitness, Hysteresis, Sample, SignalKind};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evolve a pool that predicts the trend of a signal. Press Enter to stop.
    Evolve(EvolveArgs),
    /// Count live outputs of random machines over a grid of sizes
    Survey(SurveyArgs),
}

#[derive(Args, Debug)]
struct EvolveArgs {
    /// Config file path; defaults apply when it does not exist
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[arg(short, long, value_enum, default_value = "sine")]
    signal: SignalKind,

    /// Stop after this many generations
    #[arg(short, long)]
    generations: Option<usize>,

    /// Overrides the pool and selection seeds
    #[arg(long)]
    seed: Option<u64>,

    /// Write the best machines to this file when the run ends
    #[arg(long)]
    export: Option<PathBuf>,

    #[arg(long, default_value_t = 16)]
    export_count: usize,

    /// Seed the population with machines from an export file
    #[arg(long)]
    import: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct SurveyArgs {
    #[arg(short, long, default_value = "lifetest.csv")]
    output: PathBuf,

    /// Largest machine and cycle count
    #[arg(short, long, default_value_t = GRID_LIMIT)]
    limit: usize,

    #[arg(short, long, value_enum, default_value = "sine")]
    signal: SignalKind,

    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Evolve(args) => evolve(args),
        Command::Survey(args) => survey(args),
    }
}

fn load_config(path: &Path) -> Result<Option<AppConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let config = AppConfig::from_toml(&content)
        .with_context(|| format!("Invalid config {}", path.display()))?;
    Ok(Some(config))
}

fn evolve(args: EvolveArgs) -> Result<()> {
    let loaded = load_config(&args.config)?;
    let from_file = loaded.is_some();
    let mut config = loaded.unwrap_or_default();
    if let Some(seed) = args.seed {
        config.pool.seed = Some(seed);
        config.selection.seed = Some(seed);
    }
    init_logging(&config.logging.level);
    tracing::info!(
        path = %args.config.display(),
        from_file = from_file,
        fingerprint = %config.fingerprint(),
        "Configuration loaded"
    );

    let samples = Hysteresis::new(args.signal.wave(config.pool.seed));
    let mut builder = Pool::<Sample, i64, i32>::builder()
        .input_converter(|s: &Sample| s.current)
        .output_converter(|o| o)
        .fitness(trend_fitness)
        .selection(SelectionStrategy::from_config(&config))
        .selection_interval(config.selection.interval)
        .config(config.pool.clone());
    builder = match args.generations {
        Some(limit) => builder.input(samples.take(limit)),
        None => builder.input(samples),
    };
    if let Some(path) = &args.import {
        let mut machines: Vec<Machine> = read_records(path)?
            .iter()
            .map(MachineRecord::to_machine)
            .collect();
        let mut rng = rng_from_seed(config.pool.seed);
        while machines.len() < config.pool.population_size {
            machines.push(Machine::generate_with_rng(&mut rng));
        }
        builder = builder.initial_population(machines);
    }
    let pool = builder.build()?;

    let (stop_tx, stop_rx) = mpsc::channel();
    thread::Builder::new()
        .name("framemachine-stdin".to_string())
        .spawn(move || {
            let mut line = String::new();
            if matches!(std::io::stdin().read_line(&mut line), Ok(n) if n > 0) {
                let _ = stop_tx.send(());
            }
        })?;

    pool.start()?;
    let interval = Duration::from_millis(config.logging.report_interval_ms);
    let mut stdin_open = true;
    loop {
        let stop_requested = if stdin_open {
            match stop_rx.recv_timeout(interval) {
                Ok(()) => true,
                Err(RecvTimeoutError::Timeout) => false,
                Err(RecvTimeoutError::Disconnected) => {
                    stdin_open = false;
                    false
                }
            }
        } else {
            pool.wait(interval);
            false
        };

        if stop_requested && pool.state() == PoolState::Running {
            pool.stop()?;
        }
        let snapshot = pool.snapshot();
        tracing::info!(
            generations = pool.metrics().generations(),
            selections = pool.metrics().selections(),
            population = snapshot.len(),
            best = ?snapshot.best().map(|m| m.score),
            state = ?pool.state(),
            "Progress"
        );
        if pool.state() != PoolState::Running {
            break;
        }
    }

    let snapshot = pool.snapshot();
    if let Some(best) = snapshot.best() {
        println!("best {} score {}", best.machine.id(), best.score);
        println!("{}", code_frame_to_hex(best.machine.code()));
    }
    if let Some(path) = &args.export {
        write_records(&export_ranked(&snapshot, args.export_count), path)?;
    }

    if pool.state() == PoolState::Error {
        bail!(
            "Pool failed: {}",
            pool.failure().unwrap_or_else(|| "unknown failure".to_string())
        );
    }
    pool.shutdown()?;
    Ok(())
}

fn survey(args: SurveyArgs) -> Result<()> {
    init_logging("info");
    let mut rng = rng_from_seed(args.seed);
    let mut reports: Vec<LivenessReport> = Vec::new();

    println!("{}", liveness::CSV_HEADER);
    for machines in liveness::grid_sizes(args.limit) {
        for cycles in liveness::grid_sizes(args.limit) {
            let input = args.signal.wave(args.seed);
            let report = liveness::survey(machines, cycles, input, &mut rng);
            println!("{}", report.csv_row());
            reports.push(report);
        }
    }

    let mut file = std::fs::File::create(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;
    liveness::write_csv(&mut file, &reports)?;
    tracing::info!(path = %args.output.display(), rows = reports.len(), "Survey written");
    Ok(())
}
