//! MIM simulation CLI binary.
//!
//! # Commands
//!
//! - `run` - Build a topology and population, run the model, write the report
//! - `init-config` - Print the default configuration as TOML

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use mim::{
    build_topology,
    config::{Config, Experiment, UpdateMode},
    Model, SimulationReport, SocialGraph, Topology, VERSION,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

#[derive(Parser)]
#[command(name = "mim")]
#[command(version = VERSION)]
#[command(about = "MIM - Misinformation model simulation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the simulation
    Run(RunArgs),

    /// Print the default configuration as TOML
    InitConfig {
        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
struct RunArgs {
    /// TOML config file (default: built-in defaults plus MIM_* env vars)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of graph agents
    #[arg(short, long, default_value = "100")]
    nodes: usize,

    /// Network topology
    #[arg(short, long, value_enum, default_value = "small-world")]
    topology: Topology,

    /// Mean degree of the generated network
    #[arg(short = 'k', long, default_value = "6")]
    neighbors: usize,

    /// Rewiring probability (small-world only)
    #[arg(long, default_value = "0.1")]
    rewire_prob: f64,

    /// Steps per run (overrides config)
    #[arg(short, long)]
    steps: Option<u64>,

    /// Seed of the first run (overrides config)
    #[arg(long)]
    seed: Option<u64>,

    /// Number of runs, with consecutive seeds
    #[arg(long, default_value = "1")]
    runs: u64,

    /// Experiment (overrides config)
    #[arg(short, long, value_enum)]
    experiment: Option<Experiment>,

    /// Evidence added by each bot per step (overrides config)
    #[arg(long)]
    flooding_capacity: Option<f64>,

    /// Share of agents following a bot (overrides config)
    #[arg(long)]
    bot_follower_percentage: Option<f64>,

    /// First step at which bans apply (overrides config)
    #[arg(long)]
    activation_delay: Option<u64>,

    /// Share of agents inoculated (overrides config)
    #[arg(long)]
    inoculation_rate: Option<f64>,

    /// Record per-agent opinions
    #[arg(long)]
    collect_agent_data: bool,

    /// Neighbor update mode (overrides config)
    #[arg(long, value_enum)]
    update_mode: Option<UpdateMode>,

    /// Report output path (default: summary on stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write the final population of each run as Graphviz DOT
    #[arg(long)]
    export_graph: Option<PathBuf>,

    /// Log level when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => cmd_run(args),
        Commands::InitConfig { output } => cmd_init_config(output),
    }
}

fn cmd_run(args: RunArgs) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level)),
        )
        .init();

    let base = build_config(&args)?;
    let first_seed = base.run.seed;

    for run in 0..args.runs {
        let mut config = base.clone();
        config.run.seed = first_seed.wrapping_add(run);
        let seed = config.run.seed;

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let graph = build_topology(args.topology, args.nodes, args.neighbors, args.rewire_prob, &mut rng);
        let graph = SocialGraph::from_petgraph(&graph).context("Invalid generated network")?;

        tracing::info!(
            "Run {}/{}: seed {}, {:?} network with {} nodes and {} edges",
            run + 1,
            args.runs,
            seed,
            args.topology,
            graph.node_count(),
            graph.edge_count()
        );

        let steps = config.run.num_steps;
        let mut model = Model::from_seed(graph, config).context("Failed to build model")?;
        model.run(steps);

        if let Some(path) = &args.export_graph {
            let path = run_path(path, seed, args.runs);
            std::fs::write(&path, model.to_dot())
                .with_context(|| format!("Failed to write graph to {}", path.display()))?;
        }

        let report = model.into_report();
        match &args.output {
            Some(path) => {
                let path = run_path(path, seed, args.runs);
                report
                    .write_json(&path)
                    .with_context(|| format!("Failed to write report to {}", path.display()))?;
                println!("Report written to {}", path.display());
            },
            None => print_summary(seed, &report),
        }
    }

    Ok(())
}

fn build_config(args: &RunArgs) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::from_env(),
    };

    if let Some(steps) = args.steps {
        config.run.num_steps = steps;
    }
    if let Some(seed) = args.seed {
        config.run.seed = seed;
    }
    if let Some(experiment) = args.experiment {
        config.run.experiment = experiment;
    }
    if let Some(capacity) = args.flooding_capacity {
        config.run.flooding_capacity = capacity;
    }
    if let Some(share) = args.bot_follower_percentage {
        config.run.bot_follower_percentage = share;
    }
    if let Some(delay) = args.activation_delay {
        config.run.activation_delay = delay;
    }
    if let Some(rate) = args.inoculation_rate {
        config.run.inoculation_rate = rate;
    }
    if let Some(mode) = args.update_mode {
        config.model.update_mode = mode;
    }
    if args.collect_agent_data {
        config.run.collect_agent_data = true;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// `report.json` becomes `report-seed7.json` when several runs share a path
fn run_path(path: &Path, seed: u64, runs: u64) -> PathBuf {
    if runs <= 1 {
        return path.to_path_buf();
    }
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("run");
    let name = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}-seed{seed}.{ext}"),
        None => format!("{stem}-seed{seed}"),
    };
    path.with_file_name(name)
}

fn print_summary(seed: u64, report: &SimulationReport) {
    let (Some(first), Some(last)) = (report.model_records.first(), report.model_records.last())
    else {
        println!("Seed {seed}: no steps recorded");
        return;
    };

    let banned: usize = report.model_records.iter().map(|r| r.accounts_banned).sum();

    println!("Seed {seed} ({}, {} steps)", report.config.run.experiment, report.model_records.len());
    println!("  {:<20} {:>10} {:>10}", "Metric", "Start", "End");
    println!("  {:<20} {:>10.4} {:>10.4}", "Polarization", first.polarization, last.polarization);
    println!("  {:<20} {:>10.4} {:>10.4}", "Misinformation", first.misinformation, last.misinformation);
    println!(
        "  {:<20} {:>10.4} {:>10.4}",
        "Opinion (all)", first.average_opinion_all, last.average_opinion_all
    );
    println!(
        "  {:<20} {:>10.4} {:>10.4}",
        "Opinion (left)", first.average_opinion_left, last.average_opinion_left
    );
    println!(
        "  {:<20} {:>10.4} {:>10.4}",
        "Opinion (right)", first.average_opinion_right, last.average_opinion_right
    );
    println!(
        "  {:<20} {:>10.4} {:>10.4}",
        "Opinion (regular)", first.average_opinion_reg, last.average_opinion_reg
    );
    println!("  Accounts banned: {banned}");
}

fn cmd_init_config(output: Option<PathBuf>) -> anyhow::Result<()> {
    let toml = Config::default().to_toml()?;
    match output {
        Some(path) => {
            std::fs::write(&path, toml)
                .with_context(|| format!("Failed to write config to {}", path.display()))?;
            println!("Default config written to {}", path.display());
        },
        None => print!("{toml}"),
    }
    Ok(())
}
