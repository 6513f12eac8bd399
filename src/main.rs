use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use signum_simulator::{Config, Simulator};
use signum_vm::{DeployOptions, FeeClass, FeeSchedule, Line, Program};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "signum-sim")]
#[command(about = "Deterministic simulator for Signum smart-contract assembly", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level; overrides RUST_LOG and the config file
    #[arg(short, long)]
    log_level: Option<String>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy a contract, forge blocks and print the final state as JSON
    Run {
        /// Assembly source file
        #[arg(short, long)]
        source: PathBuf,

        /// JSON scenario with user transactions
        #[arg(long)]
        scenario: Option<PathBuf>,

        /// Number of blocks to forge
        #[arg(short, long, default_value = "1")]
        blocks: u64,

        /// Contract id to deploy under
        #[arg(long)]
        contract_id: Option<u64>,

        /// Initial contract balance in NQT
        #[arg(long)]
        balance: Option<u64>,
    },

    /// Parse a source file and list its instructions, fees and labels
    Check {
        /// Assembly source file
        #[arg(short, long)]
        source: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::default(),
    };

    // Initialize logging
    let filter = match &cli.log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.log.level)),
    };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.log.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match cli.command {
        Commands::Run {
            source,
            scenario,
            blocks,
            contract_id,
            balance,
        } => run(config, &source, scenario.as_deref(), blocks, contract_id, balance),
        Commands::Check { source } => check(&config, &source),
    }
}

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn run(
    config: Config,
    source: &Path,
    scenario: Option<&Path>,
    blocks: u64,
    contract_id: Option<u64>,
    balance: Option<u64>,
) -> Result<()> {
    let text = read_source(source)?;
    let mut simulator = Simulator::new(config);

    if let Some(path) = scenario {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        simulator.load_scenario(&json)?;
    }

    let mut options = DeployOptions::new(text);
    if let Some(id) = contract_id {
        options = options.with_contract_id(id);
    }
    if let Some(balance) = balance {
        options = options.with_initial_balance(balance);
    }
    let id = simulator.deploy(options)?;
    info!(contract = id, source = %source.display(), "contract deployed");

    for report in simulator.forge_blocks(blocks)? {
        for run in &report.executed {
            info!(
                height = report.height,
                contract = run.contract,
                steps = run.result.steps,
                fees = run.result.fees,
                outcome = ?run.result.outcome,
                "contract executed"
            );
        }
    }

    println!("{}", simulator.snapshot().to_json()?);
    Ok(())
}

fn check(config: &Config, source: &Path) -> Result<()> {
    let text = read_source(source)?;
    let program = Program::parse(&text);
    let fees = FeeSchedule::new(&config.protocol);

    let mut invalid = 0usize;
    for (index, line) in program.lines().iter().enumerate() {
        match line {
            Line::Code(instruction) => {
                let fee = fees.fee(FeeClass::of_line(line));
                println!("{index:>5}  {fee:>10}  {instruction}");
            }
            Line::Invalid => {
                invalid += 1;
                let text = program.source_line(index).unwrap_or_default().trim();
                println!("{index:>5}  {:>10}  ?? {text}", "-");
            }
            _ => {}
        }
    }

    let mut labels: Vec<_> = program.labels().iter().collect();
    labels.sort_by_key(|(_, line)| **line);
    for (name, line) in labels {
        println!("{name}: line {line}");
    }

    if invalid > 0 {
        anyhow::bail!("{invalid} line(s) could not be parsed");
    }
    Ok(())
}
