//! evmjit CLI entry point.
//!
//! Runs a single compiled code unit and prints how it terminated.

use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use evmjit::{CodeUnit, ConfigFile, ExecutionEngine};

/// Run a compiled EVM code unit on the native JIT backend.
#[derive(Parser, Debug)]
#[command(name = "evmjit", version, about)]
struct Args {
    /// Code unit to run (.wasm binary or .wat text).
    #[arg(value_name = "CODE_UNIT")]
    code_unit: PathBuf,

    /// Gas available to the run.
    #[arg(long, env = "EVMJIT_GAS", default_value_t = 100_000)]
    gas: u64,

    /// TOML configuration with `[runtime]` and `[environment]` tables.
    #[arg(long, short, env = "EVMJIT_CONFIG")]
    config: Option<PathBuf>,

    /// Run against the built-in fixture environment.
    #[arg(long)]
    standalone: bool,

    /// Emit logs as JSON.
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,evmjit=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs);

    let config = match &args.config {
        Some(path) => ConfigFile::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ConfigFile::default(),
    };

    let environment = match (&config.environment, args.standalone) {
        (Some(env), false) => Some(env),
        (_, true) => None,
        (None, false) => bail!(
            "No [environment] table in the configuration. Pass --standalone to use the fixture environment"
        ),
    };

    info!(code_unit = %args.code_unit.display(), gas = args.gas, "Starting evmjit");

    let engine = ExecutionEngine::new(&config.runtime).context("Failed to create engine")?;
    let unit = CodeUnit::from_file(&args.code_unit)
        .with_context(|| format!("Failed to read {}", args.code_unit.display()))?;

    let mut gas = args.gas;
    let output = engine
        .run(unit, &mut gas, environment)
        .context("Execution failed")?;

    println!("outcome:  {} ({})", output.outcome, output.outcome.code());
    println!("gas left: {gas}");
    if !output.output.is_empty() {
        println!("output:   0x{}", hex::encode(&output.output));
    }

    Ok(())
}
