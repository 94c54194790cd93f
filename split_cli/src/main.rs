//! # Loadsplit CLI
//!
//! Runs the seismic expansion pipeline against a model snapshot file.
//!
//! Usage:
//!   loadsplit expand tower.json --replace-ex --report tower.report.json
//!   loadsplit inspect tower.json
//!   loadsplit config > loadsplit.json
//!
//! Log output goes to stderr and is controlled by `RUST_LOG`
//! (default `split_core=info,loadsplit=info`).

use std::env;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use split_core::expand::patterns::drift_load_pattern_names;
use split_core::tables::schema::{decode_rows, SeismicPatternRow};
use split_core::tables::{keys, TableKind};
use split_core::{
    expand_loads, load_snapshot, save_snapshot, ExpandConfig, ExpandError, HostModel, ModelLock,
    ProgressEvent, SnapshotHost,
};

/// Expand zip seismic load patterns through cases, combinations and design tables
#[derive(Parser, Debug)]
#[command(name = "loadsplit", version)]
#[command(about = "Expand zip seismic load patterns in a model snapshot")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the expansion and save the model
    Expand(ExpandArgs),

    /// Show what a model snapshot contains
    Inspect {
        /// Model snapshot file
        model: PathBuf,
    },

    /// Print the default configuration as JSON
    Config,
}

#[derive(Args, Debug)]
struct ExpandArgs {
    /// Model snapshot file
    model: PathBuf,

    /// JSON configuration file; flags below override it
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Write the expanded model here instead of overwriting MODEL
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Replace an existing pure-X pattern with the split one
    #[arg(long)]
    replace_ex: bool,

    /// Replace an existing pure-Y pattern with the split one
    #[arg(long)]
    replace_ey: bool,

    /// Prefix for patterns split off a drift pattern
    #[arg(long)]
    drift_prefix: Option<String>,

    /// Suffix for patterns split off a drift pattern
    #[arg(long)]
    drift_suffix: Option<String>,

    /// User id recorded in the lock file (default: $USER)
    #[arg(long, short = 'u')]
    user: Option<String>,

    /// Run the analysis first, leaving the model locked as the host would
    #[arg(long)]
    run_analysis: bool,

    /// Write the JSON expansion report here
    #[arg(long, short = 'r')]
    report: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "split_core=info,loadsplit=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Expand(args) => expand(args),
        Command::Inspect { model } => inspect(model),
        Command::Config => print_config(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(error) = e.downcast_ref::<ExpandError>() {
                if let Ok(json) = serde_json::to_string_pretty(error) {
                    eprintln!("{}", json);
                }
            }
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn default_user() -> String {
    env::var("USER")
        .or_else(|_| env::var("USERNAME"))
        .unwrap_or_else(|_| "loadsplit".to_string())
}

fn expand(args: ExpandArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => ExpandConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ExpandConfig::default(),
    };
    config.replace_ex |= args.replace_ex;
    config.replace_ey |= args.replace_ey;
    if let Some(prefix) = args.drift_prefix {
        config.drift_prefix = prefix;
    }
    if let Some(suffix) = args.drift_suffix {
        config.drift_suffix = suffix;
    }

    let user = args.user.unwrap_or_else(default_user);
    let _lock = ModelLock::acquire(&args.model, user)
        .with_context(|| format!("Failed to lock {}", args.model.display()))?;
    let snapshot = load_snapshot(&args.model)
        .with_context(|| format!("Failed to load {}", args.model.display()))?;
    let mut host = SnapshotHost::new(snapshot);
    if args.run_analysis {
        host.run_analysis()?;
    }

    let mut finished = None;
    for event in expand_loads(&mut host, config) {
        match event? {
            ProgressEvent::Progress { message, percent } => println!("[{:>3}%] {}", percent, message),
            ProgressEvent::Finished { success, report } => finished = Some((success, report)),
        }
    }
    let (success, report) = finished.context("Expansion ended without a result")?;
    tracing::info!(run_id = %report.run_id, success, "Expansion finished");

    let wrote = !report.write.applied.is_empty() || !report.write.fallbacks.is_empty();
    if wrote {
        let target = args.output.as_deref().unwrap_or(&args.model);
        save_snapshot(&host.into_snapshot(), target)
            .with_context(|| format!("Failed to save {}", target.display()))?;
        println!("Saved {}", target.display());
    }
    if !success && wrote {
        println!("Some tables could not be written: {}", report.write.failed.join(", "));
    }

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&report)?;
        fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Report written to {}", path.display());
    }
    Ok(())
}

fn inspect(model: PathBuf) -> Result<()> {
    let snapshot = load_snapshot(&model).with_context(|| format!("Failed to load {}", model.display()))?;
    println!("Model:    {}", snapshot.meta.model_name);
    println!("Software: {}", snapshot.meta.software.display_name());
    println!("Modified: {}", snapshot.meta.modified.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("Tables:   {}", snapshot.table_count());
    match ModelLock::holder(&model) {
        Some(holder) => println!(
            "Locked:   by {} on {} since {}",
            holder.user_id,
            holder.machine,
            holder.locked_at.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        None => println!("Locked:   no"),
    }
    println!();

    for (key, table) in &snapshot.tables {
        let marker = if TableKind::of(key).is_some() { "*" } else { " " };
        println!("{} {:<60} {:>6} rows", marker, key, table.rows.len());
    }
    println!();

    let host = SnapshotHost::new(snapshot);
    let drift = drift_load_pattern_names(&host)?;
    match host.read_table(keys::AUTO_SEISMIC_USER_COEFFICIENT)? {
        Some(table) => {
            let rows = decode_rows::<SeismicPatternRow>(&table)?;
            let zips: Vec<&SeismicPatternRow> = rows.iter().filter(|r| r.directions.is_zip()).collect();
            println!("Zip seismic patterns: {}", zips.len());
            for row in zips {
                let flags: Vec<String> = row.directions.iter().map(|d| d.to_string()).collect();
                let kind = if drift.contains(&row.name) { " (drift)" } else { "" };
                println!("  {}{}: {}", row.name, kind, flags.join(", "));
            }
        }
        None => println!("No auto seismic user coefficient table"),
    }

    let mut drift: Vec<String> = drift.into_iter().collect();
    drift.sort();
    println!("Drift load patterns: {}", if drift.is_empty() { "none".to_string() } else { drift.join(", ") });
    Ok(())
}

fn print_config() -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&ExpandConfig::default())?);
    Ok(())
}
