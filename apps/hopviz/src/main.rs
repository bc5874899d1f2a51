use anyhow::{anyhow, Context, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use hopviz_model::{TraceTable, TABLE_VERSION};
use hopviz_render::{render_with, ChartSettings};
use hopviz_trace::{collect, CollectSettings, SystemTracerouteRunner, TraceSettings};
use log::{info, warn};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;

mod targets;
mod visualize;

use targets::{resolve_targets, DEFAULT_DESTINATIONS};
use visualize::{format_hop_averages, visualize, VisualizeOptions};

#[derive(Parser)]
#[command(name = "hopviz", version, about = "Repeated traceroute RTT charts")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Run(RunArgs),
    Trace(TraceArgs),
    Render(RenderArgs),
}

#[derive(Args)]
struct TraceFlags {
    #[arg(long, default_value_t = 30)]
    max_hops: u32,

    #[arg(long, default_value_t = 3)]
    probes: u32,

    /// Seconds to wait for each probe reply
    #[arg(long, default_value_t = 3)]
    wait_secs: u64,

    /// Probe with ICMP echo (traceroute -I, usually needs root)
    #[arg(long)]
    icmp: bool,

    /// Do not resolve hop addresses to hostnames
    #[arg(long)]
    numeric: bool,

    /// Kill a trace that runs longer than this
    #[arg(long, default_value_t = 90)]
    timeout_secs: u64,

    #[arg(long, default_value_t = 3)]
    num_traces: u32,

    #[arg(long, default_value_t = 5)]
    interval_secs: u64,
}

impl TraceFlags {
    fn collect_settings(&self) -> CollectSettings {
        CollectSettings {
            num_traces: self.num_traces,
            interval: Duration::from_secs(self.interval_secs),
            trace: TraceSettings {
                max_hops: self.max_hops,
                probes: self.probes,
                wait_secs: self.wait_secs,
                icmp: self.icmp,
                numeric: self.numeric,
                timeout: Duration::from_secs(self.timeout_secs),
            },
        }
    }
}

#[derive(Args)]
struct ChartFlags {
    #[arg(long, default_value_t = 1200)]
    width: u32,

    #[arg(long, default_value_t = 600)]
    height: u32,
}

impl ChartFlags {
    fn settings(&self) -> ChartSettings {
        ChartSettings {
            width: self.width,
            height: self.height,
        }
    }
}

#[derive(Args)]
#[command(
    about = "Trace each destination, chart it and print per-hop averages. Only target networks you own or have permission to test."
)]
struct RunArgs {
    #[arg(long)]
    targets: Option<PathBuf>,

    #[arg(long = "target")]
    target_list: Vec<String>,

    #[arg(long, default_value = "output")]
    out_dir: PathBuf,

    #[command(flatten)]
    trace: TraceFlags,

    #[command(flatten)]
    chart: ChartFlags,
}

#[derive(Args)]
#[command(about = "Collect trace runs for one destination into a JSON table")]
struct TraceArgs {
    #[arg(long)]
    target: String,

    #[arg(long)]
    out: PathBuf,

    #[command(flatten)]
    trace: TraceFlags,
}

#[derive(Args)]
#[command(about = "Chart a JSON table written by `trace`")]
struct RenderArgs {
    #[arg(long = "in")]
    in_path: PathBuf,

    #[arg(long, default_value = "output")]
    out_dir: PathBuf,

    #[command(flatten)]
    chart: ChartFlags,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match cli.command {
        Commands::Run(args) => run_run(args),
        Commands::Trace(args) => run_trace(args),
        Commands::Render(args) => run_render(args),
    }
}

fn run_run(args: RunArgs) -> Result<()> {
    let mut targets = resolve_targets(args.targets.as_deref(), args.target_list)?;
    if targets.is_empty() {
        info!("no targets given; using the built-in destinations");
        targets = DEFAULT_DESTINATIONS.iter().map(|d| d.to_string()).collect();
    }

    let options = VisualizeOptions {
        collect: args.trace.collect_settings(),
        output_dir: args.out_dir,
        chart: args.chart.settings(),
    };
    let runner = SystemTracerouteRunner::default();

    for destination in &targets {
        println!(
            "Running {} traceroutes to {}...",
            options.collect.num_traces, destination
        );
        let (table, path) = visualize(destination, &options, &runner)?;
        println!("Plot saved to: {}", path.display());
        println!("\nAverage RTT by hop for {destination}:");
        print!("{}", format_hop_averages(&table));
        println!("\n{}\n", "-".repeat(50));
    }

    Ok(())
}

fn run_trace(args: TraceArgs) -> Result<()> {
    let settings = args.trace.collect_settings();
    let runner = SystemTracerouteRunner::default();

    let (records, outcome) = collect(&args.target, &settings, &runner);
    if !outcome.failures.is_empty() {
        warn!(
            "{} of {} traces to {} failed",
            outcome.failures.len(),
            settings.num_traces,
            args.target
        );
    }

    write_json(&args.out, &TraceTable::new(args.target.as_str(), records))
}

fn run_render(args: RenderArgs) -> Result<()> {
    let contents = fs::read_to_string(&args.in_path)
        .with_context(|| format!("failed to read input {:?}", args.in_path))?;
    let table: TraceTable = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse trace table {:?}", args.in_path))?;
    if table.version != TABLE_VERSION {
        return Err(anyhow!(
            "unsupported trace table version {} in {:?}",
            table.version,
            args.in_path
        ));
    }

    let path = render_with(
        &table,
        &table.destination,
        &args.out_dir,
        &args.chart.settings(),
        Local::now().naive_local(),
    )?;
    println!("Plot saved to: {}", path.display());
    Ok(())
}

/// Serializes `value` and swaps it into `path` in one rename, so readers
/// never see a half written table.
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory {:?}", dir))?;

    let mut staged = NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to stage {:?} in {:?}", path, dir))?;
    staged
        .write_all(&json)
        .and_then(|()| staged.as_file().sync_all())
        .with_context(|| format!("failed to write staged copy of {:?}", path))?;
    staged
        .persist(path)
        .map_err(|err| anyhow!("failed to replace output {:?}: {}", path, err.error))?;

    sync_dir(dir);
    Ok(())
}

/// Flushes the directory entry for the rename.
#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Err(err) = fs::File::open(dir).and_then(|handle| handle.sync_all()) {
        warn!("failed to sync directory {:?}: {}", dir, err);
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}
