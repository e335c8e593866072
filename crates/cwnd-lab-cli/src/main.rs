use anyhow::{Context, Result};
use clap::Parser;
use cwnd_lab_abstract::{ScenarioConfig, ScenarioOverride, TcpVariant};
use cwnd_lab_cli::scenario;
use cwnd_lab_simulator::RunReport;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Two-node point-to-point congestion-window tracing lab"
)]
struct Args {
    /// Transport protocol to use: TcpNewReno, TcpHybla, TcpVegas,
    /// TcpScalable, TcpWestwood.
    #[arg(long, default_value = "TcpWestwood")]
    prot: String,

    /// Scenario override file (TOML).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory the trace files are written into.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Write a JSON summary of the finished run.
    #[arg(long)]
    report_out: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let variant = match args.prot.parse::<TcpVariant>() {
        Ok(variant) => variant,
        Err(parse_error) => {
            error!("{parse_error}");
            std::process::exit(1);
        }
    };

    let mut config = ScenarioConfig::default();
    if let Some(path) = &args.config {
        load_override(path)?.apply_to(&mut config);
    }

    info!(variant = %variant, "starting simulation");
    let report = scenario::run(&config, variant, &args.out_dir)?;
    info!(
        duration_secs = report.duration_secs,
        tcp_packets_sent = report.tcp_packets_sent,
        rx_drops = report.rx_drops,
        aggregate_rx_bytes = report.aggregate_rx_bytes,
        "simulation complete"
    );

    if let Some(path) = &args.report_out {
        write_report(path, &report)?;
    }

    Ok(())
}

fn load_override(path: &Path) -> Result<ScenarioOverride> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    toml::from_str(&content).context("Failed to parse config file")
}

fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    let data = serde_json::to_vec_pretty(report).context("Failed to serialize run report")?;
    fs::write(path, &data).with_context(|| format!("Failed to write report {}", path.display()))?;
    Ok(())
}
