use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tfgate::config::Config;
use tfgate::error::GateError;
use tfgate::finding::Severity;
use tfgate::report::{write_json, write_markdown};
use tfgate::scanner::ScannerKind;
use tfgate::AnalyzeOptions;

#[derive(Parser)]
#[command(
    name = "tfgate",
    about = "Terraform security gate: one scored report from checkov, tfsec and terrascan",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a Terraform directory or .tf file and evaluate the policy gate
    Scan {
        /// Terraform directory or single .tf file
        path: PathBuf,

        /// Fail (exit 1) when findings reach this severity (low, medium, high, critical)
        #[arg(long, value_parser = parse_severity)]
        fail_on: Option<Severity>,

        /// Write the full JSON report to this file
        #[arg(long, value_name = "PATH")]
        out_json: Option<PathBuf>,

        /// Write the Markdown report to this file
        #[arg(long, value_name = "PATH")]
        out_md: Option<PathBuf>,

        /// Config file path (defaults to .tfgate.toml in the scan root)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Run only this scanner; repeatable (checkov, tfsec, terrascan)
        #[arg(long = "scanner", value_parser = parse_scanner)]
        scanners: Vec<ScannerKind>,

        /// Per-scanner timeout in seconds
        #[arg(long, value_name = "N")]
        timeout_secs: Option<u64>,
    },

    /// Generate a starter .tfgate.toml config file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

fn parse_severity(s: &str) -> Result<Severity, String> {
    Severity::from_str_lenient(s)
        .ok_or_else(|| format!("unknown severity '{s}' (expected low, medium, high or critical)"))
}

fn parse_scanner(s: &str) -> Result<ScannerKind, String> {
    ScannerKind::from_str_lenient(s)
        .ok_or_else(|| format!("unknown scanner '{s}' (expected checkov, tfsec or terrascan)"))
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Scan {
            path,
            fail_on,
            out_json,
            out_md,
            config,
            scanners,
            timeout_secs,
        } => cmd_scan(path, fail_on, out_json, out_md, config, scanners, timeout_secs),
        Commands::Init { force } => cmd_init(force),
    };

    match result {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    }
}

/// Diagnostics go to stderr so stdout stays parseable in CI pipelines.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tfgate=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_scan(
    path: PathBuf,
    fail_on: Option<Severity>,
    out_json: Option<PathBuf>,
    out_md: Option<PathBuf>,
    config: Option<PathBuf>,
    scanners: Vec<ScannerKind>,
    timeout_secs: Option<u64>,
) -> Result<i32, GateError> {
    let options = AnalyzeOptions {
        config_path: config,
        fail_on,
        scanners: (!scanners.is_empty()).then_some(scanners),
        timeout_secs,
    };

    let report = tfgate::analyze(&path, &options)?;

    let counts = &report.security.score.by_severity;
    println!("{}", report.security.summary);
    println!(
        "Severity counts: critical={}, high={}, medium={}, low={}",
        counts.critical, counts.high, counts.medium, counts.low
    );

    if let Some(path) = out_json {
        write_json(&report, &path)?;
        println!("Wrote JSON report: {}", path.display());
    }
    if let Some(path) = out_md {
        write_markdown(&report, &path)?;
        println!("Wrote Markdown report: {}", path.display());
    }

    match report.gate.threshold {
        Some(threshold) if !report.gate.passed => {
            println!("Policy gate failed: findings at or above '{threshold}' were detected.");
            Ok(1)
        }
        Some(threshold) => {
            println!("Policy gate passed: no findings at or above '{threshold}'.");
            Ok(0)
        }
        None => Ok(0),
    }
}

fn cmd_init(force: bool) -> Result<i32, GateError> {
    let path = PathBuf::from(".tfgate.toml");

    if path.exists() && !force {
        eprintln!(".tfgate.toml already exists. Use --force to overwrite.");
        return Ok(2);
    }

    std::fs::write(&path, Config::starter_toml())?;
    println!("Created .tfgate.toml");

    Ok(0)
}
