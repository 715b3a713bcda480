//! gresratio CLI
//!
//! Command-line harness for checking jobs against the CPU/GPU ratio policy.

mod commands;

use anyhow::Context;
use clap::{Parser, Subcommand};
use gresratio_admission::Admission;
use gresratio_core::{AdmissionConfig, AdmissionRequest, JobRecord, JobUpdate, LoggingConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// gresratio - CPU/GPU ratio admission policy for GPU partitions
#[derive(Parser, Debug)]
#[command(name = "gresratio")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Policy file
    #[arg(long, env = "GRESRATIO_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Host settings file (TOML)
    #[arg(long, env = "GRESRATIO_SETTINGS", global = true)]
    settings: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check a job submission
    Check {
        /// Partition the job targets
        #[arg(long)]
        partition: Option<String>,

        /// GRES request (e.g., gpu:V100:2)
        #[arg(long)]
        gres: Option<String>,

        /// Number of CPUs requested
        #[arg(long)]
        cpus: u32,

        /// Print the decision as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check a modification of an existing job
    Modify {
        /// New partition
        #[arg(long)]
        partition: Option<String>,

        /// New GRES request
        #[arg(long)]
        gres: Option<String>,

        /// New minimum CPU count
        #[arg(long)]
        min_cpus: Option<u32>,

        /// Partition the job currently has
        #[arg(long)]
        current_partition: Option<String>,

        /// GRES the job currently has
        #[arg(long)]
        current_gres: Option<String>,

        /// CPUs the job currently has
        #[arg(long, default_value_t = 0)]
        current_cpus: u32,

        /// Print the decision as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the parsed policy
    Show {
        /// Print the policy as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parse a GRES request
    ParseGres {
        /// GRES request (e.g., gpu:V100:2)
        gres: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut config = match &cli.settings {
        Some(path) => AdmissionConfig::from_file(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => AdmissionConfig::default(),
    };
    if let Some(path) = cli.config {
        config.policy_path = path;
    }

    init_logging(&config.logging, cli.verbose);

    match cli.command {
        Commands::Check {
            partition,
            gres,
            cpus,
            json,
        } => {
            let admission = Admission::from_config(&config);
            let request = AdmissionRequest::submit(partition.as_deref(), gres.as_deref(), cpus);
            commands::check(&admission, &request, json)
        }
        Commands::Modify {
            partition,
            gres,
            min_cpus,
            current_partition,
            current_gres,
            current_cpus,
            json,
        } => {
            let admission = Admission::from_config(&config);
            let update = JobUpdate {
                partition,
                gres,
                min_cpus,
            };
            let current = JobRecord {
                partition: current_partition,
                gres: current_gres,
                total_cpus: current_cpus,
            };
            let request = AdmissionRequest::modify(&update, &current);
            commands::check(&admission, &request, json)
        }
        Commands::Show { json } => commands::show(&config.policy_path, json),
        Commands::ParseGres { gres } => commands::parse_gres(&gres),
    }
}

fn init_logging(logging: &LoggingConfig, verbose: bool) {
    let log_level = if verbose {
        Level::DEBUG
    } else {
        match logging.level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "error" => Level::ERROR,
            _ => Level::WARN,
        }
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr);

    let _ = if logging.format == "compact" {
        tracing::subscriber::set_global_default(builder.compact().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
}
