use crate::commands;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "sunset",
    version,
    about = "Search-cluster index lifecycle archival: scan, archive, and alias oversized indices"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Scan for indices at or above the size threshold
    Scan {
        /// Override the configured threshold, in GB
        #[arg(long)]
        threshold_gb: Option<f64>,
    },
    /// Archive one index end to end (kickoff, poll, cleanup)
    Archive {
        /// Source index to archive
        index: String,
        /// Seconds between reindex status polls
        #[arg(long)]
        poll_interval_secs: Option<u64>,
        /// Overall ceiling on the reindex wait, in seconds
        #[arg(long)]
        deadline_secs: Option<u64>,
    },
    /// Scan, then archive every candidate independently
    Cycle {
        /// Override the configured threshold, in GB
        #[arg(long)]
        threshold_gb: Option<f64>,
    },
    /// Execute one step of the archival contract from a JSON payload
    Step {
        /// Inline JSON request
        #[arg(long, conflicts_with = "payload_file")]
        payload: Option<String>,
        /// Path to a JSON request file; stdin is read when neither flag is given
        #[arg(long)]
        payload_file: Option<PathBuf>,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Scan { threshold_gb } => {
            finish(commands::scan::run(&commands::scan::ScanOptions { threshold_gb })?)
        }
        Command::Archive {
            index,
            poll_interval_secs,
            deadline_secs,
        } => finish(commands::archive::run(&commands::archive::ArchiveOptions {
            index,
            poll_interval_secs,
            deadline_secs,
        })?),
        Command::Cycle { threshold_gb } => {
            finish(commands::cycle::run(&commands::cycle::CycleOptions { threshold_gb })?)
        }
        Command::Step {
            payload,
            payload_file,
        } => commands::step::run(&commands::step::StepOptions {
            payload,
            payload_file,
        }),
    }
}

fn finish(report: commands::CommandReport) -> Result<()> {
    for detail in &report.details {
        println!("{}: {detail}", report.command);
    }
    for issue in &report.issues {
        eprintln!("{}: issue: {issue}", report.command);
    }
    if report.ok {
        Ok(())
    } else {
        anyhow::bail!("{} completed with issues", report.command)
    }
}
