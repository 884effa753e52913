//! gcd-etl - Grand Comics Database extraction CLI
//!
//! Reads a GCD database dump and writes one document per issue/story into a
//! search index or snapshot-partitioned Parquet files.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "gcd-etl")]
#[command(about = "Grand Comics Database extraction to search index or Parquet")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./gcd-etl.toml or ~/.config/gcd-etl/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Extract one snapshot
    Extract(cmd::extract::ExtractArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let progress = gcd_core::ProgressContext::new();

    // TTY: log lines go through the spinner display
    let multi = progress.is_tty().then(|| progress.multi());
    gcd_core::init_logging(cli.debug, multi);

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Command::Extract(args) => cmd::extract::run(args, &config, &progress),
        Command::Config => {
            cmd::show::run(&config);
            Ok(())
        }
    }
}
