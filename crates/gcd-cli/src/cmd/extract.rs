//! Extract subcommand - one snapshot of the GCD into an index or Parquet

use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use clap::Args;
use gcd_core::{ProgressContext, fmt_num};
use gcd_extract::config::validate_output_name;
use gcd_extract::{ExtractConfig, OutputFormat};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Snapshot date (YYYY-MM-DD)
    #[arg(short, long, value_parser = parse_date)]
    pub date: NaiveDate,

    /// Output name (index directory / dataset directory)
    #[arg(short, long, default_value = "gcd", value_parser = parse_name)]
    pub name: String,

    /// Output format: index or parquet
    #[arg(short, long, default_value = "index")]
    pub format: OutputFormat,

    /// Output directory
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Leave the index directory unpackaged
    #[arg(long)]
    pub no_archive: bool,

    /// Documents per Parquet partition
    #[arg(long)]
    pub rows_per_part: Option<usize>,
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("Invalid date format: {e}"))
}

fn parse_name(s: &str) -> Result<String, String> {
    validate_output_name(s).map(str::to_string)
}

/// Merge CLI arguments over the file configuration.
pub fn extract_config(args: ExtractArgs, config: &Config) -> ExtractConfig {
    let mut parquet = config.parquet;
    if let Some(rows) = args.rows_per_part {
        parquet.rows_per_part = rows;
    }
    ExtractConfig {
        snapshot_date: args.date.format("%Y-%m-%d").to_string(),
        name: args.name,
        output_dir: args
            .output_dir
            .unwrap_or_else(|| config.output.default_dir.clone()),
        format: args.format,
        database: config.database.clone(),
        schema: config.schema,
        index: config.index,
        parquet,
        log_interval: config.progress.log_interval,
        archive: config.output.archive && !args.no_archive,
    }
}

pub fn run(args: ExtractArgs, config: &Config, progress: &ProgressContext) -> Result<()> {
    let extract = extract_config(args, config);
    let summary = gcd_extract::run(&extract, progress)?;

    println!();
    println!("=== GCD Extract Summary ===");
    println!("Format: {}", extract.format);
    println!(
        "Documents: {} from {} rows ({} issues)",
        fmt_num(summary.documents),
        fmt_num(summary.rows),
        fmt_num(summary.issues)
    );
    if summary.skipped > 0 {
        println!("Skipped rows: {}", fmt_num(summary.skipped));
    }
    for path in &summary.outputs {
        println!("Output: {}", path.display());
    }
    if let Some(archive) = &summary.archive {
        println!("Archive: {}", archive.display());
    }
    println!("Time: {:.1}s", summary.elapsed.as_secs_f64());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: ExtractArgs,
    }

    fn parse(argv: &[&str]) -> ExtractArgs {
        Harness::try_parse_from(std::iter::once("gcd-etl").chain(argv.iter().copied()))
            .unwrap()
            .args
    }

    #[test]
    fn cli_overrides_file_config() {
        let args = parse(&[
            "--date",
            "2021-03-05",
            "--format",
            "parquet",
            "--output-dir",
            "/tmp/out",
            "--no-archive",
            "--rows-per-part",
            "10",
        ]);
        let extract = extract_config(args, &Config::default());
        assert_eq!(extract.snapshot_date, "2021-03-05");
        assert_eq!(extract.name, "gcd");
        assert_eq!(extract.format, OutputFormat::Parquet);
        assert_eq!(extract.output_dir, PathBuf::from("/tmp/out"));
        assert!(!extract.archive);
        assert_eq!(extract.parquet.rows_per_part, 10);
    }

    #[test]
    fn defaults_come_from_file_config() {
        let mut config = Config::default();
        config.output.default_dir = PathBuf::from("/srv/gcd");
        config.progress.log_interval = 500;
        let extract = extract_config(parse(&["-d", "2020-01-31", "-n", "comics"]), &config);
        assert_eq!(extract.format, OutputFormat::Index);
        assert_eq!(extract.name, "comics");
        assert_eq!(extract.output_dir, PathBuf::from("/srv/gcd"));
        assert_eq!(extract.log_interval, 500);
        assert!(extract.archive);
    }

    #[test]
    fn rejects_names_outside_output_dir() {
        for name in ["", ".", "..", "a/b"] {
            assert!(
                Harness::try_parse_from(["gcd-etl", "--date", "2021-03-05", "--name", name]).is_err(),
                "{name:?}"
            );
        }
    }

    #[test]
    fn rejects_malformed_date() {
        assert!(
            Harness::try_parse_from(["gcd-etl", "--date", "03/05/2021"]).is_err()
        );
    }
}
