//! Main runner for one extraction

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use gcd_core::{ProgressContext, fmt_num, write_archive};

use crate::assembler::DocumentAssembler;
use crate::catalog::MetadataCatalog;
use crate::config::{ExtractConfig, OutputFormat, validate_output_name};
use crate::credit::{CreditIndex, validate_credit_types};
use crate::mapper::RowMapper;
use crate::schema::issue_query;
use crate::sink::{index_dir, open_sink};
use crate::snapshot::Snapshot;
use crate::source::GcdSource;

/// Run execution summary
#[derive(Debug)]
pub struct ExtractSummary {
    pub rows: usize,
    pub documents: usize,
    pub skipped: usize,
    pub issues: usize,
    /// Index directory or parquet partitions
    pub outputs: Vec<PathBuf>,
    /// `{name}.sqar` when the index was packaged
    pub archive: Option<PathBuf>,
    pub elapsed: std::time::Duration,
}

/// Attach the configured database and run the extraction.
pub fn run(config: &ExtractConfig, progress: &ProgressContext) -> Result<ExtractSummary> {
    let source = GcdSource::open(&config.database)?;
    run_with_source(&source, config, progress)
}

/// Run the extraction against an already opened source.
pub fn run_with_source(
    source: &GcdSource,
    config: &ExtractConfig,
    progress: &ProgressContext,
) -> Result<ExtractSummary> {
    let start = Instant::now();
    validate_output_name(&config.name).map_err(anyhow::Error::msg)?;
    validate_credit_types().context("Invalid credit type table")?;
    let snapshot = Snapshot::parse(&config.snapshot_date)?;
    log::info!(
        "Extracting snapshot {} as {} into {}",
        snapshot.date(),
        config.format,
        config.output_dir.display()
    );

    let pb = progress.stage_line("catalog");
    pb.set_message("loading lookup tables");
    let catalog = MetadataCatalog::load(source, &config.schema)?;
    pb.finish_and_clear();

    let credits = if config.schema.story_credit {
        let pb = progress.stage_line("credits");
        pb.set_message("loading gcd_story_credit");
        let credits = CreditIndex::load(source)?;
        pb.finish_and_clear();
        credits
    } else {
        log::info!("Credit table disabled; using legacy story credit columns");
        CreditIndex::empty()
    };

    std::fs::create_dir_all(&config.output_dir).context("Failed to create output directory")?;
    let sink = open_sink(config, &snapshot).context("Failed to open output sink")?;

    let mapper = RowMapper::new(&catalog, &credits, config.schema, &snapshot);
    let mut assembler = DocumentAssembler::new(mapper, sink, config.log_interval)
        .with_progress(progress.stage_line("documents"));

    let query = issue_query(&config.schema);
    log::debug!("Issue query:\n{query}");
    source
        .for_each_row(&query, |row| {
            assembler
                .process(row)
                .context("Failed to write document")
        })
        .context("Document extraction failed")?;

    let (assembled, written) = assembler.finish().context("Failed to close output sink")?;

    let archive = match config.format {
        OutputFormat::Index if config.archive => {
            let src = index_dir(&config.output_dir, &config.name);
            let dest = config.output_dir.join(format!("{}.sqar", config.name));
            let archived = write_archive(&src, &dest)
                .with_context(|| format!("Failed to archive {}", src.display()))?;
            log::info!(
                "Archived {} files into {} ({} → {} bytes)",
                archived.entries,
                dest.display(),
                fmt_num(archived.bytes_in as usize),
                fmt_num(archived.bytes_out as usize)
            );
            Some(archived.archive_dir)
        }
        _ => None,
    };

    let summary = ExtractSummary {
        rows: assembled.rows,
        documents: written.documents,
        skipped: assembled.skipped,
        issues: assembled.issues,
        outputs: written.outputs,
        archive,
        elapsed: start.elapsed(),
    };

    log::info!("=== GCD Extraction Summary ===");
    log::info!(
        "Documents: {} ({} issues, {} rows skipped)",
        fmt_num(summary.documents),
        fmt_num(summary.issues),
        fmt_num(summary.skipped)
    );
    for path in &summary.outputs {
        log::info!("Output: {}", path.display());
    }
    log::info!("Time: {:.1}s", summary.elapsed.as_secs_f64());

    Ok(summary)
}
