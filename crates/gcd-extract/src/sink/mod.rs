//! Document sinks.
//!
//! Both encodings are append-only and single-writer: the assembler hands each
//! document to [`DocumentSink::emit`] in cursor order and calls
//! [`DocumentSink::close`] once the cursor is exhausted.

mod columnar;
mod index;

pub use columnar::{ColumnarSink, DocumentAccumulator, document_schema};
pub use index::{IndexSink, index_schema};

use std::io;
use std::path::{Path, PathBuf};

use crate::config::{ExtractConfig, OutputFormat, validate_output_name};
use crate::document::Document;
use crate::snapshot::Snapshot;

/// What a closed sink wrote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkSummary {
    pub documents: usize,
    /// Index directory, or every finished partition file
    pub outputs: Vec<PathBuf>,
}

pub trait DocumentSink {
    fn emit(&mut self, doc: &Document) -> io::Result<()>;

    /// Flush everything and release the output.
    fn close(self: Box<Self>) -> io::Result<SinkSummary>;
}

/// Directory an index run writes into: `{output_dir}/{name}`
pub fn index_dir(output_dir: &Path, name: &str) -> PathBuf {
    output_dir.join(name)
}

/// Directory a parquet run writes partitions into:
/// `{output_dir}/{name}/snapshot={YYYYMMDD}`
pub fn partition_dir(output_dir: &Path, name: &str, snapshot: &Snapshot) -> PathBuf {
    output_dir.join(name).join(snapshot.dir_name())
}

/// Open the sink selected by the run configuration.
pub fn open_sink(config: &ExtractConfig, snapshot: &Snapshot) -> io::Result<Box<dyn DocumentSink>> {
    validate_output_name(&config.name)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    match config.format {
        OutputFormat::Index => {
            let dir = index_dir(&config.output_dir, &config.name);
            Ok(Box::new(IndexSink::create(&dir, &config.index)?))
        }
        OutputFormat::Parquet => {
            let dir = partition_dir(&config.output_dir, &config.name, snapshot);
            Ok(Box::new(ColumnarSink::create(&dir, &config.parquet)?))
        }
    }
}
