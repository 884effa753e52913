//! gcd-core - Shared infrastructure for the GCD extraction pipeline
//!
//! Logging, progress reporting, the Arrow accumulator contract, the atomic
//! Parquet partition writer and archive packaging of finished output.

pub mod accumulator;
pub mod archive;
pub mod logging;
pub mod progress;
pub mod sink;

// Re-exports for convenience
pub use accumulator::{Accumulator, DEFAULT_BATCH_SIZE};
pub use archive::{ArchiveEntry, ArchiveSummary, read_entry, read_metadata, write_archive};
pub use logging::{IndicatifLogger, init_logging};
pub use progress::{ProgressContext, fmt_num};
pub use sink::{
    ParquetCompression, ParquetSink, cleanup_tmp_files, part_file_name, remove_partitions,
};
