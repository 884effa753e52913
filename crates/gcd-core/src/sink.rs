//! Parquet partition writer with atomic tmp→rename

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::RecordBatch;
use arrow::datatypes::Schema;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;

/// Rows per Parquet row group
const ROW_GROUP_SIZE: usize = 1024 * 1024;

/// Block codec for partition files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParquetCompression {
    Snappy,
    Zstd(i32),
}

impl ParquetCompression {
    fn to_parquet(self) -> Result<Compression, std::io::Error> {
        match self {
            Self::Snappy => Ok(Compression::SNAPPY),
            Self::Zstd(level) => {
                let level = ZstdLevel::try_new(level)
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
                Ok(Compression::ZSTD(level))
            }
        }
    }
}

/// File name of one partition: `part-0000.parquet`
pub fn part_file_name(part: usize) -> String {
    format!("part-{part:04}.parquet")
}

/// One open partition file
pub struct ParquetSink {
    writer: ArrowWriter<File>,
    tmp_path: PathBuf,
    final_path: PathBuf,
    row_count: usize,
}

impl std::fmt::Debug for ParquetSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParquetSink")
            .field("final_path", &self.final_path)
            .field("row_count", &self.row_count)
            .finish_non_exhaustive()
    }
}

impl ParquetSink {
    /// Open partition `part` under `dir`, writing to a temporary file until finalized.
    pub fn new(
        dir: &Path,
        part: usize,
        schema: &Schema,
        compression: ParquetCompression,
    ) -> Result<Self, std::io::Error> {
        fs::create_dir_all(dir)?;
        let filename = part_file_name(part);
        let final_path = dir.join(&filename);
        let tmp_path = dir.join(format!("{filename}.tmp"));

        if tmp_path.exists() {
            fs::remove_file(&tmp_path)?;
        }

        let file = File::create(&tmp_path)?;
        let props = WriterProperties::builder()
            .set_compression(compression.to_parquet()?)
            .set_max_row_group_size(ROW_GROUP_SIZE)
            .build();

        let writer = ArrowWriter::try_new(file, Arc::new(schema.clone()), Some(props))
            .map_err(std::io::Error::other)?;

        Ok(Self {
            writer,
            tmp_path,
            final_path,
            row_count: 0,
        })
    }

    /// Write a record batch
    pub fn write_batch(&mut self, batch: &RecordBatch) -> Result<(), std::io::Error> {
        self.row_count += batch.num_rows();
        self.writer.write(batch).map_err(std::io::Error::other)
    }

    /// Final path the partition lands at after `finalize`
    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    /// Flush the footer and atomically rename tmp → final
    pub fn finalize(self) -> Result<usize, std::io::Error> {
        let row_count = self.row_count;
        self.writer.close().map_err(std::io::Error::other)?;
        fs::rename(&self.tmp_path, &self.final_path)?;
        Ok(row_count)
    }
}

/// Remove `.tmp` leftovers from an interrupted run
pub fn cleanup_tmp_files(dir: &Path) -> std::io::Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "tmp") {
            log::warn!("Removing stale tmp file: {}", path.display());
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

/// Remove finalized `part-NNNN.parquet` files left by an earlier run.
/// Returns how many were removed.
pub fn remove_partitions(dir: &Path) -> std::io::Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_part = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with("part-") && name.ends_with(".parquet"));
        if is_part && path.is_file() {
            fs::remove_file(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}
