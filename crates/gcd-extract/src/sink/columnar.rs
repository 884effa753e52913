//! Snapshot-partitioned Parquet sink.
//!
//! Documents are buffered into Arrow batches and appended to the open
//! partition. After `rows_per_part` documents the partition is finalized and
//! the next document opens `part-{n+1}`.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use arrow::array::{
    ArrayRef, BooleanArray, Int32Array, Int64Array, Int64Builder, ListBuilder, RecordBatch,
    StringArray, StringBuilder,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::error::ArrowError;
use gcd_core::{
    Accumulator, ParquetCompression, ParquetSink, cleanup_tmp_files, fmt_num, remove_partitions,
};

use super::{DocumentSink, SinkSummary};
use crate::config::ParquetConfig;
use crate::document::{Document, FieldKind, FieldSpec, FIELDS};

fn list_of(item: DataType) -> DataType {
    DataType::List(Arc::new(Field::new("item", item, true)))
}

/// Arrow schema derived from the field catalog
pub fn document_schema() -> &'static Arc<Schema> {
    static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
        let fields: Vec<Field> = FIELDS
            .iter()
            .map(|spec| {
                let dtype = match spec.kind {
                    FieldKind::Long => DataType::Int64,
                    FieldKind::Int => DataType::Int32,
                    FieldKind::Flag => DataType::Boolean,
                    FieldKind::Text => DataType::Utf8,
                    FieldKind::TextList => list_of(DataType::Utf8),
                    FieldKind::LongList => list_of(DataType::Int64),
                };
                Field::new(spec.name, dtype, !spec.required)
            })
            .collect();
        Arc::new(Schema::new(fields))
    });
    &SCHEMA
}

/// Buffers documents and converts them column by column
#[derive(Default)]
pub struct DocumentAccumulator {
    docs: Vec<Document>,
}

impl DocumentAccumulator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Accumulator for DocumentAccumulator {
    type Row = Document;

    fn push(&mut self, row: Document) {
        self.docs.push(row);
    }

    fn len(&self) -> usize {
        self.docs.len()
    }

    fn take_batch(&mut self) -> Result<RecordBatch, ArrowError> {
        let docs = std::mem::take(&mut self.docs);
        let columns: Vec<ArrayRef> = FIELDS.iter().map(|spec| column(spec, &docs)).collect();
        RecordBatch::try_new(document_schema().clone(), columns)
    }
}

fn column(spec: &FieldSpec, docs: &[Document]) -> ArrayRef {
    let name = spec.name;
    match spec.kind {
        FieldKind::Long => Arc::new(docs.iter().map(|d| d.int(name)).collect::<Int64Array>()),
        // out-of-range values become null rather than wrapping
        FieldKind::Int => Arc::new(
            docs.iter()
                .map(|d| d.int(name).and_then(|v| i32::try_from(v).ok()))
                .collect::<Int32Array>(),
        ),
        FieldKind::Flag => Arc::new(
            docs.iter()
                .map(|d| d.int(name).map(|v| v == 1))
                .collect::<BooleanArray>(),
        ),
        FieldKind::Text => Arc::new(docs.iter().map(|d| d.text(name)).collect::<StringArray>()),
        FieldKind::TextList => {
            let mut builder = ListBuilder::new(StringBuilder::new());
            for d in docs {
                match d.texts(name) {
                    Some(items) => {
                        for item in items {
                            builder.values().append_value(item);
                        }
                        builder.append(true);
                    }
                    None => builder.append(false),
                }
            }
            Arc::new(builder.finish())
        }
        FieldKind::LongList => {
            let mut builder = ListBuilder::new(Int64Builder::new());
            for d in docs {
                match d.ints(name) {
                    Some(items) => {
                        builder.values().append_slice(items);
                        builder.append(true);
                    }
                    None => builder.append(false),
                }
            }
            Arc::new(builder.finish())
        }
    }
}

/// Parquet output rolling over every `rows_per_part` documents
pub struct ColumnarSink {
    dir: PathBuf,
    compression: ParquetCompression,
    rows_per_part: usize,
    acc: DocumentAccumulator,
    current: Option<ParquetSink>,
    next_part: usize,
    in_part: usize,
    documents: usize,
    finished: Vec<PathBuf>,
}

impl ColumnarSink {
    /// Open the first partition under `dir` (the snapshot directory).
    pub fn create(dir: &Path, config: &ParquetConfig) -> io::Result<Self> {
        cleanup_tmp_files(dir)?;
        let stale = remove_partitions(dir)?;
        if stale > 0 {
            log::warn!("Replaced {stale} partition files from a previous run in {}", dir.display());
        }
        let mut sink = Self {
            dir: dir.to_path_buf(),
            compression: config.codec(),
            rows_per_part: config.rows_per_part.max(1),
            acc: DocumentAccumulator::new(),
            current: None,
            next_part: 0,
            in_part: 0,
            documents: 0,
            finished: Vec::new(),
        };
        sink.open_part()?;
        Ok(sink)
    }

    fn open_part(&mut self) -> io::Result<()> {
        let part = ParquetSink::new(
            &self.dir,
            self.next_part,
            document_schema(),
            self.compression,
        )?;
        log::debug!("Opened partition {}", part.final_path().display());
        self.current = Some(part);
        self.next_part += 1;
        self.in_part = 0;
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.acc.is_empty() {
            return Ok(());
        }
        let batch = self.acc.take_batch().map_err(io::Error::other)?;
        match self.current.as_mut() {
            Some(part) => part.write_batch(&batch),
            None => Err(io::Error::other("no open partition")),
        }
    }

    fn finish_part(&mut self) -> io::Result<()> {
        self.flush()?;
        if let Some(part) = self.current.take() {
            let path = part.final_path().to_path_buf();
            let rows = part.finalize()?;
            log::info!("Closed partition {} ({} documents)", path.display(), fmt_num(rows));
            self.finished.push(path);
        }
        Ok(())
    }
}

impl DocumentSink for ColumnarSink {
    fn emit(&mut self, doc: &Document) -> io::Result<()> {
        if self.current.is_none() {
            self.open_part()?;
        }
        self.acc.push(doc.clone());
        self.in_part += 1;
        self.documents += 1;
        if self.acc.is_full() {
            self.flush()?;
        }
        if self.in_part >= self.rows_per_part {
            self.finish_part()?;
        }
        Ok(())
    }

    fn close(mut self: Box<Self>) -> io::Result<SinkSummary> {
        self.finish_part()?;
        Ok(SinkSummary {
            documents: self.documents,
            outputs: std::mem::take(&mut self.finished),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Value;
    use arrow::array::{Array, AsArray};
    use arrow::datatypes::{Int32Type, Int64Type};
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use std::fs::File;
    use tempfile::TempDir;

    fn doc(issue_id: i64) -> Document {
        let mut d = Document::new();
        d.set_int("unixtime", 1_614_924_000);
        d.set_int("issue_id", issue_id);
        d.set_int("series_id", 3);
        d
    }

    fn read_all(path: &Path) -> Vec<RecordBatch> {
        ParquetRecordBatchReaderBuilder::try_new(File::open(path).unwrap())
            .unwrap()
            .build()
            .unwrap()
            .map(|b| b.unwrap())
            .collect()
    }

    fn row_count(path: &Path) -> usize {
        read_all(path).iter().map(RecordBatch::num_rows).sum()
    }

    #[test]
    fn schema_follows_catalog() {
        let schema = document_schema();
        assert_eq!(schema.fields().len(), FIELDS.len());
        assert!(!schema.field_with_name("issue_id").unwrap().is_nullable());
        assert_eq!(
            schema.field_with_name("series_is_singleton").unwrap().data_type(),
            &DataType::Boolean
        );
        assert_eq!(
            schema.field_with_name("story_inks_creator_id").unwrap().data_type(),
            &list_of(DataType::Int64)
        );
    }

    #[test]
    fn batch_conversion_by_kind() {
        let mut d = doc(1);
        d.set_int("series_is_singleton", 1);
        d.set_int("volume_not_printed", 0);
        d.set_int("page_count", 5_000_000_000);
        d.set("story_script", Value::TextList(vec!["A".into(), "B".into()]));
        d.set("story_script_creator_id", Value::IntList(vec![4, 5]));
        d.set("story_genre", Value::TextList(Vec::new()));
        d.set_int("series_year_began", -1);

        let mut acc = DocumentAccumulator::new();
        acc.push(d);
        acc.push(doc(2));
        let batch = acc.take_batch().unwrap();
        assert!(acc.is_empty());
        assert_eq!(batch.num_rows(), 2);

        let singleton = batch.column_by_name("series_is_singleton").unwrap().as_boolean();
        assert!(singleton.value(0));
        assert!(singleton.is_null(1));
        let vnp = batch.column_by_name("volume_not_printed").unwrap().as_boolean();
        assert!(!vnp.value(0));
        // does not fit Int32
        assert!(batch.column_by_name("page_count").unwrap().is_null(0));
        // the unset sentinel is a value, never folded into null
        let began = batch.column_by_name("series_year_began").unwrap().as_primitive::<Int32Type>();
        assert_eq!(began.value(0), -1);
        assert!(began.is_null(1));

        let script = batch.column_by_name("story_script").unwrap().as_list::<i32>();
        assert_eq!(script.value(0).as_string::<i32>().value(1), "B");
        assert!(script.is_null(1));
        let genre = batch.column_by_name("story_genre").unwrap().as_list::<i32>();
        assert!(genre.is_valid(0));
        assert_eq!(genre.value_length(0), 0);
        assert!(genre.is_null(1));
        let ids = batch
            .column_by_name("story_script_creator_id")
            .unwrap()
            .as_list::<i32>();
        assert_eq!(ids.value(0).as_primitive::<Int64Type>().values().to_vec(), vec![4, 5]);
    }

    #[test]
    fn rolls_over_after_rows_per_part() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("gcd").join("snapshot=20210305");
        let config = ParquetConfig {
            rows_per_part: 5,
            ..Default::default()
        };
        let mut sink: Box<dyn DocumentSink> = Box::new(ColumnarSink::create(&dir, &config).unwrap());
        for i in 0..6 {
            sink.emit(&doc(i)).unwrap();
        }
        let summary = sink.close().unwrap();

        assert_eq!(summary.documents, 6);
        assert_eq!(
            summary.outputs,
            vec![dir.join("part-0000.parquet"), dir.join("part-0001.parquet")]
        );
        assert_eq!(row_count(&summary.outputs[0]), 5);
        assert_eq!(row_count(&summary.outputs[1]), 1);
        assert!(!dir.join("part-0002.parquet").exists());
    }

    #[test]
    fn exact_multiple_does_not_open_empty_part() {
        let tmp = TempDir::new().unwrap();
        let config = ParquetConfig {
            rows_per_part: 3,
            ..Default::default()
        };
        let mut sink: Box<dyn DocumentSink> =
            Box::new(ColumnarSink::create(tmp.path(), &config).unwrap());
        for i in 0..3 {
            sink.emit(&doc(i)).unwrap();
        }
        let summary = sink.close().unwrap();
        assert_eq!(summary.outputs.len(), 1);
    }

    #[test]
    fn rerun_replaces_previous_partitions() {
        let tmp = TempDir::new().unwrap();
        let run = |rows_per_part| {
            let config = ParquetConfig {
                rows_per_part,
                ..Default::default()
            };
            let mut sink: Box<dyn DocumentSink> =
                Box::new(ColumnarSink::create(tmp.path(), &config).unwrap());
            for i in 0..6 {
                sink.emit(&doc(i)).unwrap();
            }
            sink.close().unwrap()
        };

        assert_eq!(run(2).outputs.len(), 3);
        let summary = run(10);
        assert_eq!(summary.outputs, vec![tmp.path().join("part-0000.parquet")]);

        let on_disk: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(on_disk, vec!["part-0000.parquet"]);
        assert_eq!(row_count(&summary.outputs[0]), 6);
    }

    #[test]
    fn empty_run_leaves_one_empty_partition() {
        let tmp = TempDir::new().unwrap();
        let sink: Box<dyn DocumentSink> =
            Box::new(ColumnarSink::create(tmp.path(), &ParquetConfig::default()).unwrap());
        let summary = sink.close().unwrap();
        assert_eq!(summary.documents, 0);
        assert_eq!(row_count(&summary.outputs[0]), 0);
    }

    #[test]
    fn zstd_partitions_read_back() {
        let tmp = TempDir::new().unwrap();
        let config = ParquetConfig {
            compression: crate::config::CompressionKind::Zstd,
            zstd_level: 3,
            ..Default::default()
        };
        let mut sink: Box<dyn DocumentSink> =
            Box::new(ColumnarSink::create(tmp.path(), &config).unwrap());
        sink.emit(&doc(42)).unwrap();
        let summary = sink.close().unwrap();
        let batches = read_all(&summary.outputs[0]);
        let ids = batches[0].column_by_name("issue_id").unwrap().as_primitive::<Int64Type>();
        assert_eq!(ids.value(0), 42);
    }

    #[test]
    #[ignore = "writes 2,000,001 documents"]
    fn default_rollover_at_two_million() {
        let tmp = TempDir::new().unwrap();
        let mut sink: Box<dyn DocumentSink> =
            Box::new(ColumnarSink::create(tmp.path(), &ParquetConfig::default()).unwrap());
        for i in 0..2_000_001 {
            sink.emit(&doc(i)).unwrap();
        }
        let summary = sink.close().unwrap();
        assert_eq!(summary.outputs.len(), 2);
        assert_eq!(row_count(&summary.outputs[0]), 2_000_000);
        assert_eq!(row_count(&summary.outputs[1]), 1);
    }
}
