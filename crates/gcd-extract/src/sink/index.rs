//! Search-index sink backed by tantivy.
//!
//! Text attributes become raw (untokenized) string terms, numeric ones i64
//! terms; list attributes add one term per element. Everything is stored as
//! well so documents can be read back whole.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use tantivy::merge_policy::LogMergePolicy;
use tantivy::schema::{Field, Schema, INDEXED, STORED, STRING};
use tantivy::{Index, IndexWriter, TantivyDocument};

use super::{DocumentSink, SinkSummary};
use crate::config::IndexConfig;
use crate::document::{Document, FieldKind, Value, FIELDS};

/// File tantivy keeps at the root of every index
const META_FILE: &str = "meta.json";

/// Index schema derived from the field catalog
pub fn index_schema() -> (Schema, FxHashMap<&'static str, Field>) {
    let mut builder = Schema::builder();
    let mut fields = FxHashMap::default();
    for spec in FIELDS {
        let field = match spec.kind {
            FieldKind::Text | FieldKind::TextList => builder.add_text_field(spec.name, STRING | STORED),
            FieldKind::Long | FieldKind::Int | FieldKind::Flag | FieldKind::LongList => {
                builder.add_i64_field(spec.name, INDEXED | STORED)
            }
        };
        fields.insert(spec.name, field);
    }
    (builder.build(), fields)
}

pub struct IndexSink {
    writer: IndexWriter,
    fields: FxHashMap<&'static str, Field>,
    dir: PathBuf,
    doc_buffer_size: usize,
    commit_interval: usize,
    uncommitted: usize,
    commits: usize,
    documents: usize,
}

impl IndexSink {
    /// Create a fresh index in `dir`, replacing a previous index there.
    ///
    /// An existing non-empty directory that is not an index is left alone and
    /// reported as an error.
    pub fn create(dir: &Path, config: &IndexConfig) -> io::Result<Self> {
        if dir.join(META_FILE).is_file() {
            log::warn!("Replacing existing index at {}", dir.display());
            fs::remove_dir_all(dir)?;
        } else if dir.exists() && fs::read_dir(dir)?.next().is_some() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} exists and is not an index", dir.display()),
            ));
        }
        fs::create_dir_all(dir)?;

        let (schema, fields) = index_schema();
        let index = Index::create_in_dir(dir, schema).map_err(io::Error::other)?;
        let mut writer: IndexWriter = index
            .writer_with_num_threads(1, config.memory_budget_bytes)
            .map_err(io::Error::other)?;

        let mut policy = LogMergePolicy::default();
        policy.set_min_num_segments(config.merge_factor.max(2));
        writer.set_merge_policy(Box::new(policy));

        log::debug!(
            "Index writer at {} (commit every {} docs, merge factor {})",
            dir.display(),
            config.commit_interval,
            config.merge_factor
        );

        Ok(Self {
            writer,
            fields,
            dir: dir.to_path_buf(),
            doc_buffer_size: config.doc_buffer_size.max(1),
            commit_interval: config.commit_interval.max(1),
            uncommitted: 0,
            commits: 0,
            documents: 0,
        })
    }

    fn to_tantivy(&self, doc: &Document) -> io::Result<TantivyDocument> {
        let mut out = TantivyDocument::new();
        for (name, value) in doc.iter() {
            let field = *self.fields.get(name).ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, format!("unknown attribute {name}"))
            })?;
            match value {
                Value::Int(v) => out.add_i64(field, *v),
                Value::Text(s) => out.add_text(field, s),
                Value::TextList(items) => {
                    for s in items {
                        out.add_text(field, s);
                    }
                }
                Value::IntList(items) => {
                    for v in items {
                        out.add_i64(field, *v);
                    }
                }
            }
        }
        Ok(out)
    }

    fn commit(&mut self) -> io::Result<()> {
        self.writer.commit().map_err(io::Error::other)?;
        self.commits += 1;
        self.uncommitted = 0;
        Ok(())
    }

    /// Commits issued so far
    #[cfg(test)]
    fn commits(&self) -> usize {
        self.commits
    }
}

impl DocumentSink for IndexSink {
    fn emit(&mut self, doc: &Document) -> io::Result<()> {
        let tdoc = self.to_tantivy(doc)?;
        self.writer.add_document(tdoc).map_err(io::Error::other)?;
        self.documents += 1;
        self.uncommitted += 1;
        if self.uncommitted >= self.commit_interval {
            self.commit()?;
        } else if self.uncommitted % self.doc_buffer_size == 0 {
            log::trace!("{} documents buffered in {}", self.uncommitted, self.dir.display());
        }
        Ok(())
    }

    fn close(mut self: Box<Self>) -> io::Result<SinkSummary> {
        self.commit()?;
        let Self {
            writer,
            dir,
            documents,
            commits,
            ..
        } = *self;
        writer.wait_merging_threads().map_err(io::Error::other)?;
        log::info!(
            "Closed index {} ({} documents, {} commits)",
            dir.display(),
            documents,
            commits
        );
        Ok(SinkSummary {
            documents,
            outputs: vec![dir],
        })
    }
}
