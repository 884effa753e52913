//! Row → sink driver.

use std::io;

use gcd_core::fmt_num;
use indicatif::ProgressBar;

use crate::mapper::RowMapper;
use crate::sink::{DocumentSink, SinkSummary};
use crate::source::SourceRow;

/// Counters reported once the cursor is exhausted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblySummary {
    /// Rows read from the cursor
    pub rows: usize,
    /// Documents handed to the sink
    pub documents: usize,
    /// Rows dropped because a required column failed
    pub skipped: usize,
    /// Distinct issues seen, counting each change of `issue_id`
    pub issues: usize,
}

pub struct DocumentAssembler<'a> {
    mapper: RowMapper<'a>,
    sink: Box<dyn DocumentSink>,
    log_interval: usize,
    last_issue: Option<i64>,
    summary: AssemblySummary,
    pb: Option<ProgressBar>,
}

impl<'a> DocumentAssembler<'a> {
    pub fn new(mapper: RowMapper<'a>, sink: Box<dyn DocumentSink>, log_interval: usize) -> Self {
        Self {
            mapper,
            sink,
            log_interval: log_interval.max(1),
            last_issue: None,
            summary: AssemblySummary::default(),
            pb: None,
        }
    }

    /// Mirror the running count on a spinner.
    pub fn with_progress(mut self, pb: ProgressBar) -> Self {
        self.pb = Some(pb);
        self
    }

    /// Map one row and emit it.
    ///
    /// A row that fails to map is logged and counted; only sink failures
    /// are returned.
    pub fn process<R: SourceRow + ?Sized>(&mut self, row: &R) -> io::Result<()> {
        self.summary.rows += 1;
        let doc = match self.mapper.map_row(row) {
            Ok(doc) => doc,
            Err(e) => {
                log::warn!("Skipping row {}: {e}", self.summary.rows);
                self.summary.skipped += 1;
                return Ok(());
            }
        };

        let issue_id = doc.int("issue_id");
        if issue_id != self.last_issue {
            self.summary.issues += 1;
            self.last_issue = issue_id;
        }

        self.sink.emit(&doc)?;
        self.summary.documents += 1;

        let n = self.summary.documents;
        if n % self.log_interval == 0 {
            log::info!("Processing document #{}", fmt_num(n));
            if let Some(pb) = &self.pb {
                pb.set_message(format!("{} documents", fmt_num(n)));
            }
        }
        Ok(())
    }

    pub fn summary(&self) -> AssemblySummary {
        self.summary
    }

    /// Close the sink and report what was written.
    pub fn finish(self) -> io::Result<(AssemblySummary, SinkSummary)> {
        let sink_summary = self.sink.close()?;
        if let Some(pb) = &self.pb {
            pb.finish_and_clear();
        }
        log::info!(
            "Emitted {} documents from {} rows ({} issues, {} skipped)",
            fmt_num(self.summary.documents),
            fmt_num(self.summary.rows),
            fmt_num(self.summary.issues),
            fmt_num(self.summary.skipped)
        );
        Ok((self.summary, sink_summary))
    }
}
