//! Merge engine: drives every source through resolve → filter → dedupe → emit.
//!
//! Sources are processed one at a time, in order, against a shared
//! [`DedupLedger`] and [`SubsetIndex`]. Per-record outcomes are
//! [`Disposition`]s tallied into [`SourceStats`]; only source-level input
//! failures and output failures are errors.

use serde::Serialize;

use crate::config::{FailurePolicy, SourceConfig};
use crate::error::{KgError, KgResult, OutputError, SourceError};
use crate::ledger::DedupLedger;
use crate::mapping::IdentifierMapper;
use crate::nodes::NodeStats;
use crate::reader::{RawEdgeRecord, RawRow, SourceEdgeReader};
use crate::record::{CanonicalEdgeRecord, EdgeRecordBuilder};
use crate::subset::SubsetIndex;

/// Records between progress log lines.
const PROGRESS_INTERVAL: u64 = 100_000;

/// Destination for emitted edges.
pub trait EdgeSink {
    fn write_edge(&mut self, edge: CanonicalEdgeRecord) -> Result<(), OutputError>;
}

impl EdgeSink for Vec<CanonicalEdgeRecord> {
    fn write_edge(&mut self, edge: CanonicalEdgeRecord) -> Result<(), OutputError> {
        self.push(edge);
        Ok(())
    }
}

/// What happened to one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Malformed,
    Unmappable,
    OutOfSubset,
    Duplicate,
    Emitted,
}

/// Terminal state of a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceStatus {
    Completed,
    Failed { error: String },
    /// Not run because an earlier source failed under the abort policy.
    Skipped,
}

/// Per-source counters. `read` always equals the sum of the other five.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceStats {
    pub source: String,
    #[serde(flatten)]
    pub status: SourceStatus,
    /// Record limit this source ran under.
    pub limit: Option<u64>,
    pub read: u64,
    pub malformed: u64,
    pub unmappable: u64,
    pub out_of_subset: u64,
    pub duplicate: u64,
    pub emitted: u64,
}

impl SourceStats {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            status: SourceStatus::Completed,
            limit: None,
            read: 0,
            malformed: 0,
            unmappable: 0,
            out_of_subset: 0,
            duplicate: 0,
            emitted: 0,
        }
    }

    pub fn tally(&mut self, disposition: Disposition) {
        self.read += 1;
        match disposition {
            Disposition::Malformed => self.malformed += 1,
            Disposition::Unmappable => self.unmappable += 1,
            Disposition::OutOfSubset => self.out_of_subset += 1,
            Disposition::Duplicate => self.duplicate += 1,
            Disposition::Emitted => self.emitted += 1,
        }
    }

    /// Whether every record read is accounted for by exactly one outcome.
    pub fn is_conserved(&self) -> bool {
        self.read
            == self.malformed + self.unmappable + self.out_of_subset + self.duplicate + self.emitted
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, SourceStatus::Failed { .. })
    }
}

/// Statistics of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct MergeSummary {
    pub update_date: String,
    /// Run-wide override; each source's effective limit is in its stats.
    pub limit: Option<u64>,
    pub mapping_entries: usize,
    pub subset_size: usize,
    /// Node sources read to build the subset or written alongside the edges.
    pub node_sources: Vec<NodeStats>,
    pub sources: Vec<SourceStats>,
    pub total_emitted: u64,
    /// An earlier source failure stopped the run.
    pub aborted: bool,
}

impl MergeSummary {
    pub fn failed_sources(&self) -> impl Iterator<Item = &SourceStats> {
        self.sources.iter().filter(|s| s.is_failed())
    }

    /// Any edge or node source failed.
    pub fn has_failures(&self) -> bool {
        self.failed_sources().next().is_some()
            || self.node_sources.iter().any(NodeStats::is_failed)
    }

    pub fn source(&self, name: &str) -> Option<&SourceStats> {
        self.sources.iter().find(|s| s.source == name)
    }
}

/// Run-level knobs for the engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeOptions {
    pub failure_policy: FailurePolicy,
    /// Overrides every source's own limit.
    pub limit: Option<u64>,
    /// Used for sources without a limit of their own.
    pub default_limit: Option<u64>,
}

impl MergeOptions {
    /// Effective record limit: override, then the source's, then the default.
    pub fn limit_for(&self, source: &SourceConfig) -> Option<u64> {
        self.limit.or(source.limit).or(self.default_limit)
    }
}

/// Orchestrates the merge of any number of sources.
pub struct MergeEngine<'a> {
    mapper: &'a IdentifierMapper,
    subset: &'a SubsetIndex,
    ledger: &'a mut DedupLedger,
    builder: EdgeRecordBuilder,
    options: MergeOptions,
}

impl<'a> MergeEngine<'a> {
    pub fn new(
        mapper: &'a IdentifierMapper,
        subset: &'a SubsetIndex,
        ledger: &'a mut DedupLedger,
        builder: EdgeRecordBuilder,
        options: MergeOptions,
    ) -> Self {
        Self {
            mapper,
            subset,
            ledger,
            builder,
            options,
        }
    }

    /// Decide the fate of one raw edge; on [`Disposition::Emitted`] the record
    /// is returned and its identity is already registered.
    pub fn classify(
        &mut self,
        raw: &RawEdgeRecord,
        source: &SourceConfig,
    ) -> (Disposition, Option<CanonicalEdgeRecord>) {
        let (Some(subject), Some(object)) = (
            self.mapper.resolve(&source.name, &raw.subject),
            self.mapper.resolve(&source.name, &raw.object),
        ) else {
            return (Disposition::Unmappable, None);
        };
        if !self.subset.contains(&subject) || !self.subset.contains(&object) {
            return (Disposition::OutOfSubset, None);
        }
        let identity = EdgeRecordBuilder::identity(raw, subject, object, source);
        if self.ledger.seen(&identity) {
            return (Disposition::Duplicate, None);
        }
        let record = self.builder.build_for(raw, &identity, source);
        self.ledger.record(identity);
        (Disposition::Emitted, Some(record))
    }

    /// Feed a record stream through the engine, tallying into `stats`.
    ///
    /// Stops at the first source error, leaving what was already emitted in the sink.
    pub fn process_records<I, S>(
        &mut self,
        source: &SourceConfig,
        records: I,
        sink: &mut S,
        stats: &mut SourceStats,
    ) -> KgResult<()>
    where
        I: IntoIterator<Item = Result<RawRow, SourceError>>,
        S: EdgeSink + ?Sized,
    {
        for row in records {
            let disposition = match row? {
                RawRow::Malformed { line, reason } => {
                    tracing::debug!(source = %source.name, line, %reason, "skipping malformed record");
                    Disposition::Malformed
                }
                RawRow::Edge(raw) => {
                    let (disposition, record) = self.classify(&raw, source);
                    if let Some(record) = record {
                        sink.write_edge(record)?;
                    }
                    disposition
                }
            };
            stats.tally(disposition);
            if stats.read % PROGRESS_INTERVAL == 0 {
                tracing::info!(
                    source = %source.name,
                    read = stats.read,
                    emitted = stats.emitted,
                    "merge progress"
                );
            }
        }
        Ok(())
    }

    /// Merge one source. Source failures are recorded in the returned stats;
    /// only output failures are returned as errors.
    pub fn run_source<S>(&mut self, source: &SourceConfig, sink: &mut S) -> KgResult<SourceStats>
    where
        S: EdgeSink + ?Sized,
    {
        let limit = self.options.limit_for(source);
        tracing::info!(source = %source.name, files = source.paths.len(), ?limit, "streaming source");

        let mut stats = SourceStats::new(&source.name);
        stats.limit = limit;
        let reader = SourceEdgeReader::new(source, limit);
        match self.process_records(source, reader, sink, &mut stats) {
            Ok(()) => {}
            Err(KgError::Source(e)) => {
                tracing::error!(source = %source.name, error = %e, read = stats.read, "source failed");
                stats.status = SourceStatus::Failed {
                    error: e.to_string(),
                };
            }
            Err(other) => return Err(other),
        }

        tracing::info!(
            source = %source.name,
            read = stats.read,
            malformed = stats.malformed,
            unmappable = stats.unmappable,
            out_of_subset = stats.out_of_subset,
            duplicate = stats.duplicate,
            emitted = stats.emitted,
            "source done"
        );
        Ok(stats)
    }

    fn empty_summary(&self, sources: usize) -> MergeSummary {
        MergeSummary {
            update_date: self.builder.update_date().to_string(),
            limit: self.options.limit,
            mapping_entries: self.mapper.entry_count(),
            subset_size: self.subset.len(),
            node_sources: Vec::new(),
            sources: Vec::with_capacity(sources),
            total_emitted: 0,
            aborted: false,
        }
    }

    /// Report every source as skipped, for a run stopped before the edge merge.
    pub fn skip_all(&self, sources: &[SourceConfig]) -> MergeSummary {
        let mut summary = self.empty_summary(sources.len());
        summary.aborted = true;
        for source in sources {
            summary.sources.push(skipped(source));
        }
        tracing::warn!(sources = sources.len(), "edge merge skipped after earlier failure");
        summary
    }

    /// Merge `sources` in order into `sink`.
    pub fn merge<S>(&mut self, sources: &[SourceConfig], sink: &mut S) -> KgResult<MergeSummary>
    where
        S: EdgeSink + ?Sized,
    {
        let mut summary = self.empty_summary(sources.len());

        for source in sources {
            if summary.aborted {
                tracing::warn!(source = %source.name, "skipped after earlier failure");
                summary.sources.push(skipped(source));
                continue;
            }
            let stats = self.run_source(source, sink)?;
            summary.total_emitted += stats.emitted;
            if stats.is_failed() && self.options.failure_policy == FailurePolicy::Abort {
                summary.aborted = true;
            }
            summary.sources.push(stats);
        }

        tracing::info!(
            sources = summary.sources.len(),
            emitted = summary.total_emitted,
            ledger = self.ledger.len(),
            aborted = summary.aborted,
            "merge complete"
        );
        Ok(summary)
    }
}

fn skipped(source: &SourceConfig) -> SourceStats {
    let mut stats = SourceStats::new(&source.name);
    stats.status = SourceStatus::Skipped;
    stats
}

/// Merge `sources` with a fresh ledger.
pub fn merge<S>(
    sources: &[SourceConfig],
    mapper: &IdentifierMapper,
    subset: &SubsetIndex,
    sink: &mut S,
    options: MergeOptions,
) -> KgResult<MergeSummary>
where
    S: EdgeSink + ?Sized,
{
    let mut ledger = DedupLedger::new();
    MergeEngine::new(mapper, subset, &mut ledger, EdgeRecordBuilder::now(), options)
        .merge(sources, sink)
}
