//! End-to-end runs: config → mapping tables → subset → engine → files.
//!
//! A [`Pipeline`] fixes one `update_date` for everything it writes, so nodes,
//! edges and the summary of a run agree on it.

use std::path::Path;

use crate::config::{FailurePolicy, MergeConfig, TEST_MODE_LIMIT};
use crate::engine::{EdgeSink, MergeEngine, MergeOptions, MergeSummary};
use crate::error::{KgResult, OutputError};
use crate::ledger::DedupLedger;
use crate::mapping::IdentifierMapper;
use crate::nodes::{NodeMerger, NodeSummary};
use crate::output::{JsonlWriter, summary_path_for, write_summary};
use crate::record::{EdgeRecordBuilder, timestamp_now};
use crate::subset::{SubsetIndex, SubsetSpec};

/// Run selectors owned by the caller (usually the CLI).
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Edge sources to run; empty means all.
    pub sources: Vec<String>,
    pub limit: Option<u64>,
    /// Sample run: caps every source at [`TEST_MODE_LIMIT`] unless `limit` is set.
    pub test: bool,
    /// Overrides the configured failure policy with `continue`.
    pub continue_on_error: bool,
}

impl PipelineOptions {
    pub fn effective_limit(&self) -> Option<u64> {
        self.limit.or(self.test.then_some(TEST_MODE_LIMIT))
    }
}

/// File names used by [`Pipeline::run`].
pub const NODES_FILE: &str = "nodes.jsonl";
pub const EDGES_FILE: &str = "edges.jsonl";

pub struct Pipeline {
    config: MergeConfig,
    options: PipelineOptions,
    update_date: String,
}

impl Pipeline {
    pub fn new(config: MergeConfig, options: PipelineOptions) -> Self {
        Self {
            config,
            options,
            update_date: timestamp_now(),
        }
    }

    /// Pin the processing timestamp.
    pub fn with_update_date(mut self, update_date: impl Into<String>) -> Self {
        self.update_date = update_date.into();
        self
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    pub fn update_date(&self) -> &str {
        &self.update_date
    }

    pub fn merge_options(&self) -> MergeOptions {
        MergeOptions {
            failure_policy: if self.options.continue_on_error {
                FailurePolicy::Continue
            } else {
                self.config.run.failure_policy
            },
            limit: self.options.effective_limit(),
            default_limit: self.config.run.limit,
        }
    }

    /// Run the node pass in memory, adding a source node per selected edge source.
    pub fn merge_nodes(&self) -> KgResult<(NodeMerger, NodeSummary)> {
        let mut merger = NodeMerger::new(&self.update_date);
        let summary = merger.merge_sources(&self.config.nodes, &self.merge_options());
        for source in self.config.select_sources(&self.options.sources)? {
            merger.add_source_node(&source.curie_prefix, &source.name);
        }
        Ok((merger, summary))
    }

    /// Merge the selected edge sources into `sink`.
    ///
    /// `nodes` feeds a `nodes` subset; if it is `None` and the subset needs it,
    /// the node pass runs first and its per-source stats land in the summary.
    pub fn merge_edges<S>(&self, nodes: Option<&NodeMerger>, sink: &mut S) -> KgResult<MergeSummary>
    where
        S: EdgeSink + ?Sized,
    {
        self.merge_edges_after(nodes, None, sink)
    }

    fn merge_edges_after<S>(
        &self,
        nodes: Option<&NodeMerger>,
        node_summary: Option<&NodeSummary>,
        sink: &mut S,
    ) -> KgResult<MergeSummary>
    where
        S: EdgeSink + ?Sized,
    {
        let sources = self.config.select_sources(&self.options.sources)?;
        let mapper = IdentifierMapper::load(&self.config, &sources)?;
        mapper.check_ready(&sources)?;
        tracing::info!(
            sources = sources.len(),
            mapping_entries = mapper.entry_count(),
            mode = ?mapper.mode(),
            "identifier mapping ready"
        );

        let node_pass: (NodeMerger, NodeSummary);
        let (nodes, node_summary) = match nodes {
            None if matches!(self.config.subset, SubsetSpec::Nodes) => {
                node_pass = self.merge_nodes()?;
                (Some(&node_pass.0), Some(&node_pass.1))
            }
            nodes => (nodes, node_summary),
        };

        let aborted = node_summary.is_some_and(|s| s.aborted);
        let subset = if aborted {
            SubsetIndex::default()
        } else {
            SubsetIndex::load(
                &self.config.subset,
                &mapper,
                nodes.into_iter().flat_map(|n| n.ids()),
            )?
        };

        let mut ledger = DedupLedger::new();
        let mut engine = MergeEngine::new(
            &mapper,
            &subset,
            &mut ledger,
            EdgeRecordBuilder::new(self.update_date.clone()),
            self.merge_options(),
        );
        let mut summary = if aborted {
            engine.skip_all(&sources)
        } else {
            engine.merge(&sources, sink)?
        };
        if let Some(node_summary) = node_summary {
            summary.node_sources = node_summary.sources.clone();
        }
        Ok(summary)
    }

    /// Node pass to `output`.
    pub fn write_nodes(&self, output: &Path) -> KgResult<NodeSummary> {
        let (merger, summary) = self.merge_nodes()?;
        let mut writer = JsonlWriter::create(output)?;
        merger.write_to(&mut writer)?;
        writer.finish()?;
        tracing::info!(path = %output.display(), nodes = merger.len(), "nodes written");
        Ok(summary)
    }

    /// Edge merge to `output`, summary to `summary` (default: next to `output`).
    pub fn write_edges(&self, output: &Path, summary: Option<&Path>) -> KgResult<MergeSummary> {
        let mut writer = JsonlWriter::create(output)?;
        let stats = self.merge_edges(None, &mut writer)?;
        writer.finish()?;
        let summary_path = summary.map_or_else(|| summary_path_for(output), Path::to_path_buf);
        write_summary(&summary_path, &stats)?;
        Ok(stats)
    }

    /// Full run into `dir`: nodes, edges, and the edge summary.
    pub fn run(&self, dir: &Path) -> KgResult<(NodeSummary, MergeSummary)> {
        std::fs::create_dir_all(dir).map_err(|e| OutputError::Io {
            path: dir.display().to_string(),
            source: e,
        })?;

        let (merger, node_summary) = self.merge_nodes()?;
        let mut nodes_out = JsonlWriter::create(&dir.join(NODES_FILE))?;
        merger.write_to(&mut nodes_out)?;
        nodes_out.finish()?;

        let edges_path = dir.join(EDGES_FILE);
        let mut edges_out = JsonlWriter::create(&edges_path)?;
        let edge_summary = self.merge_edges_after(Some(&merger), Some(&node_summary), &mut edges_out)?;
        edges_out.finish()?;
        write_summary(&summary_path_for(&edges_path), &edge_summary)?;

        Ok((node_summary, edge_summary))
    }
}
