//! Node-merge pass.
//!
//! Reads each configured node source, assigns canonical ids and Biolink
//! categories, and merges nodes that share an id. Only the identifier, name,
//! category and provenance are merged; other node attributes are left to
//! downstream tooling.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::category::{Category, Vocabulary};
use crate::config::FailurePolicy;
use crate::curie::Curie;
use crate::engine::{MergeOptions, SourceStatus};
use crate::error::{OutputError, SourceError};
use crate::mapping::resolve_column;
use crate::table::{ColumnRef, DelimitedReader, Row};

/// One node source: its files and which columns hold id, name and type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSourceConfig {
    pub name: String,
    /// Namespace of the source, e.g. `SEMMEDDB`.
    pub curie_prefix: String,
    /// Human-readable name of the source node.
    #[serde(default)]
    pub title: Option<String>,
    pub paths: Vec<PathBuf>,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    #[serde(default = "default_true")]
    pub has_header: bool,
    #[serde(default)]
    pub limit: Option<u64>,
    pub id: ColumnRef,
    /// Prefix for raw id cells; without it the cell must already be a CURIE.
    #[serde(default)]
    pub id_prefix: Option<String>,
    /// Column used when the id cell is empty.
    #[serde(default)]
    pub fallback_id: Option<ColumnRef>,
    #[serde(default)]
    pub fallback_prefix: Option<String>,
    /// Column holding the node name.
    #[serde(default)]
    pub label: Option<ColumnRef>,
    /// Column holding the type hint fed to `vocabulary`.
    #[serde(default)]
    pub category: Option<ColumnRef>,
    #[serde(default)]
    pub vocabulary: Vocabulary,
}

fn default_delimiter() -> char {
    ','
}
fn default_true() -> bool {
    true
}

impl NodeSourceConfig {
    pub fn new(name: &str, curie_prefix: &str, paths: Vec<PathBuf>, id: ColumnRef) -> Self {
        Self {
            name: name.to_string(),
            curie_prefix: curie_prefix.trim_end_matches(':').to_string(),
            title: None,
            paths,
            delimiter: default_delimiter(),
            has_header: default_true(),
            limit: None,
            id,
            id_prefix: None,
            fallback_id: None,
            fallback_prefix: None,
            label: None,
            category: None,
            vocabulary: Vocabulary::None,
        }
    }

    /// `"<PREFIX>:"`, used for `provided_by` and as the source node's id.
    pub fn knowledge_source(&self) -> String {
        format!("{}:", self.curie_prefix)
    }

    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }
}

/// One canonical node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: Curie,
    pub name: Option<String>,
    pub category: String,
    pub category_label: String,
    /// Knowledge sources that contributed this node, in first-seen order.
    pub provided_by: Vec<String>,
    pub update_date: String,
}

impl NodeRecord {
    pub fn new(
        id: Curie,
        name: Option<String>,
        category: Category,
        provided_by: &str,
        update_date: &str,
    ) -> Self {
        Self {
            id,
            name,
            category: category.curie().to_string(),
            category_label: category.label().to_string(),
            provided_by: vec![provided_by.to_string()],
            update_date: update_date.to_string(),
        }
    }
}

/// Destination for merged nodes.
pub trait NodeSink {
    fn write_node(&mut self, node: NodeRecord) -> Result<(), OutputError>;
}

impl NodeSink for Vec<NodeRecord> {
    fn write_node(&mut self, node: NodeRecord) -> Result<(), OutputError> {
        self.push(node);
        Ok(())
    }
}

/// Per-source counters of the node pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeStats {
    pub source: String,
    #[serde(flatten)]
    pub status: SourceStatus,
    pub read: u64,
    pub malformed: u64,
    /// Nodes seen for the first time.
    pub added: u64,
    /// Nodes folded into one already seen.
    pub merged: u64,
}

impl NodeStats {
    fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            status: SourceStatus::Completed,
            read: 0,
            malformed: 0,
            added: 0,
            merged: 0,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, SourceStatus::Failed { .. })
    }
}

/// Outcome of a node pass over several sources.
#[derive(Debug, Clone, Serialize)]
pub struct NodeSummary {
    pub sources: Vec<NodeStats>,
    pub total_nodes: usize,
    pub aborted: bool,
}

impl NodeSummary {
    pub fn has_failures(&self) -> bool {
        self.sources.iter().any(NodeStats::is_failed)
    }
}

struct NodeColumns {
    id: usize,
    fallback_id: Option<usize>,
    label: Option<usize>,
    category: Option<usize>,
}

/// Accumulates nodes across sources, keyed by canonical id, in first-seen order.
#[derive(Debug, Clone)]
pub struct NodeMerger {
    nodes: Vec<NodeRecord>,
    index: HashMap<Curie, usize>,
    update_date: String,
}

impl NodeMerger {
    pub fn new(update_date: &str) -> Self {
        Self {
            nodes: Vec::new(),
            index: HashMap::new(),
            update_date: update_date.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[NodeRecord] {
        &self.nodes
    }

    pub fn get(&self, id: &Curie) -> Option<&NodeRecord> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    /// Every merged node id.
    pub fn ids(&self) -> impl Iterator<Item = Curie> + '_ {
        self.nodes.iter().map(|n| n.id.clone())
    }

    /// Add a node, or fold it into the existing one. Returns `true` if it was new.
    pub fn insert(&mut self, node: NodeRecord) -> bool {
        match self.index.get(&node.id) {
            Some(&i) => {
                let existing = &mut self.nodes[i];
                if existing.name.is_none() {
                    existing.name = node.name;
                }
                for source in node.provided_by {
                    if !existing.provided_by.contains(&source) {
                        existing.provided_by.push(source);
                    }
                }
                false
            }
            None => {
                self.index.insert(node.id.clone(), self.nodes.len());
                self.nodes.push(node);
                true
            }
        }
    }

    /// Add the node that stands for a knowledge source itself.
    pub fn add_source_node(&mut self, curie_prefix: &str, title: &str) {
        let ks = format!("{}:", curie_prefix.trim_end_matches(':'));
        if let Some(id) = Curie::parse(&ks) {
            let node = NodeRecord::new(
                id,
                Some(title.to_string()),
                Category::RetrievalSource,
                &ks,
                &self.update_date,
            );
            self.insert(node);
        }
    }

    /// Read all sources in order. Failures follow `options.failure_policy`.
    pub fn merge_sources(&mut self, sources: &[NodeSourceConfig], options: &MergeOptions) -> NodeSummary {
        let mut summary = NodeSummary {
            sources: Vec::with_capacity(sources.len()),
            total_nodes: 0,
            aborted: false,
        };
        for source in sources {
            if summary.aborted {
                let mut skipped = NodeStats::new(&source.name);
                skipped.status = SourceStatus::Skipped;
                summary.sources.push(skipped);
                continue;
            }
            let limit = options.limit.or(source.limit).or(options.default_limit);
            let stats = self.run_source(source, limit);
            if stats.is_failed() && options.failure_policy == FailurePolicy::Abort {
                summary.aborted = true;
            }
            summary.sources.push(stats);
        }
        summary.total_nodes = self.len();
        tracing::info!(nodes = summary.total_nodes, aborted = summary.aborted, "node pass complete");
        summary
    }

    /// Read one node source. A source-level failure is recorded in the stats.
    pub fn run_source(&mut self, source: &NodeSourceConfig, limit: Option<u64>) -> NodeStats {
        tracing::info!(source = %source.name, files = source.paths.len(), ?limit, "reading node source");
        let mut stats = NodeStats::new(&source.name);
        if let Err(e) = self.read_source(source, limit, &mut stats) {
            tracing::error!(source = %source.name, error = %e, "node source failed");
            stats.status = SourceStatus::Failed {
                error: e.to_string(),
            };
        } else {
            self.add_source_node(&source.curie_prefix, source.title());
        }
        tracing::info!(
            source = %source.name,
            read = stats.read,
            malformed = stats.malformed,
            added = stats.added,
            merged = stats.merged,
            "node source done"
        );
        stats
    }

    fn read_source(
        &mut self,
        source: &NodeSourceConfig,
        limit: Option<u64>,
        stats: &mut NodeStats,
    ) -> Result<(), SourceError> {
        let provided_by = source.knowledge_source();
        for path in &source.paths {
            let mut reader = DelimitedReader::open(path, source.delimiter, source.has_header)
                .map_err(|e| SourceError::Unavailable {
                    source_name: source.name.clone(),
                    path: path.display().to_string(),
                    source: e,
                })?;
            let columns = resolve_node_columns(source, &reader)?;

            while limit.is_none_or(|limit| stats.read < limit) {
                let Some(row) = reader.next_row() else { break };
                let row = row.map_err(|e| SourceError::Read {
                    source_name: source.name.clone(),
                    path: path.display().to_string(),
                    line: reader.line(),
                    source: e,
                })?;
                stats.read += 1;
                if row.unterminated {
                    tracing::debug!(source = %source.name, line = row.line, "node row with an unterminated quote");
                    stats.malformed += 1;
                    continue;
                }
                match node_from_row(source, &columns, &row, &provided_by, &self.update_date) {
                    Some(node) => {
                        if self.insert(node) {
                            stats.added += 1;
                        } else {
                            stats.merged += 1;
                        }
                    }
                    None => {
                        tracing::debug!(source = %source.name, line = row.line, "node row without a usable id");
                        stats.malformed += 1;
                    }
                }
            }
        }
        Ok(())
    }

    /// Write every node, in first-seen order.
    pub fn write_to<S: NodeSink + ?Sized>(&self, sink: &mut S) -> Result<usize, OutputError> {
        for node in &self.nodes {
            sink.write_node(node.clone())?;
        }
        Ok(self.nodes.len())
    }
}

fn resolve_node_columns(
    source: &NodeSourceConfig,
    reader: &DelimitedReader,
) -> Result<NodeColumns, SourceError> {
    let opt = |c: &Option<ColumnRef>| {
        c.as_ref()
            .map(|c| resolve_column(c, reader, &source.name))
            .transpose()
    };
    Ok(NodeColumns {
        id: resolve_column(&source.id, reader, &source.name)?,
        fallback_id: opt(&source.fallback_id)?,
        label: opt(&source.label)?,
        category: opt(&source.category)?,
    })
}

fn canonical_id(cell: &str, prefix: Option<&str>) -> Option<Curie> {
    match prefix {
        Some(prefix) => Curie::from_parts(prefix, cell),
        None => Curie::parse(cell),
    }
}

fn node_from_row(
    source: &NodeSourceConfig,
    columns: &NodeColumns,
    row: &Row,
    provided_by: &str,
    update_date: &str,
) -> Option<NodeRecord> {
    let cell = |idx: Option<usize>| idx.map(|i| row.get(i).trim()).filter(|v| !v.is_empty());

    let id = match cell(Some(columns.id)) {
        Some(raw) => canonical_id(raw, source.id_prefix.as_deref())?,
        None => canonical_id(cell(columns.fallback_id)?, source.fallback_prefix.as_deref())?,
    };
    let name = cell(columns.label).map(str::to_string);
    let category = source.vocabulary.categorize(cell(columns.category).unwrap_or(""));
    Some(NodeRecord::new(id, name, category, provided_by, update_date))
}
