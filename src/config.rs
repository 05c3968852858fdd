//! Merge configuration, persisted as TOML.
//!
//! A config declares the identifier-mapping tables, the subset, the edge
//! sources and (optionally) the node sources of a run. Adding a source means
//! adding a `[[sources]]` entry; the merge path has no per-source branching.
//!
//! A default configuration covering BioKDE, iKraph, PrimeKG and SemMedDB is
//! bundled into the binary (see [`MergeConfig::bundled`]).

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::mapping::{MappingStep, TableSpec};
use crate::nodes::NodeSourceConfig;
use crate::subset::SubsetSpec;
use crate::table::ColumnRef;

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

const BUNDLED_TOML: &str = include_str!("../data/sources.toml");

/// Record limit applied by `--test` runs.
pub const TEST_MODE_LIMIT: u64 = 100;

/// What to do when a source cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop at the first failing source; later sources are reported as skipped.
    #[default]
    Abort,
    /// Report the failure and carry on with the remaining sources.
    Continue,
}

/// How strictly missing mappings are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingMode {
    /// Empty tables and empty chains are fatal.
    #[default]
    Strict,
    /// Empty chains accept ids that already parse as CURIEs; empty tables only warn.
    Passthrough,
}

/// Which value wins when a mapping table or node file repeats a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    #[default]
    FirstWins,
    LastWins,
}

/// Run-wide settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    #[serde(default)]
    pub mapping_mode: MappingMode,
    #[serde(default)]
    pub collision_policy: CollisionPolicy,
    /// Default per-source record limit.
    #[serde(default)]
    pub limit: Option<u64>,
}

/// Declares which column of a source's edge file holds which field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnLayout {
    pub subject: ColumnRef,
    pub object: ColumnRef,
    pub relation: ColumnRef,
    #[serde(default)]
    pub label: Option<ColumnRef>,
    #[serde(default)]
    pub frequency: Option<ColumnRef>,
    #[serde(default)]
    pub probability: Option<ColumnRef>,
    #[serde(default)]
    pub negated: Option<ColumnRef>,
    #[serde(default)]
    pub qualified_predicate: Option<ColumnRef>,
    #[serde(default)]
    pub qualified_object_aspect: Option<ColumnRef>,
    #[serde(default)]
    pub qualified_object_direction: Option<ColumnRef>,
    /// `|`-separated publication CURIEs.
    #[serde(default)]
    pub publications: Option<ColumnRef>,
    /// Extra columns copied into `source_attributes`.
    #[serde(default)]
    pub attributes: Vec<ColumnRef>,
}

impl ColumnLayout {
    /// Layout with only the three required columns.
    pub fn new(subject: ColumnRef, object: ColumnRef, relation: ColumnRef) -> Self {
        Self {
            subject,
            object,
            relation,
            label: None,
            frequency: None,
            probability: None,
            negated: None,
            qualified_predicate: None,
            qualified_object_aspect: None,
            qualified_object_direction: None,
            publications: None,
            attributes: Vec::new(),
        }
    }
}

/// One edge source: its files, column layout, and identifier-mapping chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Display name, e.g. `PrimeKG`.
    pub name: String,
    /// Namespace for `source_predicate` and `primary_knowledge_source`, e.g. `PRIMEKG`.
    pub curie_prefix: String,
    /// Edge files, read in order as one sequence.
    pub paths: Vec<PathBuf>,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    #[serde(default = "default_true")]
    pub has_header: bool,
    /// Record limit for this source; overrides `[run] limit`.
    #[serde(default)]
    pub limit: Option<u64>,
    /// `{relation}` is replaced by the relation cell.
    #[serde(default = "default_predicate_pattern")]
    pub predicate_pattern: String,
    /// `{relation}` and `{label}` are replaced; `{label}` falls back to the relation.
    #[serde(default = "default_label_pattern")]
    pub label_pattern: String,
    /// Ordered identifier-mapping strategies; the first hit wins.
    #[serde(default)]
    pub mapping: Vec<MappingStep>,
    pub columns: ColumnLayout,
}

fn default_delimiter() -> char {
    ','
}
fn default_true() -> bool {
    true
}
fn default_predicate_pattern() -> String {
    "{relation}".into()
}
fn default_label_pattern() -> String {
    "{label}".into()
}

impl SourceConfig {
    /// A source with default patterns, comma delimiter and a header row.
    pub fn new(
        name: &str,
        curie_prefix: &str,
        paths: Vec<PathBuf>,
        columns: ColumnLayout,
        mapping: Vec<MappingStep>,
    ) -> Self {
        Self {
            name: name.to_string(),
            curie_prefix: curie_prefix.trim_end_matches(':').to_string(),
            paths,
            delimiter: default_delimiter(),
            has_header: default_true(),
            limit: None,
            predicate_pattern: default_predicate_pattern(),
            label_pattern: default_label_pattern(),
            mapping,
            columns,
        }
    }

    /// The `primary_knowledge_source` CURIE, e.g. `"PRIMEKG:"`.
    pub fn knowledge_source(&self) -> String {
        format!("{}:", self.curie_prefix)
    }

    pub fn source_predicate(&self, relation: &str) -> String {
        format!(
            "{}:{}",
            self.curie_prefix,
            self.predicate_pattern.replace("{relation}", relation)
        )
    }

    pub fn relation_label(&self, relation: &str, label: Option<&str>) -> String {
        self.label_pattern
            .replace("{relation}", relation)
            .replace("{label}", label.unwrap_or(relation))
    }

    /// Namespaced key for a per-source attribute column.
    pub fn attribute_key(&self, column_label: &str) -> String {
        format!("{}_{}", self.curie_prefix.to_lowercase(), column_label)
    }
}

/// Full merge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeConfig {
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub tables: Vec<TableSpec>,
    #[serde(default)]
    pub subset: SubsetSpec,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub nodes: Vec<NodeSourceConfig>,
}

impl MergeConfig {
    /// Parse a config from TOML text. Relative paths are kept as written.
    pub fn from_toml_str(content: &str, origin: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: origin.to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file. Relative paths are resolved against the file's directory.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let mut config = Self::from_toml_str(&content, &path.display().to_string())?;
        if let Some(dir) = path.parent() {
            config.rebase(dir);
        }
        Ok(config)
    }

    /// The bundled four-source configuration, with paths relative to the working directory.
    pub fn bundled() -> ConfigResult<Self> {
        Self::from_toml_str(BUNDLED_TOML, "<bundled sources.toml>")
    }

    /// Prefix every relative input path with `base`.
    pub fn rebase(&mut self, base: &Path) {
        let fix = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        for table in &mut self.tables {
            table.paths.iter_mut().for_each(fix);
        }
        if let SubsetSpec::Column { path, .. } = &mut self.subset {
            fix(path);
        }
        for source in &mut self.sources {
            source.paths.iter_mut().for_each(fix);
        }
        for node in &mut self.nodes {
            node.paths.iter_mut().for_each(fix);
        }
    }

    /// Structural checks that do not touch the filesystem.
    pub fn validate(&self) -> ConfigResult<()> {
        let mut names = HashSet::new();
        for table in &self.tables {
            if !names.insert(table.name.as_str()) {
                return Err(invalid(format!("duplicate table name \"{}\"", table.name)));
            }
            if table.paths.is_empty() {
                return Err(invalid(format!("table \"{}\" has no paths", table.name)));
            }
        }

        let mut source_names = HashSet::new();
        for source in &self.sources {
            if !source_names.insert(source.name.as_str()) {
                return Err(invalid(format!("duplicate source name \"{}\"", source.name)));
            }
            if source.paths.is_empty() {
                return Err(invalid(format!("source \"{}\" has no paths", source.name)));
            }
            if source.curie_prefix.trim_end_matches(':').is_empty() {
                return Err(invalid(format!(
                    "source \"{}\" has an empty curie_prefix",
                    source.name
                )));
            }
            for step in &source.mapping {
                for table in step.tables() {
                    if !names.contains(table) {
                        return Err(ConfigError::UnknownTable {
                            source_name: source.name.clone(),
                            table: table.to_string(),
                        });
                    }
                }
            }
        }

        for node in &self.nodes {
            if node.paths.is_empty() {
                return Err(invalid(format!("node source \"{}\" has no paths", node.name)));
            }
        }
        if matches!(self.subset, SubsetSpec::Nodes) && self.nodes.is_empty() {
            return Err(invalid(
                "subset kind is \"nodes\" but no [[nodes]] sources are configured".into(),
            ));
        }
        Ok(())
    }

    /// Sources to run: all of them, or the named ones in config order.
    pub fn select_sources(&self, names: &[String]) -> ConfigResult<Vec<SourceConfig>> {
        if names.is_empty() {
            return Ok(self.sources.clone());
        }
        for name in names {
            if !self.sources.iter().any(|s| s.name.eq_ignore_ascii_case(name)) {
                return Err(ConfigError::UnknownSource { name: name.clone() });
            }
        }
        Ok(self
            .sources
            .iter()
            .filter(|s| names.iter().any(|n| s.name.eq_ignore_ascii_case(n)))
            .cloned()
            .collect())
    }
}

fn invalid(message: String) -> ConfigError {
    ConfigError::Invalid { message }
}
