//! Identifier mapping: source-local identifiers to canonical CURIEs.
//!
//! Mapping tables are loaded once before any edge is read and are read-only
//! during the merge. Each source owns an ordered chain of [`MappingStep`]s;
//! the first step that yields a valid CURIE wins. A lookup that finds nothing
//! returns `None`, which the merge engine tallies as *unmappable*.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::{CollisionPolicy, MappingMode, MergeConfig, SourceConfig};
use crate::curie::{Curie, local_part_of};
use crate::error::{MappingError, SourceError};
use crate::table::{ColumnRef, DelimitedReader, ResolveError, open_text};

pub type MappingResult<T> = std::result::Result<T, MappingError>;

/// On-disk layout of a mapping table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableFormat {
    #[default]
    Delimited,
    /// A JSON object of string keys to string values, optionally nested under `pointer`.
    Json,
}

/// How table keys are indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyForm {
    #[default]
    Verbatim,
    /// Index `NCBIGene:9796` under `9796`.
    LocalPart,
}

/// Declaration of one mapping table in the merge config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSpec {
    pub name: String,
    pub paths: Vec<PathBuf>,
    #[serde(default)]
    pub format: TableFormat,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    #[serde(default = "default_true")]
    pub has_header: bool,
    #[serde(default = "default_key")]
    pub key: ColumnRef,
    #[serde(default = "default_value")]
    pub value: ColumnRef,
    #[serde(default)]
    pub key_form: KeyForm,
    /// Turns a raw value into `prefix:value`.
    #[serde(default)]
    pub value_prefix: Option<String>,
    #[serde(default)]
    pub case_insensitive: bool,
    /// JSON pointer to the mapping object, e.g. `/final_mapping`.
    #[serde(default)]
    pub pointer: Option<String>,
}

fn default_delimiter() -> char {
    ','
}
fn default_true() -> bool {
    true
}
fn default_key() -> ColumnRef {
    ColumnRef::Index(0)
}
fn default_value() -> ColumnRef {
    ColumnRef::Index(1)
}

/// One identifier-resolution strategy. Chains of steps are tried in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingStep {
    /// Exact key lookup in the named table.
    Table(String),
    /// Strip an IRI to its fragment (after the last `#`, else the last `/`), then look up.
    Fragment(String),
    /// Look up in each table in turn, feeding each value into the next table.
    Chain(Vec<String>),
    /// Emit `PREFIX:<local>` without any lookup.
    Passthrough(String),
    /// Accept a local id that already is a CURIE with one of these prefixes (empty = any).
    Curie(Vec<String>),
}

impl MappingStep {
    /// Names of the tables this step reads.
    pub fn tables(&self) -> Vec<&str> {
        match self {
            MappingStep::Table(t) | MappingStep::Fragment(t) => vec![t.as_str()],
            MappingStep::Chain(ts) => ts.iter().map(String::as_str).collect(),
            MappingStep::Passthrough(_) | MappingStep::Curie(_) => Vec::new(),
        }
    }
}

/// An in-memory key → value table.
#[derive(Debug, Clone)]
pub struct MappingTable {
    name: String,
    entries: HashMap<String, String>,
    case_insensitive: bool,
    collisions: u64,
}

impl MappingTable {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: HashMap::new(),
            case_insensitive: false,
            collisions: 0,
        }
    }

    /// Build a table from pairs, first occurrence winning.
    pub fn from_pairs<K, V>(name: &str, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut table = Self::new(name);
        for (k, v) in pairs {
            table.insert(k.into(), v.into(), CollisionPolicy::FirstWins);
        }
        table
    }

    pub fn case_insensitive(mut self, yes: bool) -> Self {
        self.case_insensitive = yes;
        self
    }

    fn normalize(&self, key: &str) -> String {
        if self.case_insensitive {
            key.trim().to_lowercase()
        } else {
            key.trim().to_string()
        }
    }

    /// Insert a mapping. A repeated key with a different value counts as a collision.
    pub fn insert(&mut self, key: String, value: String, policy: CollisionPolicy) {
        let key = self.normalize(&key);
        match self.entries.get_mut(&key) {
            Some(existing) => {
                if *existing != value {
                    self.collisions += 1;
                    tracing::debug!(
                        table = %self.name,
                        key = %key,
                        first = %existing,
                        later = %value,
                        ?policy,
                        "mapping key collision"
                    );
                    if policy == CollisionPolicy::LastWins {
                        *existing = value;
                    }
                }
            }
            None => {
                self.entries.insert(key, value);
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        if self.case_insensitive {
            self.entries.get(&key.trim().to_lowercase()).map(String::as_str)
        } else {
            self.entries.get(key.trim()).map(String::as_str)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of repeated keys that carried a conflicting value.
    pub fn collisions(&self) -> u64 {
        self.collisions
    }

    /// Values that are valid CURIEs.
    pub fn canonical_values(&self) -> impl Iterator<Item = Curie> + '_ {
        self.entries.values().filter_map(|v| Curie::parse(v))
    }

    /// Load a table from its declaration.
    pub fn load(spec: &TableSpec, policy: CollisionPolicy) -> MappingResult<Self> {
        let mut table = Self::new(&spec.name).case_insensitive(spec.case_insensitive);
        for path in &spec.paths {
            match spec.format {
                TableFormat::Delimited => table.load_delimited(spec, path, policy)?,
                TableFormat::Json => table.load_json(spec, path, policy)?,
            }
        }
        if table.collisions > 0 {
            tracing::warn!(
                table = %spec.name,
                collisions = table.collisions,
                ?policy,
                "mapping table has keys with conflicting values"
            );
        }
        tracing::info!(table = %spec.name, entries = table.len(), "loaded mapping table");
        Ok(table)
    }

    fn add_row(&mut self, spec: &TableSpec, key: &str, value: &str, policy: CollisionPolicy) {
        let key = match spec.key_form {
            KeyForm::Verbatim => key.trim(),
            KeyForm::LocalPart => local_part_of(key.trim()),
        };
        let value = value.trim();
        if key.is_empty() || value.is_empty() {
            return;
        }
        let value = match &spec.value_prefix {
            Some(prefix) => format!("{}:{value}", prefix.trim_end_matches(':')),
            None => value.to_string(),
        };
        self.insert(key.to_string(), value, policy);
    }

    fn load_delimited(
        &mut self,
        spec: &TableSpec,
        path: &Path,
        policy: CollisionPolicy,
    ) -> MappingResult<()> {
        let origin = format!("table {}", spec.name);
        let mut reader = DelimitedReader::open(path, spec.delimiter, spec.has_header)
            .map_err(|e| SourceError::Unavailable {
                source_name: origin.clone(),
                path: path.display().to_string(),
                source: e,
            })?;
        let key_idx = resolve_column(&spec.key, &reader, &origin)?;
        let value_idx = resolve_column(&spec.value, &reader, &origin)?;

        while let Some(row) = reader.next_row() {
            let row = row.map_err(|e| SourceError::Read {
                source_name: origin.clone(),
                path: path.display().to_string(),
                line: reader.line(),
                source: e,
            })?;
            if row.unterminated {
                tracing::warn!(path = %path.display(), line = row.line, "mapping row with an unterminated quote skipped");
                continue;
            }
            self.add_row(spec, row.get(key_idx), row.get(value_idx), policy);
        }
        Ok(())
    }

    fn load_json(
        &mut self,
        spec: &TableSpec,
        path: &Path,
        policy: CollisionPolicy,
    ) -> MappingResult<()> {
        let input = open_text(path).map_err(|e| SourceError::Unavailable {
            source_name: format!("table {}", spec.name),
            path: path.display().to_string(),
            source: e,
        })?;
        let format_err = |message: String| MappingError::TableFormat {
            table: spec.name.clone(),
            path: path.display().to_string(),
            message,
        };
        let doc: serde_json::Value =
            serde_json::from_reader(input).map_err(|e| format_err(e.to_string()))?;
        let target = match &spec.pointer {
            Some(pointer) => doc
                .pointer(pointer)
                .ok_or_else(|| format_err(format!("no value at pointer \"{pointer}\"")))?,
            None => &doc,
        };
        let object = target
            .as_object()
            .ok_or_else(|| format_err("expected a JSON object".into()))?;
        for (key, value) in object {
            if let Some(value) = value.as_str() {
                self.add_row(spec, key, value, policy);
            }
        }
        Ok(())
    }
}

pub(crate) fn resolve_column(
    column: &ColumnRef,
    reader: &DelimitedReader,
    origin: &str,
) -> Result<usize, SourceError> {
    column.resolve(reader.header()).map_err(|e| match e {
        ResolveError::Missing(column) => SourceError::MissingColumn {
            source_name: origin.to_string(),
            path: reader.path().display().to_string(),
            column,
        },
        ResolveError::NoHeader(column) => SourceError::MissingHeader {
            source_name: origin.to_string(),
            path: reader.path().display().to_string(),
            column,
        },
    })
}

/// Resolves `(source, local id)` pairs to canonical CURIEs.
#[derive(Debug, Clone)]
pub struct IdentifierMapper {
    tables: HashMap<String, MappingTable>,
    chains: HashMap<String, Vec<MappingStep>>,
    mode: MappingMode,
}

impl IdentifierMapper {
    pub fn new(mode: MappingMode) -> Self {
        Self {
            tables: HashMap::new(),
            chains: HashMap::new(),
            mode,
        }
    }

    pub fn with_table(mut self, table: MappingTable) -> Self {
        self.add_table(table);
        self
    }

    pub fn with_chain(mut self, source: &str, steps: Vec<MappingStep>) -> Self {
        self.set_chain(source, steps);
        self
    }

    pub fn add_table(&mut self, table: MappingTable) {
        self.tables.insert(table.name.clone(), table);
    }

    pub fn set_chain(&mut self, source: &str, steps: Vec<MappingStep>) {
        self.chains.insert(source.to_string(), steps);
    }

    pub fn mode(&self) -> MappingMode {
        self.mode
    }

    pub fn table(&self, name: &str) -> Option<&MappingTable> {
        self.tables.get(name)
    }

    /// Total entries across all tables.
    pub fn entry_count(&self) -> usize {
        self.tables.values().map(MappingTable::len).sum()
    }

    /// Every table value that is a valid CURIE.
    pub fn canonical_ids(&self) -> impl Iterator<Item = Curie> + '_ {
        self.tables.values().flat_map(MappingTable::canonical_values)
    }

    /// Load the tables `sources` reference and register their chains.
    pub fn load(config: &MergeConfig, sources: &[SourceConfig]) -> MappingResult<Self> {
        let mut mapper = Self::new(config.run.mapping_mode);
        let needed: HashSet<&str> = sources
            .iter()
            .flat_map(|s| s.mapping.iter().flat_map(MappingStep::tables))
            .collect();
        for spec in config.tables.iter().filter(|t| needed.contains(t.name.as_str())) {
            mapper.add_table(MappingTable::load(spec, config.run.collision_policy)?);
        }
        for source in sources {
            mapper.set_chain(&source.name, source.mapping.clone());
        }
        Ok(mapper)
    }

    /// Refuse to run `sources` against missing or empty mappings (strict mode).
    pub fn check_ready(&self, sources: &[SourceConfig]) -> MappingResult<()> {
        for source in sources {
            let steps = self.chains.get(&source.name).map(Vec::as_slice).unwrap_or(&[]);
            if steps.is_empty() {
                match self.mode {
                    MappingMode::Strict => {
                        return Err(MappingError::NoChain {
                            source_name: source.name.clone(),
                        });
                    }
                    MappingMode::Passthrough => {
                        tracing::warn!(
                            source = %source.name,
                            "no mapping chain; accepting identifiers that are already CURIEs"
                        );
                    }
                }
            }
            for step in steps {
                for name in step.tables() {
                    let empty = self.tables.get(name).is_none_or(MappingTable::is_empty);
                    if !empty {
                        continue;
                    }
                    match self.mode {
                        MappingMode::Strict => {
                            return Err(MappingError::EmptyTable {
                                table: name.to_string(),
                            });
                        }
                        MappingMode::Passthrough => {
                            tracing::warn!(source = %source.name, table = name, "mapping table is empty");
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Resolve a source-local identifier. Never fails: absence means "skip this edge".
    pub fn resolve(&self, source: &str, local: &str) -> Option<Curie> {
        let local = local.trim();
        if local.is_empty() {
            return None;
        }
        let steps = self.chains.get(source).map(Vec::as_slice).unwrap_or(&[]);
        if steps.is_empty() {
            return match self.mode {
                MappingMode::Passthrough => Curie::parse(local),
                MappingMode::Strict => None,
            };
        }
        steps.iter().find_map(|step| self.apply(step, local))
    }

    fn apply(&self, step: &MappingStep, local: &str) -> Option<Curie> {
        match step {
            MappingStep::Table(name) => Curie::parse(self.tables.get(name)?.get(local)?),
            MappingStep::Fragment(name) => {
                let fragment = fragment_of(local)?;
                Curie::parse(self.tables.get(name)?.get(fragment)?)
            }
            MappingStep::Chain(names) => {
                let mut current = local;
                for name in names {
                    current = self.tables.get(name)?.get(current)?;
                }
                Curie::parse(current)
            }
            MappingStep::Passthrough(prefix) => Curie::from_parts(prefix, local),
            MappingStep::Curie(prefixes) => Curie::parse(local)
                .filter(|c| prefixes.is_empty() || prefixes.iter().any(|p| p == c.prefix())),
        }
    }
}

fn fragment_of(iri: &str) -> Option<&str> {
    let (_, fragment) = iri.rsplit_once('#').or_else(|| iri.rsplit_once('/'))?;
    (!fragment.is_empty()).then_some(fragment)
}
